pub mod qbf;
