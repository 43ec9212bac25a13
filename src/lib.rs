pub mod encoding;
pub mod formatting;
pub mod parsing;
pub mod prenexing;
pub mod syntax_tree;
