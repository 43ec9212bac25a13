extern crate prenex;

use prenex::syntax_tree::qbf::Formula;

#[test]
fn formula_default_parsing_formatting_identity() {
    for src in [
        "TRUE",
        "FALSE",
        "x1",
        "-x1",
        "(x1 ∧ x2 ∧ x3)",
        "(x1 ∨ -x2)",
        "(TRUE ∨ FALSE)",
        "∀x1,x2: (-x1 ∨ (x1 ∧ x2 ∧ x3))",
        "∃x3: ∀x1,x2: (-x1 ∨ (x1 ∧ x2 ∧ x3))",
        "∀z: (z ∨ ∃x1,x2: (x1 ∧ x2 ∧ z))",
        "∃p: (∀q: ∃r: ∀s: ∃t: ϕ0 ∧ ∀q': ∃r': ϕ1 ∧ -∀q'': ∃r'': ϕ2)",
    ] {
        let formula: Formula = src.parse().unwrap();
        let target = format!("{formula}");

        assert_eq!(
            src.to_string(),
            target.to_string(),
            "assertion `left == right` failed:\n left:\n{src}\n right:\n{target}"
        );
    }
}
