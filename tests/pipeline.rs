extern crate prenex;

use prenex::{
    encoding::Pg86,
    prenexing::{ForAllDownExistsDown, ForAllUpExistsUp},
    syntax_tree::qbf::Formula,
};

#[test]
fn prenex_parsed_formulas() {
    let lncs: Formula = "∃p: (∀q: ∃r: ∀s: ∃t: ϕ0 ∧ ∀q': ∃r': ϕ1 ∧ -∀q'': ∃r'': ϕ2)"
        .parse()
        .unwrap();

    assert_eq!(
        lncs.to_pnf(&ForAllUpExistsUp).to_string(),
        "∃p,q'': ∀q,q',r'': ∃r,r': ∀s: ∃t: (ϕ0 ∧ ϕ1 ∧ -ϕ2)"
    );
    assert_eq!(
        lncs.to_pnf(&ForAllDownExistsDown).to_string(),
        "∃p: ∀q: ∃q'',r: ∀q',r'',s: ∃r',t: (ϕ0 ∧ ϕ1 ∧ -ϕ2)"
    );
}

#[test]
fn encode_parsed_formulas() {
    let g14: Formula = "∀z: (z ∨ ∃x1,x2: (x1 ∧ x2 ∧ z))".parse().unwrap();

    assert_eq!(
        g14.to_pcnf(&ForAllUpExistsUp, &Pg86).unwrap().to_string(),
        "∀z: ∃x1,x2: (_pg0 ∧ (-_pg0 ∨ z ∨ _pg1) ∧ (-_pg1 ∨ x1) ∧ (-_pg1 ∨ x2) ∧ (-_pg1 ∨ z))"
    );
}

#[test]
fn cleanse_parsed_formulas() {
    let g14: Formula = "∀z: (z ∨ ∃x1,x2: (x1 ∧ x2 ∧ z))".parse().unwrap();

    assert_eq!(
        g14.cleanse().to_string(),
        "∀1: (1 ∨ ∃2,3: (2 ∧ 3 ∧ 1))"
    );
}
