use {
    crate::syntax_tree::qbf::{Formula, FormulaError, FormulaKind},
    std::collections::HashMap,
    thiserror::Error,
};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EncodeError {
    #[error("not a propositional formula")]
    NotPropositional,
    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// A conjunctive normal form encoder.
pub trait CnfEncoder {
    /// Encodes a propositional skeleton into a satisfiability equivalent
    /// list of clauses.
    fn clauses(&self, skeleton: &Formula) -> Result<Vec<Formula>, EncodeError>;

    /// Transforms a formula in prenex normal form into prenex conjunctive
    /// normal form: the prefix is kept and the body is replaced by the
    /// conjunction of its clauses, unless it already is in conjunctive
    /// normal form.
    fn apply(&self, pnf: Formula) -> Result<Formula, EncodeError> {
        match pnf.as_quantifier() {
            Some((kind, quantification)) => {
                let variables = quantification.variables.clone();
                let subformula = self.apply(quantification.subformula.clone())?;
                Ok(kind.quantify(subformula, variables))
            }
            None if pnf.is_cnf() => Ok(pnf),
            None => Ok(Formula::and(self.clauses(&pnf)?)?),
        }
    }
}

/// An optimized variant of the Tseitin transformation.
///
/// Drops the constraints of unnegated gates, so only one implication per
/// auxiliary variable remains (Plaisted and Greenbaum, "A Structure-Preserving
/// Clause Form Translation", Journal of Symbolic Computation 2(3), 1986).
///
/// The input is expected to be a skeleton in negation normal form: negations
/// of whole gates are not descended into.
pub struct Pg86;

impl Pg86 {
    const PREFIX: &'static str = "_pg";
}

impl CnfEncoder for Pg86 {
    fn clauses(&self, skeleton: &Formula) -> Result<Vec<Formula>, EncodeError> {
        let mut encoding = Encoding::default();
        let mut clauses = encoding.clauses(skeleton)?;
        clauses.insert(0, encoding.auxiliary(skeleton)?);
        Ok(clauses)
    }
}

// Memo table and counter for a single encoding run.
#[derive(Default)]
struct Encoding {
    auxiliaries: HashMap<Formula, Formula>,
    counter: usize,
}

impl Encoding {
    // Literals are their own auxiliaries; every other node gets a fresh
    // `_pg<n>` variable on first sight.
    fn auxiliary(&mut self, gate: &Formula) -> Result<Formula, FormulaError> {
        if gate.is_literal() {
            return Ok(gate.clone());
        }
        if let Some(auxiliary) = self.auxiliaries.get(gate) {
            return Ok(auxiliary.clone());
        }
        let auxiliary = Formula::variable(format!("{}{}", Pg86::PREFIX, self.counter))?;
        self.counter += 1;
        self.auxiliaries.insert(gate.clone(), auxiliary.clone());
        Ok(auxiliary)
    }

    fn clauses(&mut self, skeleton: &Formula) -> Result<Vec<Formula>, EncodeError> {
        match skeleton.kind() {
            FormulaKind::True
            | FormulaKind::False
            | FormulaKind::Variable(_)
            | FormulaKind::Not(_) => Ok(vec![]),
            FormulaKind::And(subformulas) => {
                let negated = Formula::not(self.auxiliary(skeleton)?);
                let mut clauses = Vec::new();
                for subformula in subformulas {
                    clauses.push(Formula::or(vec![negated.clone(), subformula.clone()])?);
                }
                for subformula in subformulas {
                    clauses.extend(self.clauses(subformula)?);
                }
                Ok(clauses)
            }
            FormulaKind::Or(subformulas) => {
                let mut literals = vec![Formula::not(self.auxiliary(skeleton)?)];
                for subformula in subformulas {
                    literals.push(self.auxiliary(subformula)?);
                }
                let mut clauses = vec![Formula::or(literals)?];
                for subformula in subformulas {
                    clauses.extend(self.clauses(subformula)?);
                }
                Ok(clauses)
            }
            FormulaKind::ForAll(_) | FormulaKind::Exists(_) => Err(EncodeError::NotPropositional),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{CnfEncoder, EncodeError, Pg86},
        crate::{
            prenexing::ForAllUpExistsUp,
            syntax_tree::qbf::tests::{and, exists, g14, lncs, or, var},
            syntax_tree::qbf::FormulaError,
        },
    };

    #[test]
    fn cnf_formulas_pass_through() {
        let conjunction = and(vec![var("x1"), var("x2")]);
        assert_eq!(Pg86.apply(conjunction.clone()).unwrap(), conjunction);

        let and_of_ors = and(vec![
            or(vec![var("x1"), var("x2")]),
            or(vec![var("x3"), var("x4")]),
        ]);
        assert_eq!(Pg86.apply(and_of_ors.clone()).unwrap(), and_of_ors);
    }

    #[test]
    fn encode_disjunction() {
        let disjunction = or(vec![var("x1"), var("x2")]);
        assert_eq!(
            Pg86.apply(disjunction).unwrap().to_string(),
            "(_pg0 ∧ (-_pg0 ∨ x1 ∨ x2))"
        );
    }

    #[test]
    fn encode_disjunction_of_conjunctions() {
        let or_of_ands = or(vec![
            and(vec![var("x1"), var("x2")]),
            and(vec![var("x3"), var("x4")]),
        ]);
        assert_eq!(
            Pg86.apply(or_of_ands).unwrap().to_string(),
            "(_pg0 \
             ∧ (-_pg0 ∨ _pg1 ∨ _pg2) \
             ∧ (-_pg1 ∨ x1) \
             ∧ (-_pg1 ∨ x2) \
             ∧ (-_pg2 ∨ x3) \
             ∧ (-_pg2 ∨ x4))"
        );
    }

    #[test]
    fn clauses_of_a_literal() {
        assert_eq!(Pg86.clauses(&var("x1")).unwrap(), vec![var("x1")]);
    }

    #[test]
    fn literal_bodies_yield_too_few_clauses() {
        assert_eq!(
            Pg86.apply(var("x1")).unwrap_err(),
            EncodeError::Formula(FormulaError::MissingSubformulas)
        );
    }

    #[test]
    fn reject_non_prenex_formulas() {
        let non_prenex = or(vec![
            var("x1"),
            exists(or(vec![var("x2"), var("x3")]), &["x2"]),
        ]);
        assert_eq!(
            Pg86.apply(non_prenex).unwrap_err(),
            EncodeError::NotPropositional
        );
    }

    #[test]
    fn pcnf_pipeline() {
        assert_eq!(
            g14().to_pcnf(&ForAllUpExistsUp, &Pg86).unwrap().to_string(),
            "∀z: ∃x1,x2: (\
             _pg0 \
             ∧ (-_pg0 ∨ z ∨ _pg1) \
             ∧ (-_pg1 ∨ x1) \
             ∧ (-_pg1 ∨ x2) \
             ∧ (-_pg1 ∨ z))"
        );

        // an already conjunctive body is kept as is
        assert_eq!(
            lncs().to_pcnf(&ForAllUpExistsUp, &Pg86).unwrap().to_string(),
            "∃p,q'': ∀q,q',r'': ∃r,r': ∀s: ∃t: (ϕ0 ∧ ϕ1 ∧ -ϕ2)"
        );
    }
}
