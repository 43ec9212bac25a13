use {
    crate::syntax_tree::{
        qbf::{Formula, FormulaKind, Quantification, QuantifierKind},
        Node,
    },
    itertools::Itertools,
    std::fmt::{self, Display, Formatter},
};

pub struct Format<'a, N: Node>(pub &'a N);

impl Display for Format<'_, Formula> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0.kind() {
            FormulaKind::True => write!(f, "TRUE"),
            FormulaKind::False => write!(f, "FALSE"),
            FormulaKind::Variable(name) => write!(f, "{name}"),
            FormulaKind::Not(subformula) => write!(f, "-{}", Format(subformula)),
            FormulaKind::And(subformulas) => fmt_gate(f, "∧", subformulas),
            FormulaKind::Or(subformulas) => fmt_gate(f, "∨", subformulas),
            FormulaKind::ForAll(quantification) => {
                fmt_quantifier(f, QuantifierKind::ForAll, quantification)
            }
            FormulaKind::Exists(quantification) => {
                fmt_quantifier(f, QuantifierKind::Exists, quantification)
            }
        }
    }
}

fn fmt_gate(f: &mut Formatter<'_>, operator: &str, operands: &[Formula]) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, " {operator} ")?;
        }
        write!(f, "{}", Format(operand))?;
    }
    write!(f, ")")
}

fn fmt_quantifier(
    f: &mut Formatter<'_>,
    kind: QuantifierKind,
    quantification: &Quantification,
) -> fmt::Result {
    write!(
        f,
        "{}: {}",
        QuantifierBlock(kind, quantification),
        Format(&quantification.subformula)
    )
}

/// A single quantifier with its variable set, e.g. `∀x1,x2`. Variables are
/// written in lexicographic order to keep the output canonical.
pub struct QuantifierBlock<'a>(pub QuantifierKind, pub &'a Quantification);

impl Display for QuantifierBlock<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let symbol = match self.0 {
            QuantifierKind::ForAll => "∀",
            QuantifierKind::Exists => "∃",
        };
        write!(f, "{symbol}{}", self.1.variables.iter().sorted().join(","))
    }
}
