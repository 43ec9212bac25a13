use crate::{parsing::PestParser, syntax_tree::qbf::Formula};

mod internal {
    #[derive(pest_derive::Parser)]
    #[grammar = "parsing/qbf/grammar.pest"]
    pub struct Parser;
}

pub struct FormulaParser;

impl PestParser for FormulaParser {
    type Node = Formula;

    type InternalParser = internal::Parser;
    type Rule = internal::Rule;
    const RULE: internal::Rule = internal::Rule::formula;

    fn translate_pair(pair: pest::iterators::Pair<'_, Self::Rule>) -> Self::Node {
        match pair.as_rule() {
            internal::Rule::formula => Self::translate_pairs(pair.into_inner()),
            internal::Rule::verum => Formula::top(),
            internal::Rule::falsum => Formula::bottom(),
            internal::Rule::variable => Formula::variable(pair.as_str()).unwrap(),
            internal::Rule::negation => Formula::not(Self::translate_pairs(pair.into_inner())),
            internal::Rule::conjunction => {
                Formula::and(pair.into_inner().map(Self::translate_pair).collect()).unwrap()
            }
            internal::Rule::disjunction => {
                Formula::or(pair.into_inner().map(Self::translate_pair).collect()).unwrap()
            }
            internal::Rule::universal | internal::Rule::existential => {
                let rule = pair.as_rule();
                let mut pairs = pair.into_inner();
                let variables = pairs.next().unwrap_or_else(|| Self::report_missing_pair());
                let subformula = Self::translate_pair(
                    pairs.next().unwrap_or_else(|| Self::report_missing_pair()),
                );
                let variables = variables.into_inner().map(|variable| variable.as_str());
                match rule {
                    internal::Rule::universal => Formula::forall(subformula, variables).unwrap(),
                    _ => Formula::exists(subformula, variables).unwrap(),
                }
            }
            _ => Self::report_unexpected_pair(pair),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::FormulaParser,
        crate::{
            parsing::TestedParser,
            syntax_tree::qbf::tests::{and, exists, forall, not, or, var},
            syntax_tree::qbf::Formula,
        },
    };

    #[test]
    fn parse_formula() {
        FormulaParser
            .should_parse_into([
                ("TRUE", Formula::top()),
                ("FALSE", Formula::bottom()),
                ("x1", var("x1")),
                ("ϕ0", var("ϕ0")),
                ("q''", var("q''")),
                ("TRUEx", var("TRUEx")),
                ("-x1", not(var("x1"))),
                ("--x1", not(not(var("x1")))),
                ("(x1 ∧ x2)", and(vec![var("x1"), var("x2")])),
                (
                    "(x1 ∧ x2 ∧ x3)",
                    and(vec![var("x1"), var("x2"), var("x3")]),
                ),
                ("(-x1 ∨ TRUE)", or(vec![not(var("x1")), Formula::top()])),
                ("∀x1,x2: x3", forall(var("x3"), &["x1", "x2"])),
                (
                    "∃x3: ∀x1,x2: (-x1 ∨ (x1 ∧ x2 ∧ x3))",
                    exists(
                        forall(
                            or(vec![
                                not(var("x1")),
                                and(vec![var("x1"), var("x2"), var("x3")]),
                            ]),
                            &["x1", "x2"],
                        ),
                        &["x3"],
                    ),
                ),
            ])
            .should_accept([
                "∀z: (z ∨ ∃x1,x2: (x1 ∧ x2 ∧ z))",
                "((a ∧ b) ∨ -c)",
                "∀x : y",
            ])
            .should_reject([
                "",
                "()",
                "(x1)",
                "(x1 ∧)",
                "(x1 ∧ x2 ∨ x3)",
                "x1 ∧ x2",
                "x1 x2",
                "∀: x1",
                "∀x1 x2: x3",
                "∀x1:",
                "-",
                "(x1 ∧ x2",
            ]);
    }

    #[test]
    fn parse_format_identity() {
        for formula in [
            "TRUE",
            "(TRUE ∨ FALSE)",
            "∃x3: ∀x1,x2: (-x1 ∨ (x1 ∧ x2 ∧ x3))",
            "∀z: (z ∨ ∃x1,x2: (x1 ∧ x2 ∧ z))",
        ] {
            assert_eq!(formula.parse::<Formula>().unwrap().to_string(), formula);
        }
    }
}
