use {
    crate::syntax_tree::qbf::{Formula, QuantifierKind},
    indexmap::IndexSet,
    itertools::Itertools,
    std::collections::HashMap,
};

/// Transforms a formula in negation normal form into prenex normal form.
pub trait PrenexingStrategy {
    fn apply(&self, formula: Formula) -> Formula;
}

/// Prenexing by quantifier shifting: pick a critical q-path as the backbone
/// of the prefix, then distribute the variables of all q-paths over its
/// positions.
pub trait ShiftingStrategy {
    fn select_critical_path(&self, critical_paths: Vec<Formula>) -> Formula;

    fn variable_ordering(
        &self,
        critical_path: &Formula,
        qpaths: &mut Vec<Formula>,
    ) -> Vec<IndexSet<String>>;
}

impl<T: ShiftingStrategy> PrenexingStrategy for T {
    fn apply(&self, formula: Formula) -> Formula {
        let mut qpaths = formula.qpaths();

        // propositional formula
        if qpaths.is_empty() {
            return formula;
        }

        let skeleton = formula.skeleton();

        // single quantified subformula
        if qpaths.len() == 1 {
            let ordering = path_ordering(&qpaths[0]);
            return assemble(&qpaths[0], ordering, skeleton);
        }

        let critical_paths = Formula::critical_paths(&qpaths);

        // all q-paths equal: single critical path and uniform length
        if critical_paths.len() == 1
            && qpaths.iter().map(|qpath| qpath.prefix().count()).all_equal()
        {
            let ordering = merged_ordering(&qpaths);
            return assemble(&qpaths[0], ordering, skeleton);
        }

        // q-paths differ
        let critical_path = self.select_critical_path(critical_paths);
        let ordering = self.variable_ordering(&critical_path, &mut qpaths);
        assemble(&critical_path, ordering, skeleton)
    }
}

fn path_ordering(qpath: &Formula) -> Vec<IndexSet<String>> {
    qpath
        .prefix()
        .map(|(_, quantification)| quantification.variables.clone())
        .collect()
}

fn merged_ordering(qpaths: &[Formula]) -> Vec<IndexSet<String>> {
    let mut ordering = path_ordering(&qpaths[0]);
    for qpath in &qpaths[1..] {
        for (position, (_, quantification)) in qpath.prefix().enumerate() {
            ordering[position].extend(quantification.variables.iter().cloned());
        }
    }
    ordering
}

fn assemble(backbone: &Formula, ordering: Vec<IndexSet<String>>, skeleton: Formula) -> Formula {
    let kinds: Vec<QuantifierKind> = backbone.prefix().map(|(kind, _)| kind).collect();
    assert_eq!(kinds.len(), ordering.len());

    kinds
        .into_iter()
        .rev()
        .zip(ordering.into_iter().rev())
        .fold(skeleton, |subformula, (kind, variables)| {
            kind.quantify(subformula, variables)
        })
}

/// Shifting driven by two per-position predicates over the number of
/// quantifiers remaining in a q-path and in the backbone. At each backbone
/// position, every q-path whose leading quantifier matches in kind offers its
/// variables: a variable is placed if it occurs at this position of the
/// backbone or if the policy's predicate for the kind says so. Drained
/// leading quantifiers advance their q-path; exhausted q-paths drop out.
pub trait SimpleUpDownStrategy {
    fn select_forall(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool;
    fn select_exists(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool;
}

impl<T: SimpleUpDownStrategy> ShiftingStrategy for T {
    // prefer existentially quantified prefixes
    fn select_critical_path(&self, critical_paths: Vec<Formula>) -> Formula {
        critical_paths
            .iter()
            .find(|path| path.is_exists())
            .unwrap_or(&critical_paths[0])
            .clone()
    }

    fn variable_ordering(
        &self,
        critical_path: &Formula,
        qpaths: &mut Vec<Formula>,
    ) -> Vec<IndexSet<String>> {
        // variables not yet placed, per quantifier node of the q-paths
        let mut remaining: HashMap<Formula, IndexSet<String>> = HashMap::new();
        for qpath in qpaths.iter() {
            let mut node = qpath.clone();
            while let Some((_, quantification)) = node.as_quantifier() {
                let subformula = quantification.subformula.clone();
                remaining.insert(node.clone(), quantification.variables.clone());
                node = subformula;
            }
        }

        let backbone: Vec<(QuantifierKind, IndexSet<String>)> = critical_path
            .prefix()
            .map(|(kind, quantification)| (kind, quantification.variables.clone()))
            .collect();

        let mut remaining_in_backbone = backbone.len();
        let mut ordering = Vec::with_capacity(backbone.len());

        for (kind, critical) in backbone {
            let mut selected = IndexSet::new();

            for qpath in qpaths.iter_mut() {
                let Some((head, _)) = qpath.as_quantifier() else {
                    continue;
                };
                if head != kind {
                    continue;
                }

                let remaining_in_path = qpath.prefix().count();
                let select = match head {
                    QuantifierKind::ForAll => {
                        self.select_forall(remaining_in_path, remaining_in_backbone)
                    }
                    QuantifierKind::Exists => {
                        self.select_exists(remaining_in_path, remaining_in_backbone)
                    }
                };

                let Some(variables) = remaining.get_mut(qpath) else {
                    continue;
                };

                let merged: IndexSet<String> = variables
                    .iter()
                    .filter(|variable| critical.contains(*variable) || select)
                    .cloned()
                    .collect();
                variables.retain(|variable| !merged.contains(variable));
                let drained = variables.is_empty();
                selected.extend(merged);

                if drained {
                    if let Some((_, quantification)) = qpath.as_quantifier() {
                        let subformula = quantification.subformula.clone();
                        *qpath = subformula;
                    }
                }
            }

            qpaths.retain(Formula::is_quantifier);
            remaining_in_backbone -= 1;
            ordering.push(selected);
        }

        ordering
    }
}

/// Shift universal and existential quantifiers up as far as possible.
pub struct ForAllUpExistsUp;

impl SimpleUpDownStrategy for ForAllUpExistsUp {
    fn select_forall(&self, _remaining_in_path: usize, _remaining_in_backbone: usize) -> bool {
        true
    }

    fn select_exists(&self, _remaining_in_path: usize, _remaining_in_backbone: usize) -> bool {
        true
    }
}

/// Shift universal quantifiers up and existential quantifiers down.
pub struct ForAllUpExistsDown;

impl SimpleUpDownStrategy for ForAllUpExistsDown {
    fn select_forall(&self, _remaining_in_path: usize, _remaining_in_backbone: usize) -> bool {
        true
    }

    fn select_exists(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool {
        remaining_in_path > 1 || remaining_in_backbone <= 2
    }
}

/// Shift universal quantifiers down and existential quantifiers up.
pub struct ForAllDownExistsUp;

impl SimpleUpDownStrategy for ForAllDownExistsUp {
    fn select_forall(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool {
        remaining_in_backbone.saturating_sub(remaining_in_path) <= 1
    }

    fn select_exists(&self, _remaining_in_path: usize, _remaining_in_backbone: usize) -> bool {
        true
    }
}

/// Shift universal and existential quantifiers down as far as possible.
pub struct ForAllDownExistsDown;

impl SimpleUpDownStrategy for ForAllDownExistsDown {
    fn select_forall(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool {
        remaining_in_backbone.saturating_sub(remaining_in_path) <= 1
    }

    fn select_exists(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool {
        remaining_in_backbone.saturating_sub(remaining_in_path) <= 1
    }
}

/// Shift existential quantifiers up and universal quantifiers down.
pub struct ExistsUpForAllDown;

impl SimpleUpDownStrategy for ExistsUpForAllDown {
    fn select_forall(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool {
        remaining_in_path > 1 || remaining_in_backbone <= 2
    }

    fn select_exists(&self, _remaining_in_path: usize, _remaining_in_backbone: usize) -> bool {
        true
    }
}

/// Shift existential quantifiers down and universal quantifiers up.
pub struct ExistsDownForAllUp;

impl SimpleUpDownStrategy for ExistsDownForAllUp {
    fn select_forall(&self, _remaining_in_path: usize, _remaining_in_backbone: usize) -> bool {
        true
    }

    fn select_exists(&self, remaining_in_path: usize, remaining_in_backbone: usize) -> bool {
        remaining_in_backbone.saturating_sub(remaining_in_path) <= 1
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{
            ExistsDownForAllUp, ExistsUpForAllDown, ForAllDownExistsDown, ForAllDownExistsUp,
            ForAllUpExistsDown, ForAllUpExistsUp, PrenexingStrategy,
        },
        crate::syntax_tree::qbf::{
            tests::{and, exists, forall, g14, lncs, not, or, var},
            Formula,
        },
    };

    fn strategies() -> Vec<Box<dyn PrenexingStrategy>> {
        vec![
            Box::new(ForAllUpExistsUp),
            Box::new(ForAllUpExistsDown),
            Box::new(ForAllDownExistsUp),
            Box::new(ForAllDownExistsDown),
            Box::new(ExistsUpForAllDown),
            Box::new(ExistsDownForAllUp),
        ]
    }

    #[test]
    fn propositional_formulas_are_left_alone() {
        // negation normal form, so only the empty-q-path early return runs
        let propositional = or(vec![not(var("x1")), and(vec![var("x2"), var("x3")])]);
        for strategy in strategies() {
            assert_eq!(propositional.to_pnf(strategy.as_ref()), propositional);
        }
    }

    #[test]
    fn propositional_formulas_are_normalized() {
        let negated_gate = or(vec![var("x1"), not(and(vec![var("x2"), var("x3")]))]);
        for strategy in strategies() {
            assert_eq!(
                negated_gate.to_pnf(strategy.as_ref()),
                or(vec![var("x1"), or(vec![not(var("x2")), not(var("x3"))])])
            );
        }
    }

    #[test]
    fn single_qpath_is_assembled_verbatim() {
        for strategy in strategies() {
            assert_eq!(
                g14().to_pnf(strategy.as_ref()).to_string(),
                "∀z: ∃x1,x2: (z ∨ (x1 ∧ x2 ∧ z))"
            );
        }
    }

    #[test]
    fn uniform_qpaths_are_merged_per_position() {
        let uniform = and(vec![
            forall(exists(forall(var("ϕ0"), &["x3"]), &["x2"]), &["x1"]),
            forall(exists(forall(var("ϕ1"), &["x6"]), &["x5"]), &["x4"]),
            forall(exists(forall(var("ϕ2"), &["x9"]), &["x8"]), &["x7"]),
        ]);
        for strategy in strategies() {
            assert_eq!(
                uniform.to_pnf(strategy.as_ref()).to_string(),
                "∀x1,x4,x7: ∃x2,x5,x8: ∀x3,x6,x9: (ϕ0 ∧ ϕ1 ∧ ϕ2)"
            );
        }
    }

    #[test]
    fn backbone_selection_prefers_existential_heads() {
        let differing = and(vec![
            forall(exists(var("x3"), &["x2"]), &["x1"]),
            exists(forall(var("x6"), &["x5"]), &["x4"]),
        ]);
        assert_eq!(
            differing.to_pnf(&ForAllUpExistsUp).to_string(),
            "∃x4: ∀x1,x5: ∃x2: (x3 ∧ x6)"
        );
    }

    // The running example of Egly, Seidl, Tompits, Woltran and Zolda,
    // "Comparing Different Prenexing Strategies for Quantified Boolean
    // Formulas" (LNCS 2919), one expected prefix per strategy.
    #[test]
    fn policies_differ_on_the_lncs_example() {
        let body = " (ϕ0 ∧ ϕ1 ∧ -ϕ2)";
        let cases: Vec<(Box<dyn PrenexingStrategy>, String)> = vec![
            (
                Box::new(ForAllUpExistsUp),
                format!("∃p,q'': ∀q,q',r'': ∃r,r': ∀s: ∃t:{body}"),
            ),
            (
                Box::new(ForAllUpExistsDown),
                format!("∃p,q'': ∀q,q',r'': ∃r: ∀s: ∃r',t:{body}"),
            ),
            (
                Box::new(ForAllDownExistsUp),
                format!("∃p,q'': ∀q: ∃r: ∀q',r'',s: ∃r',t:{body}"),
            ),
            (
                Box::new(ForAllDownExistsDown),
                format!("∃p: ∀q: ∃q'',r: ∀q',r'',s: ∃r',t:{body}"),
            ),
            (
                Box::new(ExistsUpForAllDown),
                format!("∃p,q'': ∀q,q': ∃r,r': ∀r'',s: ∃t:{body}"),
            ),
            (
                Box::new(ExistsDownForAllUp),
                format!("∃p: ∀q,q': ∃q'',r: ∀r'',s: ∃r',t:{body}"),
            ),
        ];

        for (strategy, expected) in cases {
            assert_eq!(lncs().to_pnf(strategy.as_ref()).to_string(), expected);
        }
    }

    #[test]
    fn prenexing_is_idempotent() {
        let pnf = lncs().to_pnf(&ForAllUpExistsUp);
        assert_eq!(pnf.to_pnf(&ForAllUpExistsUp), pnf);

        let pnf = lncs().to_pnf(&ForAllDownExistsDown);
        assert_eq!(pnf.to_pnf(&ForAllDownExistsDown), pnf);
    }

    #[test]
    fn prefix_shape_is_the_backbone() {
        let pnf = lncs().to_pnf(&ForAllUpExistsUp);
        assert_eq!(pnf.prefix().count(), 5);
        assert!(pnf.is_exists());
        assert_eq!(pnf.skeleton(), lncs().skeleton().to_nnf());
    }

    #[test]
    fn custom_strategies_plug_in() {
        struct Unchanged;

        impl PrenexingStrategy for Unchanged {
            fn apply(&self, formula: Formula) -> Formula {
                formula
            }
        }

        assert_eq!(lncs().to_pnf(&Unchanged), lncs().to_nnf());
    }
}
