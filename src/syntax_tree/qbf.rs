use {
    crate::{
        encoding::{CnfEncoder, EncodeError},
        formatting::qbf::default::{Format, QuantifierBlock},
        parsing::qbf::pest::FormulaParser,
        prenexing::PrenexingStrategy,
        syntax_tree::{impl_node, Node},
    },
    indexmap::IndexSet,
    itertools::Itertools,
    lazy_static::lazy_static,
    std::{
        collections::{hash_map::DefaultHasher, HashMap},
        hash::{Hash, Hasher},
        sync::Arc,
    },
    thiserror::Error,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum FormulaError {
    #[error("missing variable")]
    MissingVariable,
    #[error("missing subformulas")]
    MissingSubformulas,
    #[error("not a quantifier")]
    NotAQuantifier,
}

/// A quantified boolean formula.
///
/// `Formula` is an immutable tree over the connectives ¬, ∧, ∨, ∀ and ∃.
/// Nodes are reference counted and may be shared between parents, so the
/// structure is in general a DAG; all operations treat structurally equal
/// subtrees as interchangeable.
#[derive(Clone, Debug)]
pub struct Formula(Arc<FormulaNode>);

#[derive(Debug)]
struct FormulaNode {
    hash: u64,
    kind: FormulaKind,
}

#[derive(Clone, Debug)]
pub enum FormulaKind {
    True,
    False,
    Variable(String),
    Not(Formula),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    ForAll(Quantification),
    Exists(Quantification),
}

/// The variable set and body of a quantifier node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Quantification {
    pub variables: IndexSet<String>,
    pub subformula: Formula,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum QuantifierKind {
    ForAll,
    Exists,
}

impl QuantifierKind {
    pub fn flip(self) -> QuantifierKind {
        match self {
            QuantifierKind::ForAll => QuantifierKind::Exists,
            QuantifierKind::Exists => QuantifierKind::ForAll,
        }
    }

    /// Builds a quantifier of this kind around `subformula`.
    ///
    /// A directly nested quantifier of the same kind is folded into the new
    /// node, with the variable sets merged into one.
    pub fn bind<I, S>(self, subformula: Formula, variables: I) -> Result<Formula, FormulaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variables: IndexSet<String> = variables.into_iter().map(Into::into).collect();
        let (subformula, variables) = fold_same_kind(self, subformula, variables);
        if variables.is_empty() {
            return Err(FormulaError::MissingVariable);
        }
        Ok(Formula::new(self.node(subformula, variables)))
    }

    // Infallible variant for rebuilding quantifiers whose variable set is
    // known to be non-empty.
    pub(crate) fn quantify(self, subformula: Formula, variables: IndexSet<String>) -> Formula {
        let (subformula, variables) = fold_same_kind(self, subformula, variables);
        assert!(!variables.is_empty(), "missing variable");
        Formula::new(self.node(subformula, variables))
    }

    fn node(self, subformula: Formula, variables: IndexSet<String>) -> FormulaKind {
        let quantification = Quantification {
            variables,
            subformula,
        };
        match self {
            QuantifierKind::ForAll => FormulaKind::ForAll(quantification),
            QuantifierKind::Exists => FormulaKind::Exists(quantification),
        }
    }
}

fn fold_same_kind(
    kind: QuantifierKind,
    subformula: Formula,
    mut variables: IndexSet<String>,
) -> (Formula, IndexSet<String>) {
    let folded = match (kind, subformula.kind()) {
        (QuantifierKind::ForAll, FormulaKind::ForAll(inner))
        | (QuantifierKind::Exists, FormulaKind::Exists(inner)) => {
            variables.extend(inner.variables.iter().cloned());
            Some(inner.subformula.clone())
        }
        _ => None,
    };
    (folded.unwrap_or(subformula), variables)
}

lazy_static! {
    static ref TOP: Formula = Formula::new(FormulaKind::True);
    static ref BOTTOM: Formula = Formula::new(FormulaKind::False);
}

impl Formula {
    fn new(kind: FormulaKind) -> Formula {
        let hash = structural_hash(&kind);
        Formula(Arc::new(FormulaNode { hash, kind }))
    }

    /// The boolean constant `TRUE`.
    pub fn top() -> Formula {
        TOP.clone()
    }

    /// The boolean constant `FALSE`.
    pub fn bottom() -> Formula {
        BOTTOM.clone()
    }

    pub fn variable<S: Into<String>>(name: S) -> Result<Formula, FormulaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FormulaError::MissingVariable);
        }
        Ok(Formula::new(FormulaKind::Variable(name)))
    }

    pub fn not(subformula: Formula) -> Formula {
        Formula::new(FormulaKind::Not(subformula))
    }

    pub fn and(subformulas: Vec<Formula>) -> Result<Formula, FormulaError> {
        if subformulas.len() < 2 {
            return Err(FormulaError::MissingSubformulas);
        }
        Ok(Formula::new(FormulaKind::And(subformulas)))
    }

    pub fn or(subformulas: Vec<Formula>) -> Result<Formula, FormulaError> {
        if subformulas.len() < 2 {
            return Err(FormulaError::MissingSubformulas);
        }
        Ok(Formula::new(FormulaKind::Or(subformulas)))
    }

    pub fn forall<I, S>(subformula: Formula, variables: I) -> Result<Formula, FormulaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QuantifierKind::ForAll.bind(subformula, variables)
    }

    pub fn exists<I, S>(subformula: Formula, variables: I) -> Result<Formula, FormulaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QuantifierKind::Exists.bind(subformula, variables)
    }

    pub fn kind(&self) -> &FormulaKind {
        &self.0.kind
    }

    /// Narrows to a quantifier node, failing on anything else.
    pub fn quantifier(&self) -> Result<(QuantifierKind, &Quantification), FormulaError> {
        self.as_quantifier().ok_or(FormulaError::NotAQuantifier)
    }

    pub fn as_quantifier(&self) -> Option<(QuantifierKind, &Quantification)> {
        match self.kind() {
            FormulaKind::ForAll(quantification) => Some((QuantifierKind::ForAll, quantification)),
            FormulaKind::Exists(quantification) => Some((QuantifierKind::Exists, quantification)),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), FormulaKind::True | FormulaKind::False)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind(), FormulaKind::Variable(_))
    }

    pub fn is_negation(&self) -> bool {
        matches!(self.kind(), FormulaKind::Not(_))
    }

    pub fn is_and(&self) -> bool {
        matches!(self.kind(), FormulaKind::And(_))
    }

    pub fn is_or(&self) -> bool {
        matches!(self.kind(), FormulaKind::Or(_))
    }

    pub fn is_quantifier(&self) -> bool {
        self.as_quantifier().is_some()
    }

    pub fn is_forall(&self) -> bool {
        matches!(self.kind(), FormulaKind::ForAll(_))
    }

    pub fn is_exists(&self) -> bool {
        matches!(self.kind(), FormulaKind::Exists(_))
    }

    pub fn is_literal(&self) -> bool {
        match self.kind() {
            FormulaKind::Variable(_) => true,
            FormulaKind::Not(subformula) => subformula.is_literal(),
            _ => false,
        }
    }

    /// Tests for conjunctive normal form: a conjunction whose operands are
    /// literals or disjunctions of literals.
    pub fn is_cnf(&self) -> bool {
        match self.kind() {
            FormulaKind::And(subformulas) => subformulas.iter().all(|f| {
                f.is_literal()
                    || matches!(
                        f.kind(),
                        FormulaKind::Or(operands) if operands.iter().all(Formula::is_literal)
                    )
            }),
            _ => false,
        }
    }

    /// Iterates over all nodes depth first, in the given order.
    pub fn iter(&self, traversal: Traversal) -> Iter<'_> {
        Iter {
            traversal,
            stack: vec![(self, false)],
        }
    }

    /// All variable names in traversal order, with repetition. At a
    /// quantifier, the bound names come before the names in its body.
    pub fn variables(&self) -> Variables<'_> {
        Variables {
            stack: vec![VariablesItem::Node(self)],
            bound_only: false,
        }
    }

    /// The variable set members of every quantifier, in traversal order.
    pub fn bound_variables(&self) -> Variables<'_> {
        Variables {
            stack: vec![VariablesItem::Node(self)],
            bound_only: true,
        }
    }

    /// Variable names reachable without crossing a quantifier binding them.
    pub fn free_variables(&self) -> FreeVariables<'_> {
        FreeVariables {
            stack: vec![FreeVariablesItem::Node(self)],
            binders: vec![],
        }
    }

    /// The maximal run of quantifiers reachable by descending into quantifier
    /// bodies, stopping at the first non-quantifier.
    pub fn prefix(&self) -> Prefix<'_> {
        Prefix {
            current: Some(self),
        }
    }

    /// The heads of this formula's q-paths.
    ///
    /// Gates contribute the q-paths of all their operands, a quantifier
    /// rewraps each q-path of its body (or is itself a sole q-path if the
    /// body has none). Constants, variables and negations contribute nothing:
    /// the input is expected to be in negation normal form, where a negation
    /// only ever wraps a variable.
    pub fn qpaths(&self) -> Vec<Formula> {
        match self.kind() {
            FormulaKind::True | FormulaKind::False | FormulaKind::Variable(_) => vec![],
            FormulaKind::Not(_) => vec![],
            FormulaKind::And(subformulas) | FormulaKind::Or(subformulas) => subformulas
                .iter()
                .flat_map(|subformula| subformula.qpaths())
                .collect(),
            FormulaKind::ForAll(quantification) => {
                self.rewrap_qpaths(QuantifierKind::ForAll, quantification)
            }
            FormulaKind::Exists(quantification) => {
                self.rewrap_qpaths(QuantifierKind::Exists, quantification)
            }
        }
    }

    fn rewrap_qpaths(&self, kind: QuantifierKind, quantification: &Quantification) -> Vec<Formula> {
        let child_paths = quantification.subformula.qpaths();
        if child_paths.is_empty() {
            vec![self.clone()]
        } else {
            child_paths
                .into_iter()
                .map(|path| kind.quantify(path, quantification.variables.clone()))
                .collect()
        }
    }

    /// Selects the critical paths among the given q-paths: those of maximal
    /// prefix length, keeping the first of each leading quantifier kind. If
    /// two paths of differing kind remain, each is completed by prepending
    /// the other's leading quantifier, yielding two alternation-complete
    /// backbones.
    pub fn critical_paths(qpaths: &[Formula]) -> Vec<Formula> {
        let Some(max) = qpaths.iter().map(|path| path.prefix().count()).max() else {
            return vec![];
        };

        let mut seen_forall = false;
        let mut seen_exists = false;
        let mut critical: Vec<Formula> = qpaths
            .iter()
            .filter(|path| path.prefix().count() == max)
            .filter(|path| match path.kind() {
                FormulaKind::ForAll(_) => !std::mem::replace(&mut seen_forall, true),
                FormulaKind::Exists(_) => !std::mem::replace(&mut seen_exists, true),
                _ => false,
            })
            .cloned()
            .collect();

        if critical.len() > 1 {
            let first = critical[0].clone();
            let second = critical[1].clone();
            critical[0] = prepend_leading_quantifier(&first, second.clone());
            critical[1] = prepend_leading_quantifier(&second, first);
        }

        critical
    }

    /// The propositional skeleton: this formula with all quantifiers deleted.
    pub fn skeleton(&self) -> Formula {
        match self.kind() {
            FormulaKind::True | FormulaKind::False | FormulaKind::Variable(_) => self.clone(),
            FormulaKind::Not(subformula) => match subformula.kind() {
                FormulaKind::True | FormulaKind::False | FormulaKind::Variable(_) => self.clone(),
                _ => Formula::not(subformula.skeleton()),
            },
            FormulaKind::And(subformulas) => Formula::new(FormulaKind::And(
                subformulas.iter().map(Formula::skeleton).collect(),
            )),
            FormulaKind::Or(subformulas) => Formula::new(FormulaKind::Or(
                subformulas.iter().map(Formula::skeleton).collect(),
            )),
            FormulaKind::ForAll(quantification) | FormulaKind::Exists(quantification) => {
                quantification.subformula.skeleton()
            }
        }
    }

    /// Merges sequences of equal quantifiers in the prefix, e.g.
    /// `∀x: ∀y: φ` into `∀x,y: φ`.
    pub fn unify_prefix(&self) -> Formula {
        match self.kind() {
            FormulaKind::ForAll(outer) => {
                self.unify_prefix_quantifier(QuantifierKind::ForAll, outer)
            }
            FormulaKind::Exists(outer) => {
                self.unify_prefix_quantifier(QuantifierKind::Exists, outer)
            }
            _ => self.clone(),
        }
    }

    fn unify_prefix_quantifier(&self, kind: QuantifierKind, outer: &Quantification) -> Formula {
        match (kind, outer.subformula.kind()) {
            (QuantifierKind::ForAll, FormulaKind::ForAll(inner))
            | (QuantifierKind::Exists, FormulaKind::Exists(inner)) => {
                let mut variables = outer.variables.clone();
                variables.extend(inner.variables.iter().cloned());
                kind.quantify(inner.subformula.clone(), variables)
                    .unify_prefix()
            }
            (QuantifierKind::ForAll, FormulaKind::Exists(_))
            | (QuantifierKind::Exists, FormulaKind::ForAll(_)) => {
                kind.quantify(outer.subformula.unify_prefix(), outer.variables.clone())
            }
            _ => self.clone(),
        }
    }

    /// Negates this formula without rewriting below the top: constants flip,
    /// a negation is unwrapped, anything else is wrapped in a negation.
    pub fn negate(&self) -> Formula {
        match self.kind() {
            FormulaKind::True => Formula::bottom(),
            FormulaKind::False => Formula::top(),
            FormulaKind::Not(subformula) => subformula.clone(),
            _ => Formula::not(self.clone()),
        }
    }

    /// Renames every variable present as a key in `variables`, including
    /// names inside quantifier variable sets.
    pub fn rename(&self, variables: &HashMap<String, String>) -> Formula {
        match self.kind() {
            FormulaKind::True | FormulaKind::False => self.clone(),
            FormulaKind::Variable(name) => match variables.get(name) {
                Some(renamed) => Formula::new(FormulaKind::Variable(renamed.clone())),
                None => self.clone(),
            },
            FormulaKind::Not(subformula) => Formula::not(subformula.rename(variables)),
            FormulaKind::And(subformulas) => Formula::new(FormulaKind::And(
                subformulas.iter().map(|f| f.rename(variables)).collect(),
            )),
            FormulaKind::Or(subformulas) => Formula::new(FormulaKind::Or(
                subformulas.iter().map(|f| f.rename(variables)).collect(),
            )),
            FormulaKind::ForAll(quantification) => {
                QuantifierKind::ForAll.quantify(
                    quantification.subformula.rename(variables),
                    rename_set(&quantification.variables, variables),
                )
            }
            FormulaKind::Exists(quantification) => {
                QuantifierKind::Exists.quantify(
                    quantification.subformula.rename(variables),
                    rename_set(&quantification.variables, variables),
                )
            }
        }
    }

    /// Produces a cleansed formula:
    ///
    /// 1. a variable is quantified at most once,
    /// 2. a variable is either quantified or free,
    /// 3. quantifiers keep exactly the variables referenced in their scope
    ///    (quantifiers left without any collapse to their body),
    /// 4. variables are renamed to integers in order of first occurrence,
    ///    starting from 1.
    pub fn cleanse(&self) -> Formula {
        Cleanser::default().cleanse(self)
    }

    /// Pushes negation to the leaves, flipping quantifiers and dualizing
    /// gates on the way down. Idempotent.
    pub fn to_nnf(&self) -> Formula {
        match self.kind() {
            FormulaKind::True | FormulaKind::False | FormulaKind::Variable(_) => self.clone(),
            FormulaKind::Not(negated) => match negated.kind() {
                FormulaKind::True => Formula::bottom(),
                FormulaKind::False => Formula::top(),
                FormulaKind::Variable(_) | FormulaKind::Not(_) => self.clone(),
                FormulaKind::And(subformulas) => Formula::new(FormulaKind::Or(
                    subformulas.iter().map(|f| f.negate().to_nnf()).collect(),
                )),
                FormulaKind::Or(subformulas) => Formula::new(FormulaKind::And(
                    subformulas.iter().map(|f| f.negate().to_nnf()).collect(),
                )),
                FormulaKind::ForAll(quantification) => QuantifierKind::ForAll.flip().quantify(
                    quantification.subformula.negate().to_nnf(),
                    quantification.variables.clone(),
                ),
                FormulaKind::Exists(quantification) => QuantifierKind::Exists.flip().quantify(
                    quantification.subformula.negate().to_nnf(),
                    quantification.variables.clone(),
                ),
            },
            FormulaKind::And(subformulas) => Formula::new(FormulaKind::And(
                subformulas.iter().map(Formula::to_nnf).collect(),
            )),
            FormulaKind::Or(subformulas) => Formula::new(FormulaKind::Or(
                subformulas.iter().map(Formula::to_nnf).collect(),
            )),
            FormulaKind::ForAll(quantification) => QuantifierKind::ForAll.quantify(
                quantification.subformula.to_nnf(),
                quantification.variables.clone(),
            ),
            FormulaKind::Exists(quantification) => QuantifierKind::Exists.quantify(
                quantification.subformula.to_nnf(),
                quantification.variables.clone(),
            ),
        }
    }

    /// Transforms this formula into prenex normal form.
    pub fn to_pnf<S>(&self, strategy: &S) -> Formula
    where
        S: PrenexingStrategy + ?Sized,
    {
        strategy.apply(self.to_nnf())
    }

    /// Transforms this formula into prenex conjunctive normal form.
    pub fn to_pcnf<S, E>(&self, strategy: &S, encoder: &E) -> Result<Formula, EncodeError>
    where
        S: PrenexingStrategy + ?Sized,
        E: CnfEncoder + ?Sized,
    {
        encoder.apply(self.to_pnf(strategy))
    }

    /// The prefix as a string, e.g. `∃p ∀q,r`.
    pub fn prefix_to_string(&self) -> String {
        self.prefix()
            .map(|(kind, quantification)| QuantifierBlock(kind, quantification).to_string())
            .join(" ")
    }
}

fn prepend_leading_quantifier(head_of: &Formula, onto: Formula) -> Formula {
    let (kind, quantification) = head_of.quantifier().expect("not a quantifier");
    kind.quantify(onto, quantification.variables.clone())
}

fn rename_set(variables: &IndexSet<String>, renaming: &HashMap<String, String>) -> IndexSet<String> {
    variables
        .iter()
        .map(|name| renaming.get(name).unwrap_or(name).clone())
        .collect()
}

fn structural_hash(kind: &FormulaKind) -> u64 {
    // Hashed once, bottom up, from a per-variant discriminant and the cached
    // hashes of the children. Quantifier variable sets are hashed order
    // independently, matching set equality.
    fn set_hash(variables: &IndexSet<String>) -> u64 {
        variables
            .iter()
            .map(|name| {
                let mut hasher = DefaultHasher::new();
                name.hash(&mut hasher);
                hasher.finish()
            })
            .fold(0, u64::wrapping_add)
    }

    let mut hasher = DefaultHasher::new();
    match kind {
        FormulaKind::True => 0u8.hash(&mut hasher),
        FormulaKind::False => 1u8.hash(&mut hasher),
        FormulaKind::Variable(name) => {
            2u8.hash(&mut hasher);
            name.hash(&mut hasher);
        }
        FormulaKind::Not(subformula) => {
            3u8.hash(&mut hasher);
            hasher.write_u64(subformula.0.hash);
        }
        FormulaKind::And(subformulas) => {
            4u8.hash(&mut hasher);
            for subformula in subformulas {
                hasher.write_u64(subformula.0.hash);
            }
        }
        FormulaKind::Or(subformulas) => {
            5u8.hash(&mut hasher);
            for subformula in subformulas {
                hasher.write_u64(subformula.0.hash);
            }
        }
        FormulaKind::ForAll(quantification) => {
            6u8.hash(&mut hasher);
            hasher.write_u64(quantification.subformula.0.hash);
            hasher.write_u64(set_hash(&quantification.variables));
        }
        FormulaKind::Exists(quantification) => {
            7u8.hash(&mut hasher);
            hasher.write_u64(quantification.subformula.0.hash);
            hasher.write_u64(set_hash(&quantification.variables));
        }
    }
    hasher.finish()
}

// Genuine structural equality with a shared-node and a cached-hash fast
// path. The original defined equality as hash equality alone, which is a
// latent collision risk; comparing the structure is the deliberate fix.
impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.0.hash != other.0.hash {
            return false;
        }
        match (self.kind(), other.kind()) {
            (FormulaKind::True, FormulaKind::True) => true,
            (FormulaKind::False, FormulaKind::False) => true,
            (FormulaKind::Variable(a), FormulaKind::Variable(b)) => a == b,
            (FormulaKind::Not(a), FormulaKind::Not(b)) => a == b,
            (FormulaKind::And(a), FormulaKind::And(b)) => a == b,
            (FormulaKind::Or(a), FormulaKind::Or(b)) => a == b,
            (FormulaKind::ForAll(a), FormulaKind::ForAll(b)) => a == b,
            (FormulaKind::Exists(a), FormulaKind::Exists(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl_node!(Formula, Format, FormulaParser);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Traversal {
    PreOrder,
    PostOrder,
}

pub struct Iter<'a> {
    traversal: Traversal,
    stack: Vec<(&'a Formula, bool)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Formula;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (formula, expanded) = self.stack.pop()?;
            match self.traversal {
                Traversal::PreOrder => {
                    push_children(&mut self.stack, formula);
                    return Some(formula);
                }
                Traversal::PostOrder => {
                    if expanded {
                        return Some(formula);
                    }
                    self.stack.push((formula, true));
                    push_children(&mut self.stack, formula);
                }
            }
        }
    }
}

fn push_children<'a>(stack: &mut Vec<(&'a Formula, bool)>, formula: &'a Formula) {
    match formula.kind() {
        FormulaKind::True | FormulaKind::False | FormulaKind::Variable(_) => {}
        FormulaKind::Not(subformula) => stack.push((subformula, false)),
        FormulaKind::And(subformulas) | FormulaKind::Or(subformulas) => {
            for subformula in subformulas.iter().rev() {
                stack.push((subformula, false));
            }
        }
        FormulaKind::ForAll(quantification) | FormulaKind::Exists(quantification) => {
            stack.push((&quantification.subformula, false));
        }
    }
}

pub struct Variables<'a> {
    stack: Vec<VariablesItem<'a>>,
    bound_only: bool,
}

enum VariablesItem<'a> {
    Node(&'a Formula),
    Name(&'a str),
}

impl<'a> Iterator for Variables<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                VariablesItem::Name(name) => return Some(name),
                VariablesItem::Node(formula) => match formula.kind() {
                    FormulaKind::True | FormulaKind::False => {}
                    FormulaKind::Variable(name) => {
                        if !self.bound_only {
                            return Some(name);
                        }
                    }
                    FormulaKind::Not(subformula) => {
                        self.stack.push(VariablesItem::Node(subformula));
                    }
                    FormulaKind::And(subformulas) | FormulaKind::Or(subformulas) => {
                        for subformula in subformulas.iter().rev() {
                            self.stack.push(VariablesItem::Node(subformula));
                        }
                    }
                    FormulaKind::ForAll(quantification) | FormulaKind::Exists(quantification) => {
                        self.stack
                            .push(VariablesItem::Node(&quantification.subformula));
                        for name in quantification.variables.iter().rev() {
                            self.stack.push(VariablesItem::Name(name));
                        }
                    }
                },
            }
        }
    }
}

pub struct FreeVariables<'a> {
    stack: Vec<FreeVariablesItem<'a>>,
    binders: Vec<&'a IndexSet<String>>,
}

enum FreeVariablesItem<'a> {
    Node(&'a Formula),
    Unbind,
}

impl<'a> Iterator for FreeVariables<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                FreeVariablesItem::Unbind => {
                    self.binders.pop();
                }
                FreeVariablesItem::Node(formula) => match formula.kind() {
                    FormulaKind::True | FormulaKind::False => {}
                    FormulaKind::Variable(name) => {
                        if !self.binders.iter().any(|binder| binder.contains(name)) {
                            return Some(name);
                        }
                    }
                    FormulaKind::Not(subformula) => {
                        self.stack.push(FreeVariablesItem::Node(subformula));
                    }
                    FormulaKind::And(subformulas) | FormulaKind::Or(subformulas) => {
                        for subformula in subformulas.iter().rev() {
                            self.stack.push(FreeVariablesItem::Node(subformula));
                        }
                    }
                    FormulaKind::ForAll(quantification) | FormulaKind::Exists(quantification) => {
                        self.binders.push(&quantification.variables);
                        self.stack.push(FreeVariablesItem::Unbind);
                        self.stack
                            .push(FreeVariablesItem::Node(&quantification.subformula));
                    }
                },
            }
        }
    }
}

pub struct Prefix<'a> {
    current: Option<&'a Formula>,
}

impl<'a> Iterator for Prefix<'a> {
    type Item = (QuantifierKind, &'a Quantification);

    fn next(&mut self) -> Option<Self::Item> {
        let (kind, quantification) = self.current?.as_quantifier()?;
        self.current = Some(&quantification.subformula);
        Some((kind, quantification))
    }
}

// Single depth-first pass over the formula, threading a fresh-id counter and
// two name-to-id maps. Entering a quantifier marks its names as pending
// (shadowed mappings are saved on the recursion stack); on the way out, the
// names that were actually referenced keep their assigned ids and form the
// rebuilt quantifier's variable set.
#[derive(Default)]
struct Cleanser {
    counter: usize,
    bound: HashMap<String, Option<String>>,
    free: HashMap<String, String>,
}

impl Cleanser {
    fn next_id(&mut self) -> String {
        self.counter += 1;
        self.counter.to_string()
    }

    fn cleanse(&mut self, formula: &Formula) -> Formula {
        match formula.kind() {
            FormulaKind::True | FormulaKind::False => formula.clone(),
            FormulaKind::Variable(name) => {
                if self.bound.contains_key(name) {
                    let id = match self.bound.get(name).cloned().flatten() {
                        Some(id) => id,
                        None => {
                            let id = self.next_id();
                            self.bound.insert(name.clone(), Some(id.clone()));
                            id
                        }
                    };
                    Formula::new(FormulaKind::Variable(id))
                } else {
                    let id = match self.free.get(name) {
                        Some(id) => id.clone(),
                        None => {
                            let id = self.next_id();
                            self.free.insert(name.clone(), id.clone());
                            id
                        }
                    };
                    Formula::new(FormulaKind::Variable(id))
                }
            }
            FormulaKind::Not(subformula) => Formula::not(self.cleanse(subformula)),
            FormulaKind::And(subformulas) => Formula::new(FormulaKind::And(
                subformulas.iter().map(|f| self.cleanse(f)).collect(),
            )),
            FormulaKind::Or(subformulas) => Formula::new(FormulaKind::Or(
                subformulas.iter().map(|f| self.cleanse(f)).collect(),
            )),
            FormulaKind::ForAll(quantification) => {
                self.cleanse_quantifier(QuantifierKind::ForAll, quantification)
            }
            FormulaKind::Exists(quantification) => {
                self.cleanse_quantifier(QuantifierKind::Exists, quantification)
            }
        }
    }

    fn cleanse_quantifier(
        &mut self,
        kind: QuantifierKind,
        quantification: &Quantification,
    ) -> Formula {
        let mut shadowed = HashMap::new();
        for name in &quantification.variables {
            if let Some(old) = self.bound.get(name) {
                shadowed.insert(name.clone(), old.clone());
            }
            self.bound.insert(name.clone(), None);
        }

        let subformula = self.cleanse(&quantification.subformula);

        let variables: IndexSet<String> = quantification
            .variables
            .iter()
            .filter_map(|name| self.bound.remove(name).flatten())
            .collect();

        self.bound.extend(shadowed);

        if variables.is_empty() {
            subformula
        } else {
            kind.quantify(subformula, variables)
        }
    }
}
