//! Target expressions and their disjunctive normal form.

use std::cmp::Ordering;
use std::ops;
use std::sync::Arc;

use pdp_eval::{Bool, EvaluationContext};

use crate::{IndexError, IndexResult, TriState};

/// Boolean guard of a policy document, built from opaque [`Bool`] leaves.
#[derive(Debug, Clone)]
pub enum TargetExpr {
    /// Constant guard.
    Constant(bool),
    /// Opaque leaf expression.
    Test(Arc<dyn Bool>),
    /// Negation.
    Not(Box<TargetExpr>),
    /// Conjunction; empty means `true`.
    And(Vec<TargetExpr>),
    /// Disjunction; empty means `false`.
    Or(Vec<TargetExpr>),
}

impl TargetExpr {
    /// Guard matching every request.
    #[must_use]
    pub fn always() -> Self {
        Self::Constant(true)
    }

    /// Wraps a leaf expression.
    pub fn test(expression: impl Bool + 'static) -> Self {
        Self::Test(Arc::new(expression))
    }

    /// Conjunction of two guards.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(vec![self, other])
    }

    /// Disjunction of two guards.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(vec![self, other])
    }

    /// Evaluates the guard as authored with three-valued logic: a failing
    /// operand only decides a conjunction or disjunction when no other
    /// operand does.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext) -> TriState {
        match self {
            Self::Constant(true) => TriState::True,
            Self::Constant(false) => TriState::False,
            Self::Test(expression) => expression.evaluate(ctx).into(),
            Self::Not(inner) => inner.evaluate(ctx).negate(),
            Self::And(children) => fold(children, ctx, false),
            Self::Or(children) => fold(children, ctx, true),
        }
    }
}

/// Returns `dominant` as soon as an operand evaluates to it, otherwise the
/// first failure, otherwise the neutral value.
fn fold(children: &[TargetExpr], ctx: &EvaluationContext, dominant: bool) -> TriState {
    let mut failure = None;
    for child in children {
        match child.evaluate(ctx) {
            TriState::Failed(err) => {
                failure.get_or_insert(err);
            }
            outcome if outcome.is_true() == dominant => return outcome,
            _ => {}
        }
    }
    match failure {
        Some(err) => TriState::Failed(err),
        None if dominant => TriState::False,
        None => TriState::True,
    }
}

impl ops::Not for TargetExpr {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// Possibly negated leaf of a conjunction.
#[derive(Debug, Clone)]
pub struct Literal {
    expression: Arc<dyn Bool>,
    key: String,
    negated: bool,
}

impl Literal {
    fn new(expression: Arc<dyn Bool>, negated: bool) -> Self {
        let key = expression.structural_key();
        Self {
            expression,
            key,
            negated,
        }
    }

    /// Returns the wrapped expression.
    #[must_use]
    pub fn expression(&self) -> &Arc<dyn Bool> {
        &self.expression
    }

    /// Structural key of the wrapped expression.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` when the literal is the negation of its expression.
    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Evaluates the literal with three-valued logic.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext) -> TriState {
        let value = TriState::from(self.expression.evaluate(ctx));
        if self.negated { value.negate() } else { value }
    }

    fn order(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then(self.negated.cmp(&other.negated))
    }

    fn same(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Equal
    }
}

/// Conjunction of literals sorted by structural key; empty means `true`.
#[derive(Debug, Clone)]
pub struct Conjunction {
    literals: Vec<Literal>,
}

impl Conjunction {
    /// Literals of the conjunction.
    #[must_use]
    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// Evaluates the conjunction: any false literal makes it false, otherwise
    /// any failing literal makes it fail.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext) -> TriState {
        let mut outcome = TriState::True;
        for literal in &self.literals {
            match literal.evaluate(ctx) {
                TriState::False => return TriState::False,
                failed @ TriState::Failed(_) if !outcome.is_failed() => outcome = failed,
                _ => {}
            }
        }
        outcome
    }

    /// Sorts and removes duplicate literals. `x ∧ ¬x` is kept: it is false
    /// only when `x` can be evaluated.
    fn normalize(mut literals: Vec<Literal>) -> Self {
        literals.sort_by(Literal::order);
        literals.dedup_by(|a, b| a.same(b));
        Self { literals }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        let mut candidates = other.literals.iter();
        self.literals
            .iter()
            .all(|literal| candidates.any(|candidate| candidate.same(literal)))
    }
}

/// Target compiled to a disjunction of conjunctions; empty means `false`.
///
/// Every rewrite applied during compilation holds in three-valued (Kleene)
/// logic, so evaluating this form always agrees with
/// [`TargetExpr::evaluate`] on the authored target.
#[derive(Debug, Clone)]
pub struct DisjunctiveFormula {
    clauses: Vec<Conjunction>,
}

impl DisjunctiveFormula {
    /// Maximum number of conjunctions a single target may expand to.
    pub const MAX_CONJUNCTIONS: usize = 1024;

    /// Compiles a target into normalized disjunctive normal form.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::FormulaTooLarge`] when the expansion exceeds
    /// [`Self::MAX_CONJUNCTIONS`].
    pub fn compile(document: &str, target: &TargetExpr) -> IndexResult<Self> {
        Self::compile_with_limit(document, target, Self::MAX_CONJUNCTIONS)
    }

    /// Like [`compile`](Self::compile) with an explicit clause limit.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::FormulaTooLarge`] when the expansion exceeds
    /// `limit`.
    pub fn compile_with_limit(
        document: &str,
        target: &TargetExpr,
        limit: usize,
    ) -> IndexResult<Self> {
        expand(target, false, limit)
            .map(|clauses| Self { clauses })
            .ok_or_else(|| IndexError::FormulaTooLarge {
                document: document.to_owned(),
                limit,
            })
    }

    /// Conjunctions of the formula.
    #[must_use]
    pub fn clauses(&self) -> &[Conjunction] {
        &self.clauses
    }

    /// Returns `true` when the formula holds for every request.
    #[must_use]
    pub fn is_tautology(&self) -> bool {
        self.clauses.iter().any(|clause| clause.literals.is_empty())
    }

    /// Evaluates the formula: any true conjunction makes it true, otherwise
    /// any failing conjunction makes it fail.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext) -> TriState {
        let mut outcome = TriState::False;
        for clause in &self.clauses {
            match clause.evaluate(ctx) {
                TriState::True => return TriState::True,
                failed @ TriState::Failed(_) if !outcome.is_failed() => outcome = failed,
                _ => {}
            }
        }
        outcome
    }

    /// Folds request-independent literals under `ctx`: a literal known to
    /// hold is removed, a literal known not to hold drops its conjunction,
    /// and a failing one is kept for per-request evaluation.
    #[must_use]
    pub fn reduce_constants(&self, ctx: &EvaluationContext) -> Self {
        let clauses = self
            .clauses
            .iter()
            .filter_map(|clause| {
                let mut kept = Vec::with_capacity(clause.literals.len());
                for literal in &clause.literals {
                    if !literal.expression.is_immutable() {
                        kept.push(literal.clone());
                        continue;
                    }
                    match literal.evaluate(ctx) {
                        TriState::True => {}
                        TriState::False => return None,
                        TriState::Failed(_) => kept.push(literal.clone()),
                    }
                }
                Some(Conjunction { literals: kept })
            })
            .collect();
        Self {
            clauses: absorb(clauses),
        }
    }
}

fn expand(target: &TargetExpr, negated: bool, limit: usize) -> Option<Vec<Conjunction>> {
    match target {
        TargetExpr::Constant(value) => Some(constant(*value != negated)),
        TargetExpr::Test(expression) => Some(leaf(expression, negated)),
        TargetExpr::Not(inner) => expand(inner, !negated, limit),
        TargetExpr::And(children) if !negated => conjoin(children, false, limit),
        TargetExpr::Or(children) if negated => conjoin(children, true, limit),
        TargetExpr::And(children) | TargetExpr::Or(children) => {
            disjoin(children, negated, limit)
        }
    }
}

fn constant(value: bool) -> Vec<Conjunction> {
    if value {
        vec![Conjunction {
            literals: Vec::new(),
        }]
    } else {
        Vec::new()
    }
}

fn leaf(expression: &Arc<dyn Bool>, negated: bool) -> Vec<Conjunction> {
    vec![Conjunction {
        literals: vec![Literal::new(Arc::clone(expression), negated)],
    }]
}

fn conjoin(children: &[TargetExpr], negated: bool, limit: usize) -> Option<Vec<Conjunction>> {
    let mut product = constant(true);
    for child in children {
        let factor = expand(child, negated, limit)?;
        if product.len().saturating_mul(factor.len()) > limit.saturating_mul(limit) {
            return None;
        }
        let combined = product
            .iter()
            .flat_map(|left| {
                factor.iter().map(|right| {
                    let mut literals = left.literals.clone();
                    literals.extend(right.literals.iter().cloned());
                    Conjunction::normalize(literals)
                })
            })
            .collect();
        product = absorb(combined);
        if product.len() > limit {
            return None;
        }
    }
    Some(product)
}

fn disjoin(children: &[TargetExpr], negated: bool, limit: usize) -> Option<Vec<Conjunction>> {
    let mut sum = Vec::new();
    for child in children {
        sum.extend(expand(child, negated, limit)?);
        sum = absorb(sum);
        if sum.len() > limit {
            return None;
        }
    }
    Some(sum)
}

/// Removes duplicate and subsumed conjunctions: when `a ⊆ b`, `b` is dropped.
fn absorb(mut clauses: Vec<Conjunction>) -> Vec<Conjunction> {
    clauses.sort_by_key(|clause| clause.literals.len());
    let mut kept: Vec<Conjunction> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        if !kept.iter().any(|smaller| smaller.is_subset_of(&clause)) {
            kept.push(clause);
        }
    }
    kept
}
