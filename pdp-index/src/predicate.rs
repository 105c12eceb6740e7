//! Shared target predicates and their conjunction bit-vectors.

use std::sync::Arc;

use pdp_eval::{Bool, EvalResult, EvaluationContext, EvaluationError};

use crate::{Bitmask, IndexError, IndexResult};

/// Outcome of evaluating a target expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriState {
    /// Expression holds.
    True,
    /// Expression does not hold.
    False,
    /// Expression could not be decided.
    Failed(EvaluationError),
}

impl TriState {
    /// Returns `true` for [`TriState::True`].
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Returns `true` for [`TriState::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub(crate) fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            failed @ Self::Failed(_) => failed,
        }
    }
}

impl From<EvalResult<bool>> for TriState {
    fn from(result: EvalResult<bool>) -> Self {
        match result {
            Ok(true) => Self::True,
            Ok(false) => Self::False,
            Err(err) => Self::Failed(err),
        }
    }
}

/// One distinct leaf expression of an index snapshot.
///
/// `conjunctions` holds every conjunction referencing the expression.
/// `false_for_true` holds those referencing it only negated (falsified when
/// it holds) and `false_for_false` those referencing it only positively
/// (falsified when it does not hold). `contradicted` holds the conjunctions
/// referencing it both ways, which any decided outcome falsifies.
#[derive(Debug, Clone)]
pub struct Predicate {
    expression: Arc<dyn Bool>,
    key: String,
    conjunctions: Bitmask,
    false_for_true: Bitmask,
    false_for_false: Bitmask,
    contradicted: Bitmask,
}

impl Predicate {
    pub(crate) fn new(expression: Arc<dyn Bool>, key: String, conjunction_count: usize) -> Self {
        Self {
            expression,
            key,
            conjunctions: Bitmask::new(conjunction_count),
            false_for_true: Bitmask::new(conjunction_count),
            false_for_false: Bitmask::new(conjunction_count),
            contradicted: Bitmask::new(conjunction_count),
        }
    }

    /// Records a reference from a conjunction. A second reference of the
    /// opposite polarity moves the conjunction to the contradicted set.
    pub(crate) fn reference(&mut self, conjunction: usize, negated: bool) -> IndexResult<()> {
        if self.conjunctions.contains(conjunction) {
            let opposite = if negated {
                &mut self.false_for_false
            } else {
                &mut self.false_for_true
            };
            if !opposite.remove(conjunction) {
                return Err(IndexError::corrupted(format!(
                    "conjunction {conjunction} references predicate `{}` twice",
                    self.key
                )));
            }
            self.contradicted.insert(conjunction);
            return Ok(());
        }
        let falsified_by = if negated {
            &mut self.false_for_true
        } else {
            &mut self.false_for_false
        };
        if !(self.conjunctions.insert(conjunction) && falsified_by.insert(conjunction)) {
            return Err(IndexError::corrupted(format!(
                "conjunction {conjunction} out of range for predicate `{}`",
                self.key
            )));
        }
        Ok(())
    }

    /// Evaluates the wrapped expression.
    #[must_use]
    pub fn evaluate(&self, ctx: &EvaluationContext) -> TriState {
        self.expression.evaluate(ctx).into()
    }

    /// Structural key shared by every reference to this predicate.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Conjunctions referencing the predicate.
    #[must_use]
    pub fn conjunctions(&self) -> &Bitmask {
        &self.conjunctions
    }

    /// Conjunctions falsified when the predicate evaluates to `true`.
    #[must_use]
    pub fn false_for_true_predicate(&self) -> &Bitmask {
        &self.false_for_true
    }

    /// Conjunctions falsified when the predicate evaluates to `false`.
    #[must_use]
    pub fn false_for_false_predicate(&self) -> &Bitmask {
        &self.false_for_false
    }

    /// Conjunctions referencing the predicate both positively and negated.
    #[must_use]
    pub fn contradicted(&self) -> &Bitmask {
        &self.contradicted
    }

    /// Checks the bit-vector invariants against the snapshot size.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupted`] when a vector has the wrong length,
    /// a "false-for" or contradicted set escapes `conjunctions`, or two of
    /// those sets overlap.
    pub fn validate(&self, conjunction_count: usize) -> IndexResult<()> {
        let sized = [
            &self.conjunctions,
            &self.false_for_true,
            &self.false_for_false,
            &self.contradicted,
        ]
        .iter()
        .all(|mask| mask.len() == conjunction_count);
        if !sized {
            return Err(IndexError::corrupted(format!(
                "predicate `{}` sized for a different snapshot",
                self.key
            )));
        }
        if !self.false_for_true.is_subset(&self.conjunctions)
            || !self.false_for_false.is_subset(&self.conjunctions)
            || !self.contradicted.is_subset(&self.conjunctions)
        {
            return Err(IndexError::corrupted(format!(
                "predicate `{}` falsifies unreferenced conjunctions",
                self.key
            )));
        }
        if self.false_for_true.intersects(&self.false_for_false)
            || self.contradicted.intersects(&self.false_for_true)
            || self.contradicted.intersects(&self.false_for_false)
        {
            return Err(IndexError::corrupted(format!(
                "predicate `{}` is both positive and negated in one conjunction",
                self.key
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_eval::Constant;

    #[test]
    fn references_populate_disjoint_sets() {
        let mut predicate = Predicate::new(Arc::new(Constant(true)), "p".into(), 4);
        predicate.reference(0, false).unwrap();
        predicate.reference(2, true).unwrap();

        assert_eq!(predicate.conjunctions().iter().collect::<Vec<_>>(), [0, 2]);
        assert_eq!(predicate.false_for_false_predicate().iter().collect::<Vec<_>>(), [0]);
        assert_eq!(predicate.false_for_true_predicate().iter().collect::<Vec<_>>(), [2]);
        assert!(predicate.validate(4).is_ok());
    }

    #[test]
    fn opposite_references_move_to_the_contradicted_set() {
        let mut predicate = Predicate::new(Arc::new(Constant(true)), "p".into(), 3);
        predicate.reference(0, false).unwrap();
        predicate.reference(1, true).unwrap();
        predicate.reference(1, false).unwrap();

        assert_eq!(predicate.conjunctions().iter().collect::<Vec<_>>(), [0, 1]);
        assert_eq!(predicate.false_for_false_predicate().iter().collect::<Vec<_>>(), [0]);
        assert!(predicate.false_for_true_predicate().is_empty());
        assert_eq!(predicate.contradicted().iter().collect::<Vec<_>>(), [1]);
        assert!(predicate.validate(3).is_ok());
    }

    #[test]
    fn invariant_violations_are_corruption() {
        let mut predicate = Predicate::new(Arc::new(Constant(true)), "p".into(), 2);
        assert!(matches!(
            predicate.reference(5, false),
            Err(IndexError::Corrupted { .. })
        ));

        predicate.reference(1, false).unwrap();
        assert!(matches!(
            predicate.reference(1, false),
            Err(IndexError::Corrupted { .. })
        ));
        predicate.reference(0, true).unwrap();
        predicate.false_for_false.insert(0);
        assert!(matches!(
            predicate.validate(2),
            Err(IndexError::Corrupted { .. })
        ));
        assert!(predicate.validate(3).is_err());
    }

    #[test]
    fn negation_keeps_failures() {
        assert_eq!(TriState::True.negate(), TriState::False);
        let failed = TriState::Failed(EvaluationError::function("f", "boom"));
        assert!(failed.negate().is_failed());
    }
}
