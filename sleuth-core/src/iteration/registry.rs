//! Append-only iteration history for one (workspace, category)
//!
//! The log is held behind the category's mutex. That mutex is the
//! reservation critical section: checking for an in-flight iteration and
//! appending a new PENDING one happen under a single lock acquisition.

use crate::error::IterationError;
use crate::evaluation::PrecisionEvaluation;
use crate::labels::LabelCounts;
use crate::types::CategoryId;

use super::state::{Iteration, IterationResult, IterationStatus, IterationSummary};

#[derive(Debug)]
pub struct IterationLog {
    category_id: CategoryId,
    iterations: Vec<Iteration>,
    evaluation: Option<PrecisionEvaluation>,
}

impl IterationLog {
    pub fn new(category_id: CategoryId) -> Self {
        Self {
            category_id,
            iterations: Vec::new(),
            evaluation: None,
        }
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// The non-terminal iteration, if one is in flight
    pub fn active(&self) -> Option<&Iteration> {
        // Reservation only succeeds when none is active, so only the last
        // iteration can ever be non-terminal.
        self.iterations.last().filter(|it| !it.is_terminal())
    }

    /// Most recent iteration, in flight or terminal
    pub fn latest(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    /// Most recent iteration that reached READY
    pub fn latest_ready(&self) -> Option<&Iteration> {
        self.iterations
            .iter()
            .rev()
            .find(|it| it.status() == IterationStatus::Ready)
    }

    pub fn get(&self, number: u32) -> Option<&Iteration> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.iterations.get(index)
    }

    /// Append a PENDING iteration with the next sequence number.
    ///
    /// Returns `None` while another iteration is still in flight.
    pub fn try_reserve(&mut self, label_version: u64, label_counts: LabelCounts) -> Option<u32> {
        if self.active().is_some() {
            return None;
        }
        let number = u32::try_from(self.iterations.len() + 1).ok()?;
        self.iterations.push(Iteration::pending(
            number,
            self.category_id.clone(),
            label_version,
            label_counts,
        ));
        Some(number)
    }

    pub fn advance(&mut self, number: u32, next: IterationStatus) -> Result<(), IterationError> {
        self.get_mut(number)?.advance(next)
    }

    pub fn complete(&mut self, number: u32, result: IterationResult) -> Result<(), IterationError> {
        self.get_mut(number)?.complete(result)
    }

    pub fn fail(&mut self, number: u32, reason: impl Into<String>) -> Result<(), IterationError> {
        self.get_mut(number)?.fail(reason)
    }

    pub fn record_precision(&mut self, number: u32, score: f64) -> Result<(), IterationError> {
        self.get_mut(number)?.record_precision(score)
    }

    /// The open precision evaluation, if any
    pub fn evaluation(&self) -> Option<&PrecisionEvaluation> {
        self.evaluation.as_ref()
    }

    /// Open an evaluation, replacing any previous one
    pub fn open_evaluation(&mut self, evaluation: PrecisionEvaluation) {
        self.evaluation = Some(evaluation);
    }

    pub fn close_evaluation(&mut self) -> Option<PrecisionEvaluation> {
        self.evaluation.take()
    }

    pub fn summaries(&self) -> Vec<IterationSummary> {
        self.iterations.iter().map(Iteration::summary).collect()
    }

    fn get_mut(&mut self, number: u32) -> Result<&mut Iteration, IterationError> {
        usize::try_from(number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| self.iterations.get_mut(index))
            .ok_or(IterationError::Missing(number))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::iteration::state::PredictionSet;
    use crate::training::{ConstantPredictor, ModelHandle};

    fn log() -> IterationLog {
        IterationLog::new(CategoryId::new("cat"))
    }

    fn result() -> IterationResult {
        IterationResult {
            model: ModelHandle::new(Arc::new(ConstantPredictor { score: 0.6 })),
            predictions: Arc::new(PredictionSet::new()),
            candidates: vec![],
        }
    }

    fn finish(log: &mut IterationLog, number: u32) {
        log.advance(number, IterationStatus::Training).unwrap();
        log.advance(number, IterationStatus::RunningActiveLearning).unwrap();
        log.complete(number, result()).unwrap();
    }

    #[test]
    fn precision_only_recorded_on_ready_iterations() {
        let mut log = log();
        log.try_reserve(1, LabelCounts::default());

        assert!(log.record_precision(1, 0.5).is_err());
        finish(&mut log, 1);
        log.record_precision(1, 0.5).unwrap();
        assert_eq!(log.summaries()[0].precision, Some(0.5));
        assert!(matches!(log.record_precision(2, 0.5), Err(IterationError::Missing(2))));
    }

    #[test]
    fn evaluation_slot_opens_and_closes() {
        let mut log = log();
        assert!(log.evaluation().is_none());

        log.open_evaluation(PrecisionEvaluation {
            iteration: 1,
            elements: vec![],
        });
        assert_eq!(log.evaluation().map(|e| e.iteration), Some(1));
        assert!(log.close_evaluation().is_some());
        assert!(log.close_evaluation().is_none());
    }

    #[test]
    fn reserve_starts_at_one() {
        let mut log = log();

        assert_eq!(log.try_reserve(1, LabelCounts::default()), Some(1));
        assert_eq!(log.active().unwrap().status(), IterationStatus::Pending);
    }

    #[test]
    fn reserve_refused_while_iteration_in_flight() {
        let mut log = log();
        log.try_reserve(1, LabelCounts::default());
        log.advance(1, IterationStatus::Training).unwrap();

        assert_eq!(log.try_reserve(2, LabelCounts::default()), None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn sequence_numbers_are_gap_free_across_outcomes() {
        let mut log = log();

        let first = log.try_reserve(1, LabelCounts::default()).unwrap();
        finish(&mut log, first);
        let second = log.try_reserve(2, LabelCounts::default()).unwrap();
        log.fail(second, "trainer down").unwrap();
        let third = log.try_reserve(3, LabelCounts::default()).unwrap();

        assert_eq!((first, second, third), (1, 2, 3));
        let numbers: Vec<u32> = log.summaries().iter().map(|s| s.iteration).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn latest_ready_skips_failed_and_in_flight() {
        let mut log = log();
        let first = log.try_reserve(1, LabelCounts::default()).unwrap();
        finish(&mut log, first);
        let second = log.try_reserve(2, LabelCounts::default()).unwrap();
        log.fail(second, "oops").unwrap();
        log.try_reserve(3, LabelCounts::default()).unwrap();

        assert_eq!(log.latest_ready().unwrap().number(), 1);
        assert_eq!(log.latest().unwrap().number(), 3);
        assert_eq!(log.active().unwrap().number(), 3);
    }

    #[test]
    fn unknown_iteration_number_is_reported() {
        let mut log = log();
        assert_eq!(
            log.advance(7, IterationStatus::Training),
            Err(IterationError::Missing(7))
        );
        assert_eq!(log.advance(0, IterationStatus::Training), Err(IterationError::Missing(0)));
        assert!(log.get(0).is_none());
    }
}
