//! The ordered queue of expectations and the close-time verification.

use crate::expectation::Expectation;
use crate::{Call, MismatchError, MismatchReason, UnmetExpectationsError};

/// Expectations in declaration order. The fulfilled ones always form a prefix: an
/// expectation is only ever consumed while it is the head.
#[derive(Debug, Default)]
pub(crate) struct ExpectationQueue {
    items: Vec<Expectation>,
    /// Index of the first unfulfilled expectation.
    head: usize,
}

impl ExpectationQueue {
    /// Appends an expectation and returns its position.
    pub fn push(&mut self, expectation: Expectation) -> usize {
        self.items.push(expectation);
        self.items.len() - 1
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Expectation> {
        self.items.get_mut(idx)
    }

    pub fn head(&self) -> Option<&Expectation> {
        self.items.get(self.head)
    }

    /// Builds the error for `call` failing against the current head.
    pub fn mismatch(&self, call: Call, reason: MismatchReason) -> MismatchError {
        MismatchError {
            call,
            reason,
            expected: self.head().map(Expectation::summary),
        }
    }

    /// Consumes the head if it matches `call`. Never looks past the head; on mismatch
    /// the queue is left unchanged.
    pub fn consume(&mut self, call: Call) -> Result<&Expectation, MismatchError> {
        let reason = match self.head() {
            Some(head) => head.check(&call).err(),
            None => Some(MismatchReason::Exhausted),
        };
        if let Some(reason) = reason {
            return Err(self.mismatch(call, reason));
        }
        self.items[self.head].fulfill();
        self.head += 1;
        Ok(&self.items[self.head - 1])
    }

    /// Fails with every unfulfilled expectation, in declaration order.
    pub fn verify(&self) -> Result<(), UnmetExpectationsError> {
        let unmet: Vec<_> = self
            .items
            .iter()
            .filter(|e| !e.is_fulfilled())
            .map(Expectation::summary)
            .collect();
        if unmet.is_empty() {
            Ok(())
        } else {
            Err(UnmetExpectationsError { unmet })
        }
    }
}
