//! Write modes and per-item outcomes for bulk mutations.

use serde::{Deserialize, Serialize};

use crate::Error;

/// How a batch reacts to an item that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Commit only if every item validates. No reader sees a partial batch.
    #[default]
    AllOrNothing,
    /// Validate and commit each item on its own; report every outcome.
    BestEffort,
}

/// How a single delete treats a missing relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Missing relation is a `NotFound` error.
    #[default]
    Strict,
    /// Missing relation is a successful no-op.
    IfExists,
}

/// Outcome of one batch item.
#[derive(Debug)]
pub enum ItemOutcome<T> {
    Accepted(T),
    Rejected(Error),
}

impl<T> ItemOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ItemOutcome::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&T> {
        match self {
            ItemOutcome::Accepted(v) => Some(v),
            ItemOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Error> {
        match self {
            ItemOutcome::Accepted(_) => None,
            ItemOutcome::Rejected(e) => Some(e),
        }
    }
}

impl<T> From<crate::Result<T>> for ItemOutcome<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(v) => ItemOutcome::Accepted(v),
            Err(e) => ItemOutcome::Rejected(e),
        }
    }
}

/// Per-item outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<ItemOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn all_accepted(items: Vec<T>) -> Self {
        Self { outcomes: items.into_iter().map(ItemOutcome::Accepted).collect() }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn accepted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_accepted()).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.outcomes.len() - self.accepted_count()
    }

    /// Accepted items, in input order.
    pub fn accepted(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(ItemOutcome::accepted)
    }

    /// `(input index, reason)` for every rejected item.
    pub fn rejected(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.rejection().map(|e| (i, e)))
    }
}
