use crate::domain::content::ContentKind;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub kind: ContentKind,
    pub message: String,
}

/// Outcome of a sweep or purge: records removed per kind plus the pages that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub counts_by_kind: BTreeMap<ContentKind, u64>,
    pub errors: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn add(&mut self, kind: ContentKind, count: u64) {
        *self.counts_by_kind.entry(kind).or_default() += count;
    }

    pub fn fail(&mut self, kind: ContentKind, message: impl Into<String>) {
        self.errors.push(SweepFailure { kind, message: message.into() });
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts_by_kind.values().sum()
    }

    #[must_use]
    pub fn count(&self, kind: ContentKind) -> u64 {
        self.counts_by_kind.get(&kind).copied().unwrap_or_default()
    }
}
