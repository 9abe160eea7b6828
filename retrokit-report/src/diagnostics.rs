//! Records dropped during an analysis.
//!
//! Diagnostics travel next to the report and never change its JSON.

use std::fmt;

use retrokit_core::RetroError;
use serde::Serialize;
use tracing::warn;

/// Pipeline stage that dropped a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Aggregate,
    Normalize,
    Generalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Aggregate => "aggregate",
            Stage::Normalize => "normalize",
            Stage::Generalize => "generalize",
        })
    }
}

/// One dropped raw record, pair or reactant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRecord {
    pub stage: Stage,
    pub discovery_order: Option<u32>,
    /// What was dropped: an atom set, a reaction name, a reactant list.
    pub subject: String,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub dropped: Vec<DroppedRecord>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep a dropped record.
    pub fn record(
        &mut self,
        stage: Stage,
        discovery_order: Option<u32>,
        subject: impl Into<String>,
        error: &RetroError,
    ) {
        let subject = subject.into();
        warn!(%stage, ?discovery_order, %subject, kind = error.kind(), "dropped: {error}");
        self.dropped.push(DroppedRecord {
            stage,
            discovery_order,
            subject,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.dropped.extend(other.dropped);
    }

    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dropped.len()
    }

    pub fn by_stage(&self, stage: Stage) -> impl Iterator<Item = &DroppedRecord> {
        self.dropped.iter().filter(move |d| d.stage == stage)
    }
}
