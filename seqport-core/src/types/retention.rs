/// Fate of original input files after ingestion
use crate::SeqportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Applied to every consumed input only once its reads are durably captured elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum InputRetentionPolicy {
    /// Originals untouched, nothing copied
    #[default]
    None,
    /// Originals deleted after a gzip archive lands in the analysis directory
    Compress,
    /// Originals deleted, no archive retained
    Delete,
    /// Originals untouched and referenced directly by downstream steps
    LeaveInPlace,
}

impl InputRetentionPolicy {
    pub const ALL: [InputRetentionPolicy; 4] = [
        InputRetentionPolicy::None,
        InputRetentionPolicy::Compress,
        InputRetentionPolicy::Delete,
        InputRetentionPolicy::LeaveInPlace,
    ];

    /// Whether the original input is removed once outputs are durable
    pub fn deletes_original(&self) -> bool {
        matches!(
            self,
            InputRetentionPolicy::Compress | InputRetentionPolicy::Delete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputRetentionPolicy::None => "none",
            InputRetentionPolicy::Compress => "compress",
            InputRetentionPolicy::Delete => "delete",
            InputRetentionPolicy::LeaveInPlace => "leaveInPlace",
        }
    }
}

impl fmt::Display for InputRetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputRetentionPolicy {
    type Err = SeqportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                SeqportError::Configuration(format!("Unknown input retention policy: {}", s))
            })
    }
}
