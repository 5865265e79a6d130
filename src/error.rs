//! Error types.
//!
//! Assembly and evaluation failures are not errors: they surface as a missing
//! [`Hit`](crate::Hit) and never abort a run.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with a configuration value or file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0:?} is not a supported mode (expected maximize, minimize, maximize_boltzmann or minimize_boltzmann)")]
    UnknownMode(String),
    #[error("invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
    #[error("failed to read configuration at {path}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse configuration at {path}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
}

/// Misuse of the [`CombinationTracker`](crate::CombinationTracker).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("selection has {got} slots, tracker has {expected}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("selection must mark exactly one slot as being filled, found {0}")]
    TargetCount(usize),
    #[error("slot {slot} is not the slot being filled")]
    WrongTarget { slot: usize },
    #[error("slot {slot} is not filled")]
    Incomplete { slot: usize },
    #[error("element {element} out of range for slot {slot} (size {size})")]
    OutOfRange {
        slot: usize,
        element: usize,
        size: usize,
    },
    #[error("combination {0:?} was already committed")]
    AlreadyCommitted(Vec<usize>),
    #[error("element {element} of slot {slot} is retired")]
    Retired { slot: usize, element: usize },
}

/// Belief could not be initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BeliefError {
    #[error("no observations recorded during warm-up")]
    NoObservations,
}

/// Fatal errors raised by the [`SearchEngine`](crate::SearchEngine).
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("no legal element left for slot {slot}; combination tracker is inconsistent")]
    ConsistencyViolation { slot: usize },
    #[error("every element of slot {slot} is retired")]
    SlotExhausted { slot: usize },
    #[error("cannot {action} while engine is {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: crate::Phase,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Problems loading slot elements.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("{path}:{line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{path} contains no elements")]
    Empty { path: PathBuf },
}
