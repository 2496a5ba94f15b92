use thiserror::Error;

use crate::network::{EdgeId, NodeId};

/// Configuration errors: fatal, surfaced to the caller before a run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("replanning probability p must be in [0, 1], got {0}")]
    InvalidP(f64),

    #[error("smoothing factor alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    #[error("network edge {edge:?} must have positive {field}, got {value}")]
    NonPositiveAttribute {
        edge: EdgeId,
        field: &'static str,
        value: f64,
    },

    #[error("synthetic network size must be >= 1, got {0}")]
    InvalidSize(u32),

    #[error("unparsable time string: {0}")]
    InvalidTime(String),

    #[error("activity duration would be negative at clock={clock}, horizon={horizon}")]
    NegativeActivityDuration { clock: u32, horizon: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("routing failed during planning: {0}")]
    Routing(#[from] RoutingError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Routing failures: fatal at planning time.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no path from {source:?} to {target:?}")]
    NoPath { source: NodeId, target: NodeId },

    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RoutingResult<T> = Result<T, RoutingError>;
