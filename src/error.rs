use thiserror::Error;

/// Failures raised by the angle and settings resolvers and the reduction backend.
///
/// Every variant is fatal for the current run; callers wrap them in
/// `anyhow` context at the command layer.
#[derive(Debug, Error)]
pub enum ReductionError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid {field} code: {value} (expected 0 or 1)")]
    InvalidCode { field: &'static str, value: String },

    #[error("malformed per-angle row {index}: {reason}")]
    MalformedRow { index: usize, reason: String },

    #[error("no per-angle settings match angle {angle} and no default row is configured")]
    NoApplicableSettings { angle: f64 },

    #[error("reduction backend failed: {0}")]
    Collaborator(String),
}
