use std::time::Duration;

/// Why a single pipeline step failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// Connection or I/O failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Authentication failure or other 4xx.
    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
    /// 5xx from the remote service.
    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },
    /// The remote call succeeded but reported an error in its payload.
    #[error("tool reported an error: {0}")]
    Logical(String),
    /// The reply carried no usable value.
    #[error("unusable reply: {0}")]
    Unusable(String),
}

impl StepError {
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status >= 500 {
            StepError::Upstream { status, body }
        } else {
            StepError::Rejected { status, body }
        }
    }
}

/// A pipeline run that stopped at `step`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{step} step failed: {error}")]
pub struct PipelineFailure {
    pub step: &'static str,
    pub error: StepError,
    /// Outputs of the steps that completed before the failure, keyed by step name
    pub partial: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            StepError::from_status(401, "nope"),
            StepError::Rejected { status: 401, .. }
        ));
        assert!(matches!(
            StepError::from_status(502, "bad gateway"),
            StepError::Upstream { status: 502, .. }
        ));
    }

    #[test]
    fn failure_message_names_the_step() {
        let failure = PipelineFailure {
            step: "convert",
            error: StepError::Unusable("no url".into()),
            partial: serde_json::json!({}),
        };
        assert_eq!(failure.to_string(), "convert step failed: unusable reply: no url");
    }
}
