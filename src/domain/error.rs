use thiserror::Error;

/// Semantic error taxonomy for the forecast core.
///
/// Every API surface maps an error to its stable `kind` string; callers
/// branch on the kind, humans read the message.
#[derive(Debug, Error)]
pub enum InventoryOpsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid run state: {0}")]
    InvalidRunState(String),

    #[error("dual control violation: approver {approver} created run {run_id}")]
    DualControlViolation { run_id: String, approver: String },

    #[error("run {0} already has a terminal decision")]
    AlreadyDecided(String),

    #[error("no valid price for {sku} at {date}")]
    NoPriceFound { sku: String, date: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl InventoryOpsError {
    /// Stable machine-readable kind, exposed to callers alongside the
    /// human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidRunState(_) => "invalid_run_state",
            Self::DualControlViolation { .. } => "dual_control_violation",
            Self::AlreadyDecided(_) => "already_decided",
            Self::NoPriceFound { .. } => "no_price_found",
            Self::Forbidden(_) => "forbidden",
            Self::DependencyUnavailable(_) => "dependency_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// Infrastructure failures abort an in-flight forecast run; everything
    /// else is contained per item.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::DependencyUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, InventoryOpsError>;

impl From<serde_json::Error> for InventoryOpsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {}", err))
    }
}

impl From<std::io::Error> for InventoryOpsError {
    fn from(err: std::io::Error) -> Self {
        Self::DependencyUnavailable(format!("io error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(InventoryOpsError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            InventoryOpsError::AlreadyDecided("r1".into()).kind(),
            "already_decided"
        );
        assert_eq!(
            InventoryOpsError::NoPriceFound {
                sku: "SKU-1".into(),
                date: "2025-01-01".into()
            }
            .kind(),
            "no_price_found"
        );
    }

    #[test]
    fn test_infrastructure_classification() {
        assert!(InventoryOpsError::DependencyUnavailable("db".into()).is_infrastructure());
        assert!(!InventoryOpsError::NotFound("x".into()).is_infrastructure());
    }
}
