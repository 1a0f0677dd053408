use docmint_core::PaymentId;

/// Payment gateway error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Transport failure, timeout or 5xx from the payment service.
    #[error("payment service unavailable: {0}")]
    Unavailable(String),
    /// The ledger rejected the request body (schema/validation).
    #[error("payment request rejected: {0}")]
    InvalidRequest(String),
    /// The payment service refused our API key.
    #[error("payment service refused credentials: {0}")]
    Unauthorized(String),
    #[error("payment not found: {0}")]
    NotFound(PaymentId),
    /// The payment was already completed or refunded through this gateway.
    #[error("payment already settled: {0}")]
    AlreadySettled(PaymentId),
    /// The response could not be understood.
    #[error("unexpected payment service response: {0}")]
    Protocol(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }

    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, GatewayError::InvalidRequest(_))
    }
}
