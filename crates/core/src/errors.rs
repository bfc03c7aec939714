use thiserror::Error;

/// Rule violations inside the cart and catalog model. These surface as
/// polite corrections in chat, never as retry prompts.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{name}` has variant pricing and no variant was selected")]
    UnpricedItem { name: String },
    #[error("quantity {quantity} is outside 1..={max}")]
    QuantityOutOfRange { quantity: i64, max: u32 },
    #[error("cart line not found")]
    LineNotFound,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// The boundary taxonomy the webhook path logs. Every variant carries the
/// id of the inbound message that triggered the turn, so one chat turn can
/// be traced end to end.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl ApplicationError {
    /// Collapses the internal error onto the boundary taxonomy, tagging it
    /// with the inbound message id.
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            ApplicationError::Domain(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => {
                InterfaceError::Internal { message, correlation_id }
            }
        }
    }

    /// Order writes must surface as retryable to the customer, unlike the
    /// usual domain validation path.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Integration(_))
    }
}
