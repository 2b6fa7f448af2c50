use crate::lead::{LeadStatus, Substatus};

#[derive(thiserror::Error, Debug)]
pub enum LeadError {
    #[error("Lead or document not found: {0}")]
    NotFound(String),
    #[error("Store denied the operation under current credentials: {0}")]
    AuthorizationDenied(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Raised by the form layer before a patch reaches the engine.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Substatus {substatus:?} is not valid under status {status:?}")]
    SubstatusNotAllowed {
        status: LeadStatus,
        substatus: Substatus,
    },
    #[error("Substatus was set without a status to qualify it")]
    SubstatusWithoutStatus,
    #[error("Required field missing: {0}")]
    MissingField(&'static str),
}

impl From<sled::Error> for LeadError {
    fn from(err: sled::Error) -> Self {
        LeadError::Storage(err.to_string())
    }
}

impl From<minicbor::decode::Error> for LeadError {
    fn from(err: minicbor::decode::Error) -> Self {
        LeadError::Storage(format!("failed to decode record: {err}"))
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for LeadError {
    fn from(err: minicbor::encode::Error<E>) -> Self {
        LeadError::Storage(format!("failed to encode record: {err}"))
    }
}

impl LeadError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, LeadError::AuthorizationDenied(_))
    }
}
