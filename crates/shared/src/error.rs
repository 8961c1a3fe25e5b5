use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    LoginRequired,
    Unauthorized,
    NotFound,
    Validation,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no controller is registered for path '{path}'")]
    UnknownController { path: String },
    #[error("controller '{controller}' has no action '{action}'")]
    UnknownAction { controller: String, action: String },
    #[error("malformed request path '{path}'")]
    MalformedPath { path: String },
    #[error("login is required to access '{path}'")]
    LoginRequired { path: String },
    #[error("access to '{path}' is not authorized")]
    Unauthorized { path: String },
    #[error("request carries more than one command parameter")]
    MultipleCommandParameters,
    #[error("malformed command descriptor '{descriptor}'")]
    MalformedCommand { descriptor: String },
    #[error("result '{result}' is not mapped by controller '{controller}', its document or common utilities")]
    UnresolvedResult { controller: String, result: String },
    #[error("item index {index} of property '{property}' is out of range")]
    ItemIndexOutOfRange { property: String, index: usize },
    #[error("invalid controller registration: {0}")]
    Registration(String),
    #[error("handler failed: {message}")]
    Handler {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("response generation failed: {0}")]
    Generation(String),
    #[error("response already committed")]
    ResponseCommitted {
        #[source]
        source: Box<DispatchError>,
    },
}

impl DispatchError {
    pub fn handler(message: impl Into<String>) -> Self {
        DispatchError::Handler {
            message: message.into(),
            source: None,
        }
    }

    pub fn handler_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        DispatchError::Handler {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::UnknownController { .. }
            | DispatchError::UnknownAction { .. }
            | DispatchError::MalformedPath { .. } => ErrorCode::NotFound,
            DispatchError::LoginRequired { .. } => ErrorCode::LoginRequired,
            DispatchError::Unauthorized { .. } => ErrorCode::Unauthorized,
            DispatchError::MultipleCommandParameters
            | DispatchError::MalformedCommand { .. }
            | DispatchError::ItemIndexOutOfRange { .. } => ErrorCode::Validation,
            DispatchError::UnresolvedResult { .. } | DispatchError::Registration(_) => {
                ErrorCode::Configuration
            }
            DispatchError::Handler { .. }
            | DispatchError::Generation(_)
            | DispatchError::ResponseCommitted { .. } => ErrorCode::Internal,
        }
    }

    /// Errors after which the session user must sign in again.
    pub fn is_login_required(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::LoginRequired | ErrorCode::NotFound
        )
    }

    /// Display text of this error followed by every source in the chain.
    pub fn trace(&self) -> String {
        let mut trace = format!("{self}");
        let mut source = self.source();
        while let Some(cause) = source {
            trace.push_str("\ncaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}

impl From<&DispatchError> for ApiError {
    fn from(value: &DispatchError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
