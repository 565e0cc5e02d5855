use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Couldn't parse file {path}")]
    Parse {
        path: String,
        #[source]
        cause: Box<ComponentError>,
    },

    #[error("Source resolution failed: {0}")]
    Resolution(#[source] BridgeError),

    #[error("Source discovery failed: {0}")]
    Discovery(#[source] BridgeError),

    #[error("Construction failed: {0}")]
    Construction(#[from] anyhow::Error),

    #[error("Component '{0}' is already registered")]
    Duplicate(String),

    #[error("Invalid configuration for '{component}': {reason}")]
    InvalidConfig { component: String, reason: String },

    #[error("Listener '{listener}' has no method '{method}' for event '{event}'")]
    MissingMethod {
        listener: String,
        event: String,
        method: String,
    },

    #[error("Emitter \"{0}\" does not exist.")]
    UnknownEmitter(String),

    #[error("Listener '{0}' has no handler assigned")]
    HandlerNotAssigned(String),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

impl ComponentError {
    /// The original failure behind a [`ComponentError::Parse`], if any.
    pub fn cause(&self) -> Option<&ComponentError> {
        match self {
            ComponentError::Parse { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Failure of a single listener invocation.
///
/// Delivered to the owning handler, never returned to the emitter.
#[derive(Error, Debug)]
pub enum ListenerFailure {
    #[error("Handler failed: {0}")]
    Handler(#[source] anyhow::Error),

    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// No runtime was running and a temporary one could not be started.
    #[error("Runtime unavailable: {0}")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ComponentError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
