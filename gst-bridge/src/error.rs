use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("GStreamer init failed: {0}")]
    Init(String),

    #[error("Failed to parse pipeline description: {0}")]
    Launch(String),

    #[error("Launch description did not produce a pipeline")]
    NotAPipeline,

    #[error("Element not found: {0}")]
    MissingElement(&'static str),

    #[error("Pad {pad} not found on {element}")]
    MissingPad { element: String, pad: String },

    #[error("Failed to set {element}.{property}: {reason}")]
    Property {
        element: String,
        property: &'static str,
        reason: String,
    },

    #[error("State change failed: {0}")]
    StateChange(String),
}
