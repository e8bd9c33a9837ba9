use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ClipcamError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Capture acquisition failures surfaced by a media provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Camera/microphone permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("Capture device unavailable: {details}")]
    DeviceUnavailable { details: String },
}

/// Face detector failures; load failures degrade annotation only
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Failed to load face detection model: {details}")]
    Load { details: String },

    #[error("Face detection failed: {details}")]
    Inference { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, ClipcamError>;
