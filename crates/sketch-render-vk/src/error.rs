// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The process environment lacks something (library, valid config).
    Environment,
    /// The driver or window system does not offer a needed capability.
    Capability,
    /// A driver call returned a failure code.
    Driver,
}

#[derive(Debug, Error)]
pub enum VkError {
    #[error("failed to load vulkan library `{library}`: {reason}")]
    Library { library: String, reason: String },

    #[error("vulkan loader has not been initialized")]
    NotInitialized,

    #[error("entry point {0} is not available")]
    Unsupported(&'static str),

    #[error("required extension {0} is not available")]
    MissingExtension(&'static str),

    #[error("native window unavailable: {0}")]
    Window(String),

    #[error("{call} failed: {code} ({code:?})")]
    Driver { call: &'static str, code: vk::Result },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VkError {
    pub fn driver(call: &'static str, code: vk::Result) -> Self {
        Self::Driver { call, code }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Library { .. } | Self::Config(_) => ErrorKind::Environment,
            Self::NotInitialized
            | Self::Unsupported(_)
            | Self::MissingExtension(_)
            | Self::Window(_) => ErrorKind::Capability,
            Self::Driver { .. } => ErrorKind::Driver,
        }
    }
}

/// Human readable text for a driver status code. Logging only.
pub fn describe(code: vk::Result) -> String {
    code.to_string()
}
