//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: blockbot_core::config::ConfigError,
    },

    /// The initial avatar connection failed.
    #[error("connection error: {source}")]
    Connection {
        /// The underlying supervisor error.
        #[from]
        source: blockbot_core::supervisor::SupervisorError,
    },

    /// The control server failed to start.
    #[error("control server error: {source}")]
    Control {
        /// The underlying startup error.
        #[from]
        source: blockbot_control::startup::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
