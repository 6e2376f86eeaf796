use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// The program could not be started (not found, not executable, bad
    /// working directory).
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
