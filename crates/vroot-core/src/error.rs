/// Failure to turn a filesystem object into a path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PathError {
    /// The host could not produce a path for the object.
    #[error("Unable to resolve node to a path: {0}")]
    Unresolvable(String),

    /// The object's path does not start with its root's path.
    #[error("Path '{path}' is not inside root '{root}'")]
    OutsideRoot { path: String, root: String },
}

/// Failure to read an object's persistent flags.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AttributeError {
    /// The underlying filesystem does not store the flag word.
    #[error("Filesystem does not support node flags")]
    Unsupported,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to hand a message to a provider.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// No provider is connected for the root.
    #[error("No provider connected for root {0}")]
    NotConnected(i16),

    /// The provider's queue refused the message.
    #[error("Provider for root {root} rejected message: {reason}")]
    Rejected { root: i16, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to initialize or release the root registry.
#[derive(Debug, thiserror::Error)]
#[error("Root registry error: {0}")]
pub struct RegistryError(pub String);

/// The object's flags could not be read.
///
/// This is not a policy outcome: the host must abort the operation instead of
/// guessing a verdict.
#[derive(Debug, thiserror::Error)]
#[error("Cannot read access flags for '{path}'")]
pub struct IntegrityViolation {
    pub path: String,
    #[source]
    pub source: AttributeError,
}

/// Errors from starting or stopping the service.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Service is already running")]
    AlreadyRunning,

    #[error("Service is not running")]
    NotRunning,

    #[error("Failed to register interception listener: {0}")]
    Listen(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<vroot_config::ConfigError> for ServiceError {
    fn from(e: vroot_config::ConfigError) -> Self {
        ServiceError::Config(e.to_string())
    }
}
