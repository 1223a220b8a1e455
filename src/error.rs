use derive_more::From;
use std::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    Kubeconfig(kube::config::KubeconfigError),

    /// Listing nodes failed, so no snapshot could be built
    SourceUnavailable(String),

    /// The first populate did not finish within the caller's deadline
    Timeout(Duration),

    /// Custom error message
    Custom(String),
}

impl Error {
    /// Wrap a node listing failure
    pub fn source_unavailable(err: impl core::fmt::Display) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::SourceUnavailable(msg) => write!(fmt, "cluster data source unavailable: {msg}"),
            Self::Timeout(after) => write!(fmt, "timed out after {}ms waiting for first snapshot", after.as_millis()),
            Self::Custom(msg) => write!(fmt, "{msg}"),
            _ => write!(fmt, "{self:?}"),
        }
    }
}

impl std::error::Error for Error {}
