use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use win32resources::VersionError;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("path is not valid unicode: {0:?}")]
    NonUnicodePath(PathBuf),
    #[error("path can't be embedded in a batch script: {0:?}")]
    UnsafePath(String),
    #[error("failed to write the replacement script {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("unable to resolve the path of the running executable")]
    CurrentExe(#[source] io::Error),
    #[error("the executable {0:?} has no parent directory")]
    NoInstallDir(PathBuf),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("failed to launch the replacement script {path:?}")]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
