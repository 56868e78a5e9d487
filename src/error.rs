use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("config error: {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("Please specify both an output and an input path.")]
    MissingPaths,

    #[error("discovery error: cannot read input root {root}: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("extraction error: {file} [{entry}]: {source}")]
    Extraction {
        file: PathBuf,
        entry: String,
        #[source]
        source: Cause,
    },

    #[error("path collision: {path} is produced by both {first} and {second}")]
    PathCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("render error: {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: Cause,
    },

    #[error("render session error: {source}")]
    Session {
        #[source]
        source: Cause,
    },

    #[error("write error: failed to create file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn config(path: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        Self::Config {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn discovery(root: impl Into<PathBuf>, source: impl Into<Cause>) -> Self {
        Self::Discovery {
            root: root.into(),
            source: source.into(),
        }
    }

    pub fn extraction(
        file: impl Into<PathBuf>,
        entry: impl Into<String>,
        source: impl Into<Cause>,
    ) -> Self {
        Self::Extraction {
            file: file.into(),
            entry: entry.into(),
            source: source.into(),
        }
    }

    pub fn render(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Render {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn session(source: anyhow::Error) -> Self {
        Self::Session {
            source: source.into(),
        }
    }

    /// Whether the whole run must stop when this error surfaces.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Extraction { .. } | Self::Render { .. })
    }
}
