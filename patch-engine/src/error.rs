use thiserror::Error;

use crate::types::{Classification, Disposition};

/// Error type returned by a [`crate::Resolver`] implementation.
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

/// A patch does not fit the tree it is applied to.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("'{path}': patch expects a nested object but the target holds a scalar")]
    ShapeMismatch { path: String },

    #[error("'{path}': remove marker must be an object")]
    MalformedRemoveMarker { path: String },
}

/// Failures of the classification and resolution step.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{file}: '{path}' is classified {classification}, which does not accept '{disposition}'")]
    InvalidDisposition {
        file: String,
        path: String,
        classification: Classification,
        disposition: Disposition,
    },

    #[error("{file}: resolver failed")]
    Resolver {
        file: String,
        #[source]
        source: ResolveError,
    },

    #[error("{file}: patch does not fit its baseline")]
    Patch {
        file: String,
        #[source]
        source: PatchError,
    },
}

/// Inconsistent or tampered patch history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("patch history has a gap: version {missing} is missing (latest is {max})")]
    VersionGap { missing: u32, max: u32 },

    #[error("last applied version {persisted} is ahead of the latest known version {max:?}")]
    PersistedAhead { persisted: u32, max: Option<u32> },
}
