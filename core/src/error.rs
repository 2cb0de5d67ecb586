use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::typ::TypeTag;

/// Source location of a compiled operation: the unit it belongs to and the
/// offset the type checker attached to the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteLocation {
    pub unit: Arc<str>,
    pub offset: u32,
}

impl SiteLocation {
    pub fn new(unit: impl Into<Arc<str>>, offset: u32) -> Self {
        Self {
            unit: unit.into(),
            offset,
        }
    }

    /// Location used for operations built outside of a compiled unit.
    pub fn detached() -> Self {
        Self {
            unit: Arc::from("<detached>"),
            offset: 0,
        }
    }
}

impl fmt::Display for SiteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.unit, self.offset)
    }
}

/// Coarse classification of [`ScriptError`], stable for hosts to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Coercion,
    Dispatch,
    BuildRejected,
    CatalogConflict,
    MissingParameter,
    Host,
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("cannot convert {from} to {to}: {reason}")]
    Coercion {
        from: TypeTag,
        to: String,
        reason: String,
    },
    #[error("no permitted target for {name}({arg_types}) at {location}")]
    Dispatch {
        location: SiteLocation,
        name: Arc<str>,
        arg_types: String,
        reason: String,
    },
    #[error("rejected at {location}: {reason} (expected {expected}, found {actual})")]
    BuildRejected {
        location: SiteLocation,
        reason: String,
        expected: String,
        actual: String,
    },
    #[error("descriptor {name}({params}) already interned returning {existing}, not {requested}")]
    CatalogConflict {
        name: Arc<str>,
        params: String,
        existing: String,
        requested: String,
    },
    #[error("parameter `{0}` is required but was not bound")]
    MissingParameter(String),
    #[error(transparent)]
    Host(#[from] anyhow::Error),
}

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Coercion { .. } => ErrorKind::Coercion,
            ScriptError::Dispatch { .. } => ErrorKind::Dispatch,
            ScriptError::BuildRejected { .. } => ErrorKind::BuildRejected,
            ScriptError::CatalogConflict { .. } => ErrorKind::CatalogConflict,
            ScriptError::MissingParameter(_) => ErrorKind::MissingParameter,
            ScriptError::Host(_) => ErrorKind::Host,
        }
    }

    pub(crate) fn coercion(from: TypeTag, to: impl fmt::Display, reason: impl Into<String>) -> Self {
        ScriptError::Coercion {
            from,
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn rejected(
        location: &SiteLocation,
        reason: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        ScriptError::BuildRejected {
            location: location.clone(),
            reason: reason.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T, E = ScriptError> = std::result::Result<T, E>;
