// Copyright 2023 Remi Bernotavicius

use crate::database::models::RecipeId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Anything that went wrong underneath the catalogue: the driver, the SQL, a constraint, or the
/// filesystem.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Query(#[from] diesel::result::Error),

    #[error(transparent)]
    Connection(#[from] diesel::ConnectionError),

    #[error("failed to read {path:?}: {source}")]
    Resource { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("recipe with ID={0} does not exist")]
    NotFound(RecipeId),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Persistence(PersistenceError::Invalid(message.into()))
    }

    pub fn resource(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence(PersistenceError::Resource {
            path: path.into(),
            source,
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Hands back the underlying I/O error, if that is all this is.
    pub fn into_io_error(self) -> std::result::Result<io::Error, Self> {
        match self {
            Self::Persistence(PersistenceError::Io(e)) => Ok(e),
            other => Err(other),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        Self::Persistence(e.into())
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(e: diesel::ConnectionError) -> Self {
        Self::Persistence(e.into())
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Persistence(e.into())
    }
}

#[test]
fn error_messages() {
    let e = Error::invalid("abc is not a valid number.");
    assert_eq!(
        e.to_string(),
        "persistence error: abc is not a valid number."
    );
    assert!(!e.is_not_found());

    let e = Error::NotFound(RecipeId::from(7));
    assert_eq!(e.to_string(), "recipe with ID=7 does not exist");
    assert!(e.is_not_found());

    let e = Error::resource(
        "missing.sql",
        io::Error::new(io::ErrorKind::NotFound, "no such file"),
    );
    assert_eq!(
        e.to_string(),
        "persistence error: failed to read \"missing.sql\": no such file"
    );

    let e = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
    assert_eq!(e.into_io_error().unwrap().kind(), io::ErrorKind::BrokenPipe);
    assert!(Error::NotFound(RecipeId::from(7)).into_io_error().is_err());
}
