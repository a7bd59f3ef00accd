use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
    sync::Arc,
};

use image::ImageError;

use crate::index::ResourceKind;

#[derive(Debug, Clone)]
pub enum FetchError {
    NotFound(String),
    Io { path: String, error: Arc<io::Error> },
}

impl FetchError {
    pub fn path(&self) -> &str {
        match self {
            FetchError::NotFound(path) => path,
            FetchError::Io { path, .. } => path,
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(path) => write!(f, "File {} not found", path),
            FetchError::Io { path, error } => write!(f, "Failed to read {}: {}", path, error),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchError::NotFound(_) => None,
            FetchError::Io { error, .. } => Some(error.as_ref()),
        }
    }
}

#[derive(Debug)]
pub enum ParseError {
    Json(serde_json::Error),
    Image(ImageError),
    BadMagic { expected: &'static [u8] },
    UnexpectedPayload(ResourceKind),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Json(error) => Display::fmt(error, f),
            ParseError::Image(error) => Display::fmt(error, f),
            ParseError::BadMagic { expected } => write!(
                f,
                "Bad file magic, expected {:?}",
                String::from_utf8_lossy(expected)
            ),
            ParseError::UnexpectedPayload(kind) => {
                write!(f, "Unexpected payload type for {} resource", kind)
            }
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Json(error) => Some(error),
            ParseError::Image(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<ImageError> for ParseError {
    fn from(value: ImageError) -> Self {
        Self::Image(value)
    }
}

/// Failure of a single resource slot. Never fatal to the pipeline.
#[derive(Debug)]
pub enum LoadError {
    Fetch(FetchError),
    Parse { path: String, error: ParseError },
}

impl LoadError {
    pub(crate) fn parse(path: &str, error: impl Into<ParseError>) -> Self {
        Self::Parse {
            path: path.to_owned(),
            error: error.into(),
        }
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch(error) => Display::fmt(error, f),
            LoadError::Parse { path, error } => write!(f, "Failed to parse {}: {}", path, error),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Fetch(error) => Some(error),
            LoadError::Parse { error, .. } => Some(error),
        }
    }
}

impl From<FetchError> for LoadError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}
