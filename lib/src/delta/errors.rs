use crate::archive;
use crate::jvm;
use std::fmt;

/// Errors from computing, encoding, or applying differences
#[derive(Debug)]
pub enum Error {
    /// Class bytes could not be read or written
    Class(jvm::Error),

    /// Archive could not be read or written
    Archive(archive::Error),

    IoError(std::io::Error),

    /// Patch document is not valid JSON or does not have the expected shape
    Document(serde_json::Error),

    /// Hex payload has an odd length or a non-hex digit
    Hex(hex::FromHexError),

    /// Difference targets a class not in the class map
    MissingClass(String),

    /// Difference targets a field or method not in its class
    MissingMember { class: String, member: String },

    /// Method payload does not hold exactly one method
    BadMethodContainer(usize),
}

/// Coarse classification of [`Error`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input bytes (archive, class, or patch) could not be parsed
    Malformed,

    /// Input parsed, but does not fit what it is applied to or embedded in
    Verification,

    /// Hex payload is not valid hex
    Encoding,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Class(_) | Error::Archive(_) | Error::IoError(_) => ErrorKind::Malformed,
            Error::Document(err) if err.is_data() => ErrorKind::Verification,
            Error::Document(_) => ErrorKind::Malformed,
            Error::Hex(_) => ErrorKind::Encoding,
            Error::MissingClass(_)
            | Error::MissingMember { .. }
            | Error::BadMethodContainer(_) => ErrorKind::Verification,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Class(err) => write!(f, "bad class: {}", err),
            Error::Archive(err) => write!(f, "bad archive: {}", err),
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::Document(err) => write!(f, "bad patch document: {}", err),
            Error::Hex(err) => write!(f, "bad hex payload: {}", err),
            Error::MissingClass(name) => write!(f, "class {} does not exist", name),
            Error::MissingMember { class, member } => {
                write!(f, "{} does not exist in class {}", member, class)
            }
            Error::BadMethodContainer(count) => write!(
                f,
                "method payload should contain exactly one method, found {}",
                count
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Class(err) => Some(err),
            Error::Archive(err) => Some(err),
            Error::IoError(err) => Some(err),
            Error::Document(err) => Some(err),
            Error::Hex(err) => Some(err),
            _ => None,
        }
    }
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Class(err)
    }
}

impl From<archive::Error> for Error {
    fn from(err: archive::Error) -> Error {
        Error::Archive(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Document(err)
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Error {
        Error::Hex(err)
    }
}
