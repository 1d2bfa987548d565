use crate::types::TypeId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Framing, length, delta or byte-count mismatch in the input.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A value references a type id that was never defined.
    #[error("unknown type id {0}")]
    UnknownType(TypeId),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// Number of bytes left over once the requested decode finished.
    #[error("trailing data: {0} bytes left in buffer")]
    TrailingData(usize),

    #[error("i/o error: {0}")]
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedValue(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::malformed("unexpected end of input"),
            _ => Error::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
