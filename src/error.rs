use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Arithmetic between incompatibly shaped containers. Always a
    /// configuration bug; never recovered.
    DimensionMismatch(String),
    /// Determinant requested on a non-square matrix.
    NotSquare { rows: usize, cols: usize },
    /// Out-of-range element or row access.
    IndexOutOfBounds { index: usize, bound: usize },
    /// Unrecognized activation name at factory-selection time.
    UnsupportedActivation(String),
    /// Unrecognized learning-rate schedule name.
    UnsupportedSchedule(String),
    /// Unrecognized pooling name.
    UnsupportedPooling(String),
    InvalidConfig(String),
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionMismatch(msg) => write!(f, "dimension mismatch: {msg}"),
            Error::NotSquare { rows, cols } => {
                write!(
                    f,
                    "cannot compute the determinant of a non-square {rows}x{cols} matrix"
                )
            }
            Error::IndexOutOfBounds { index, bound } => {
                write!(f, "index {index} is out of bounds (container holds {bound})")
            }
            Error::UnsupportedActivation(name) => {
                write!(f, "unsupported activation function: {name}")
            }
            Error::UnsupportedSchedule(name) => {
                write!(f, "unsupported learning-rate schedule: {name}")
            }
            Error::UnsupportedPooling(name) => write!(f, "unsupported pooling: {name}"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
