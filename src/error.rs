use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SnakeError {
    /// Malformed record in a spatial score file (1-based line number).
    Format { line: usize, reason: String },
    /// No free cell is left for food.
    BoardFull,
    GridMismatch {
        expected: (i32, i32),
        found: (i32, i32),
    },
    InvalidConfig(String),
    /// Inference or update failure inside the policy. Not recoverable.
    Policy(String),
    Codec(String),
    Io(io::Error),
}

impl fmt::Display for SnakeError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SnakeError::Format { line, reason } => {
                write!(formatter, "malformed spatial score record on line {}: {}", line, reason)
            }
            SnakeError::BoardFull => write!(formatter, "no free cell left to place food"),
            SnakeError::GridMismatch { expected, found } => write!(
                formatter,
                "spatial table grid {}x{} does not match board {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            SnakeError::InvalidConfig(msg) => write!(formatter, "invalid config: {}", msg),
            SnakeError::Policy(msg) => write!(formatter, "policy failure: {}", msg),
            SnakeError::Codec(msg) => write!(formatter, "binary table codec: {}", msg),
            SnakeError::Io(e) => write!(formatter, "io: {}", e),
        }
    }
}

impl Error for SnakeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SnakeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SnakeError {
    fn from(e: io::Error) -> Self {
        SnakeError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, SnakeError>;
