use colored::*;
use std::{fmt, io};

pub type MicaResult<T = ()> = Result<T, MicaError>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MicaErrorKind {
    Type,
    Eval,
    Internal,
    IO,
    Unknown,
}

impl fmt::Display for MicaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MicaErrorKind::Type => "type error",
                MicaErrorKind::Eval => "evaluation error",
                MicaErrorKind::Internal => "internal error",
                MicaErrorKind::IO => "i/o error",
                MicaErrorKind::Unknown => "unknown error",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MicaError {
    pub msg: String,
    pub kind: MicaErrorKind,
}

impl fmt::Display for MicaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl MicaError {
    pub fn internal<S: ToString>(msg: S) -> MicaError {
        MicaError {
            msg: msg.to_string(),
            kind: MicaErrorKind::Internal,
        }
    }

    pub fn emit(self) {
        let kind = format!("{}:", self.kind);
        eprintln!("{} {}", kind.bold().red(), self.msg.bold());
    }
}

impl From<MicaError> for Vec<MicaError> {
    fn from(err: MicaError) -> Vec<MicaError> {
        vec![err]
    }
}

impl From<io::Error> for MicaError {
    fn from(err: io::Error) -> MicaError {
        MicaError {
            msg: err.to_string(),
            kind: MicaErrorKind::IO,
        }
    }
}

impl From<Box<bincode::ErrorKind>> for MicaError {
    fn from(err: Box<bincode::ErrorKind>) -> MicaError {
        MicaError {
            msg: err.to_string(),
            kind: MicaErrorKind::IO,
        }
    }
}
