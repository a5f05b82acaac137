use crate::GpioError;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    /// A line could not be opened or configured.
    #[error("line `{line}` unavailable: {source}")]
    Resource {
        line: String,
        #[source]
        source: GpioError,
    },
    /// A line write failed in the middle of a transfer. The controller might not be in the state
    /// the driver thinks it is, so `begin` should be called again before going on.
    #[error("sending {value:#04x} (data: {data}) failed: {source}")]
    Command {
        value: u8,
        data: bool,
        #[source]
        source: GpioError,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Some lines failed to release. Every line has been attempted nonetheless.
    #[error("failed to release {} line(s)", .0.len())]
    Release(Vec<(String, GpioError)>),
    #[error("driver already closed")]
    Closed,
}

pub type LcdResult<T> = Result<T, LcdError>;
