//! Config Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed.
    #[display("failed to load configuration")]
    Load,
    /// Configuration parsed, but a value makes no sense.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// No library was configured and there is no home directory to put the
    /// default one in.
    #[display("could not determine a home directory for the default library")]
    NoHomeDirectory,
}
