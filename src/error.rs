use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of a command failed; the error tree underneath says why.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the chapter library")]
    Library,
    #[display("invalid book identifier")]
    Book,
    #[display("chapter cache operation failed")]
    Cache,
    #[display("reading session failed")]
    Session,
}
