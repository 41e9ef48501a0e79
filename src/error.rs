use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// What the command line could not do.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not read or write settings")]
    Settings,
    #[display("could not start the organizer")]
    Startup,
    #[display("could not organize the folder")]
    Organize,
}
