#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command name must not be empty")]
    EmptyCommandName,

    #[error("keyword '{name}' is already registered")]
    DuplicateCommand { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
