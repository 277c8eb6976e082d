pub mod edc;
pub mod error;
pub mod transfer;

pub use error::EdcError;

pub type Result<T> = std::result::Result<T, EdcError>;
