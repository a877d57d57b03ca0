use thiserror::Error;

use crate::config::ConfigError;
use crate::database_schema::SchemaError;
use crate::registry_file::RegistryError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Extra guidance for the operator, printed under the error itself.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Schema(error) => error.hint(),
            Error::Registry(RegistryError::TableIdsExhausted { .. }) => {
                Some("Renumber the IDs in the table registry to leave room for new tables.")
            }
            Error::Config(_) | Error::Registry(_) => None,
        }
    }
}
