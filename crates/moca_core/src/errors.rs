pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum MocaError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to connect: {0}")]
    Connection(#[source] BoxError),

    #[error("Not a tabular dataset: {0}")]
    StagingType(String),

    #[error("Staged table '{0}' already exists")]
    StagingCollision(String),

    #[error("Statement failed: {source}, statement: {statement}")]
    Statement {
        statement: String,
        #[source]
        source: BoxError,
    },

    #[error("Unable to convert value for column {column}: {message}")]
    Conversion { column: String, message: String },
}

impl MocaError {
    pub fn connection(err: impl Into<BoxError>) -> Self {
        MocaError::Connection(err.into())
    }

    pub fn statement(statement: impl Into<String>, err: impl Into<BoxError>) -> Self {
        MocaError::Statement {
            statement: statement.into(),
            source: err.into(),
        }
    }
}

pub type Result<T, E = MocaError> = std::result::Result<T, E>;
