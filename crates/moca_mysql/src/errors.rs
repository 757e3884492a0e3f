use moca_core::MocaError;
use mysql_async::consts::ColumnType;

/// Server error code for creating a table that already exists.
pub const ER_TABLE_EXISTS_ERROR: u16 = 1050;

#[derive(Debug, thiserror::Error)]
pub enum MysqlError {
    #[error("Unsupported Mysql type: {0:?}, column: {1}")]
    UnsupportedMysqlType(ColumnType, String),

    #[error("Unable to convert mysql value for column {column}: {message}")]
    InvalidValue { column: String, message: String },

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    #[error(transparent)]
    Mysql(#[from] mysql_async::Error),
}

impl MysqlError {
    pub fn is_table_exists(&self) -> bool {
        matches!(
            self,
            MysqlError::Mysql(mysql_async::Error::Server(err)) if err.code == ER_TABLE_EXISTS_ERROR
        )
    }

    /// Convert to the engine error for a failure while running `statement`.
    pub fn into_moca(self, statement: &str) -> MocaError {
        match self {
            MysqlError::UnsupportedMysqlType(typ, column) => MocaError::Conversion {
                column,
                message: format!("unsupported mysql type {typ:?}"),
            },
            MysqlError::InvalidValue { column, message } => {
                MocaError::Conversion { column, message }
            }
            other => MocaError::statement(statement, other),
        }
    }
}

pub type Result<T, E = MysqlError> = std::result::Result<T, E>;
