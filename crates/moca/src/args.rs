use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, ValueEnum};
use moca_core::config::{ENV_DBNAME, ENV_HOST, ENV_PASSWORD, ENV_PORT, ENV_USERNAME};
use moca_core::{ConnectionConfig, EngineOptions, Table};

/// Where to reach the database. Flags override environment variables, which
/// override the config file.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Database host.
    #[clap(long, env = ENV_HOST, global = true)]
    pub host: Option<String>,

    /// Database port.
    #[clap(long, env = ENV_PORT, global = true)]
    pub port: Option<u16>,

    /// User to connect as.
    #[clap(long, env = ENV_USERNAME, global = true)]
    pub username: Option<String>,

    /// Password for the user.
    #[clap(long, env = ENV_PASSWORD, hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Database to use.
    #[clap(long, env = ENV_DBNAME, global = true)]
    pub database: Option<String>,

    /// JSON file with connection parameters.
    #[clap(long, value_parser, global = true)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn resolve(&self) -> Result<ConnectionConfig> {
        let mut conf = ConnectionConfig::load(self.config.as_deref())?;
        if let Some(host) = &self.host {
            conf.host = host.clone();
        }
        if let Some(port) = self.port {
            conf.port = Some(port);
        }
        if let Some(username) = &self.username {
            conf.username = username.clone();
        }
        if let Some(password) = &self.password {
            conf.password = Some(password.clone());
        }
        if let Some(database) = &self.database {
            conf.database = database.clone();
        }
        conf.validate()?;
        Ok(conf)
    }
}

#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    /// Identifier in the query that refers to the staged table.
    #[clap(long, default_value = "tmp_table", global = true)]
    pub placeholder: String,

    /// Send `%` to the server as is instead of escaping it.
    #[clap(long, global = true)]
    pub no_escape_percent: bool,

    /// Read DECIMAL columns as floating point.
    #[clap(long, global = true)]
    pub coerce_float: bool,

    /// Max rows per INSERT when staging a table.
    #[clap(long, default_value_t = 1000, global = true)]
    pub insert_batch_size: usize,
}

impl From<EngineArgs> for EngineOptions {
    fn from(args: EngineArgs) -> Self {
        EngineOptions {
            placeholder: args.placeholder,
            escape_percent: !args.no_escape_percent,
            coerce_float: args.coerce_float,
            insert_batch_size: args.insert_batch_size,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    #[default]
    Table,
    Json,
    Csv,
}

/// SQL given inline or read from a file.
#[derive(Debug, Clone, Args)]
pub struct SqlArgs {
    /// SQL to run.
    #[clap(value_parser)]
    pub sql: Option<String>,

    /// Read the SQL from a file instead.
    #[clap(short, long, value_parser, conflicts_with = "sql")]
    pub file: Option<PathBuf>,

    /// JSON dataset to stage as a temporary table, either an array of records
    /// or an object of columns.
    #[clap(long, value_parser)]
    pub tmp_table: Option<PathBuf>,
}

impl SqlArgs {
    pub fn read_sql(&self) -> Result<String> {
        match (&self.sql, &self.file) {
            (Some(sql), None) => Ok(sql.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| anyhow!("failed to read '{}': {e}", path.display())),
            (None, None) => Err(anyhow!("either SQL or a file containing SQL is required")),
            (Some(_), Some(_)) => Err(anyhow!(
                "only one of SQL or an SQL file can be passed at a time"
            )),
        }
    }

    /// Load the staging dataset, if one was given.
    pub fn read_tmp_table(&self) -> Result<Option<Table>> {
        let Some(path) = &self.tmp_table else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read '{}': {e}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|e| anyhow!("failed to parse '{}': {e}", path.display()))?;
        Ok(Some(Table::from_json(&value)?))
    }
}
