//! In-memory transport recording everything sent to it.
//!
//! Models a server with `autocommit = 0`: writes are pending in the session
//! until it commits, and discarded when it closes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bind;
use crate::driver::{Connection, Driver, ExecuteResult, RawConnection, ReadOptions, Session};
use crate::errors::{MocaError, Result};
use crate::table::Table;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub opened: usize,
    pub closed: usize,
    pub raw_opened: usize,
    pub raw_closed: usize,
    pub commits: usize,
}

#[derive(Debug, Default)]
struct ServerState {
    results: HashMap<String, Table>,
    procedures: HashMap<String, (Vec<String>, Option<Table>)>,
    failing: HashSet<String>,
    refuse_connections: bool,
    collide: bool,

    statements: Vec<String>,
    committed: Vec<String>,
    last_read_options: Option<ReadOptions>,
    stats: ServerStats,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(MemoryDriver {
            state: self.state.clone(),
        })
    }

    /// Return `table` for a read of exactly `sql`, as rendered.
    pub fn add_result(&self, sql: &str, table: Table) {
        self.state.lock().results.insert(sql.to_string(), table);
    }

    /// Register a procedure by its rendered `CALL` statement.
    pub fn add_procedure(&self, call: &str, writes: Vec<String>, result: Option<Table>) {
        self.state
            .lock()
            .procedures
            .insert(call.to_string(), (writes, result));
    }

    /// Fail any statement rendering to exactly `sql`.
    pub fn fail_on(&self, sql: &str) {
        self.state.lock().failing.insert(sql.to_string());
    }

    pub fn refuse_connections(&self) {
        self.state.lock().refuse_connections = true;
    }

    /// Report every staged table as already existing.
    pub fn collide_staged_tables(&self) {
        self.state.lock().collide = true;
    }

    /// Every rendered query and execute statement, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.state.lock().committed.clone()
    }

    pub fn last_read_options(&self) -> Option<ReadOptions> {
        self.state.lock().last_read_options
    }

    pub fn stats(&self) -> ServerStats {
        self.state.lock().stats
    }
}

#[derive(Debug)]
struct MemoryDriver {
    state: Arc<Mutex<ServerState>>,
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(MocaError::connection("connection refused"));
        }
        state.stats.opened += 1;
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            pending: Vec::new(),
            temp_tables: HashMap::new(),
        }))
    }

    async fn connect_raw(&self) -> Result<Box<dyn RawConnection>> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(MocaError::connection("connection refused"));
        }
        state.stats.raw_opened += 1;
        Ok(Box::new(MemoryRawConnection {
            state: self.state.clone(),
            pending: Vec::new(),
        }))
    }
}

fn render(sql: &str) -> Result<String> {
    bind::render(sql).map_err(|e| MocaError::statement(sql, e))
}

#[derive(Debug)]
struct MemoryConnection {
    state: Arc<Mutex<ServerState>>,
    pending: Vec<String>,
    temp_tables: HashMap<String, Table>,
}

impl MemoryConnection {
    /// Render and log a statement, failing it if registered to fail.
    fn accept(&self, sql: &str) -> Result<String> {
        let rendered = render(sql)?;
        let mut state = self.state.lock();
        state.statements.push(rendered.clone());
        if state.failing.contains(&rendered) {
            return Err(MocaError::statement(rendered, "statement failed"));
        }
        Ok(rendered)
    }

    fn staged_scan(&self, rendered: &str) -> Option<Table> {
        let name = rendered
            .trim_end_matches(';')
            .trim()
            .strip_prefix("SELECT * FROM ")?;
        self.temp_tables.get(name.trim_matches('`')).cloned()
    }
}

#[async_trait]
impl Session for MemoryConnection {
    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.committed.append(&mut self.pending);
        state.stats.commits += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().stats.closed += 1;
        Ok(())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&mut self, sql: &str, opts: ReadOptions) -> Result<Table> {
        let rendered = self.accept(sql)?;
        self.state.lock().last_read_options = Some(opts);

        if let Some(table) = self.staged_scan(&rendered) {
            return Ok(table);
        }
        self.state
            .lock()
            .results
            .get(&rendered)
            .cloned()
            .ok_or_else(|| MocaError::statement(rendered, "no result registered"))
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecuteResult> {
        let rendered = self.accept(sql)?;
        self.pending.push(rendered.clone());
        Ok(ExecuteResult {
            statement: rendered,
            affected_rows: 1,
            last_insert_id: None,
            output: None,
        })
    }

    async fn create_temporary_table(&mut self, name: &str, statement: &str) -> Result<()> {
        self.accept(statement)?;
        if self.state.lock().collide || self.temp_tables.contains_key(name) {
            return Err(MocaError::StagingCollision(name.to_string()));
        }
        self.temp_tables.insert(name.to_string(), Table::empty());
        Ok(())
    }

    async fn insert_rows(&mut self, table: &str, data: &Table, _batch_size: usize) -> Result<u64> {
        let name = table.trim_matches('`');
        let staged = self
            .temp_tables
            .get_mut(name)
            .ok_or_else(|| MocaError::statement(table, "table does not exist"))?;
        *staged = data.clone();
        Ok(data.num_rows() as u64)
    }
}

#[derive(Debug)]
struct MemoryRawConnection {
    state: Arc<Mutex<ServerState>>,
    pending: Vec<String>,
}

#[async_trait]
impl Session for MemoryRawConnection {
    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.committed.append(&mut self.pending);
        state.stats.commits += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().stats.raw_closed += 1;
        Ok(())
    }
}

#[async_trait]
impl RawConnection for MemoryRawConnection {
    async fn call_procedure(&mut self, statement: &str, opts: ReadOptions) -> Result<Table> {
        let rendered = render(statement)?;
        let mut state = self.state.lock();
        state.last_read_options = Some(opts);
        let (writes, result) = state
            .procedures
            .get(&rendered)
            .cloned()
            .ok_or_else(|| MocaError::statement(rendered.clone(), "procedure does not exist"))?;
        self.pending.extend(writes);
        Ok(result.unwrap_or_else(Table::empty))
    }
}
