//! In-process engine double for unit tests. Responses are keyed by exact SQL text
//! and every call is journaled so tests can assert on opens, closes and queries.

use crate::engine::{
    EngineConnection, OpenMode, ResultTable, ScalarValue, SharedCache, SqlEngine,
    SqlEngineProvider,
};
use crate::errors::{ErrorKind, SqlCaseError, SqlCaseResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct ScriptState {
    journal: Vec<String>,
    tables: HashMap<String, ResultTable>,
    failures: HashMap<String, String>,
    scalars: HashMap<String, ScalarValue>,
    unopenable: HashSet<String>,
    missing_extensions: HashSet<String>,
    runtime_refs: usize,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedEngine {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> ScriptedEngine {
        ScriptedEngine::default()
    }

    pub(crate) fn engine(&self) -> SqlEngine {
        SqlEngine::new(self.clone())
    }

    pub(crate) fn respond(&self, sql: &str, table: ResultTable) -> &Self {
        self.state.lock().tables.insert(sql.to_string(), table);
        self
    }

    pub(crate) fn fail(&self, sql: &str, message: &str) -> &Self {
        self.state
            .lock()
            .failures
            .insert(sql.to_string(), message.to_string());
        self
    }

    pub(crate) fn scalar(&self, sql: &str, value: ScalarValue) -> &Self {
        self.state.lock().scalars.insert(sql.to_string(), value);
        self
    }

    pub(crate) fn refuse_open(&self, path: &str) -> &Self {
        self.state.lock().unopenable.insert(path.to_string());
        self
    }

    pub(crate) fn refuse_extension(&self, name: &str) -> &Self {
        self.state.lock().missing_extensions.insert(name.to_string());
        self
    }

    pub(crate) fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub(crate) fn runtime_refs(&self) -> usize {
        self.state.lock().runtime_refs
    }
}

impl SqlEngineProvider for ScriptedEngine {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    fn open(&self, path: &str, mode: OpenMode) -> SqlCaseResult<Box<dyn EngineConnection>> {
        let mut state = self.state.lock();
        if state.unopenable.contains(path) {
            return Err(SqlCaseError::new(
                "unable to open database file",
                ErrorKind::ConnectionError,
            ));
        }
        state.journal.push(format!("open {} {}", path, mode));
        Ok(Box::new(ScriptedConnection {
            path: path.to_string(),
            state: self.state.clone(),
        }))
    }

    fn acquire_runtime(&self) -> SqlCaseResult<()> {
        let mut state = self.state.lock();
        state.runtime_refs += 1;
        state.journal.push("acquire".to_string());
        Ok(())
    }

    fn release_runtime(&self) {
        let mut state = self.state.lock();
        state.runtime_refs = state.runtime_refs.saturating_sub(1);
        state.journal.push("release".to_string());
    }
}

struct ScriptedConnection {
    path: String,
    state: Arc<Mutex<ScriptState>>,
}

impl EngineConnection for ScriptedConnection {
    fn get_table(&mut self, sql: &str) -> SqlCaseResult<ResultTable> {
        let mut state = self.state.lock();
        state.journal.push(format!("query {}", sql));
        if let Some(message) = state.failures.get(sql) {
            return Err(SqlCaseError::new(message, ErrorKind::ExecutionError));
        }
        Ok(state.tables.get(sql).cloned().unwrap_or_default())
    }

    fn exec(&mut self, sql: &str) -> SqlCaseResult<()> {
        let mut state = self.state.lock();
        state.journal.push(format!("exec {}", sql));
        match state.failures.get(sql) {
            Some(message) => Err(SqlCaseError::new(message, ErrorKind::ExecutionError)),
            None => Ok(()),
        }
    }

    fn query_scalar(&mut self, sql: &str) -> SqlCaseResult<ScalarValue> {
        let mut state = self.state.lock();
        state.journal.push(format!("scalar {}", sql));
        if let Some(message) = state.failures.get(sql) {
            return Err(SqlCaseError::new(message, ErrorKind::ExecutionError));
        }
        Ok(state.scalars.get(sql).cloned().unwrap_or(ScalarValue::Null))
    }

    fn attach_cache(&mut self, cache: &SharedCache) -> SqlCaseResult<()> {
        self.state
            .lock()
            .journal
            .push(format!("attach {}", cache.label()));
        Ok(())
    }

    fn load_extension(&mut self, name: &str) -> SqlCaseResult<()> {
        let mut state = self.state.lock();
        state.journal.push(format!("load {}", name));
        if state.missing_extensions.contains(name) {
            return Err(SqlCaseError::new(
                &format!("{}: cannot open shared object file", name),
                ErrorKind::ExtensionError,
            ));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> SqlCaseResult<()> {
        self.state.lock().journal.push(format!("close {}", self.path));
        Ok(())
    }
}
