//! In-memory destination for exercising the loader without a database.
//!
//! [`MemoryStore`] behaves like a table with a unique global identifier:
//! inserts of an identifier that is already committed, or already pending in
//! the same transaction, are skipped and not counted. Rolled back rows are
//! discarded. Every session keeps a log of the calls it received.
//!
//! Failures can be injected on an insert containing a given identifier, on
//! preparing a statement of a given size, on the n-th commit, or on the n-th
//! connection.

use async_trait::async_trait;
use connectors::sql::base::{
    error::{ConnectorError, DbError},
    session::{InsertSession, SessionFactory},
};
use model::records::{activity::ActivityRecord, binding::BindingRow};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

/// Builds a well-formed record with the given global identifier.
pub fn record(guid: &str) -> ActivityRecord {
    ActivityRecord {
        marketo_guid: guid.to_string(),
        lead_id: "1001".to_string(),
        activity_date: "2017-06-01T12:00:00Z".to_string(),
        activity_type_id: "2".to_string(),
        campaign_id: "null".to_string(),
        primary_attribute_value_id: "77".to_string(),
        primary_attribute_value: "Signup Form".to_string(),
        attributes: r#"[{"name":"Source","value":"web"}]"#.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Begin,
    Prepare(usize),
    Insert(usize),
    Commit,
    Rollback,
}

#[derive(Default)]
struct StoreState {
    rows: Vec<BindingRow>,
    keys: HashSet<String>,
    logs: Vec<Vec<SessionEvent>>,
    commits: usize,
    opens: usize,
    fail_insert_on: Option<String>,
    fail_prepare_on: Option<usize>,
    fail_commit_on: Option<usize>,
    fail_open_on: Option<usize>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn configured(configure: impl FnOnce(&mut StoreState)) -> Self {
        let store = Self::new();
        configure(&mut *store.lock());
        store
    }

    /// A store that fails any insert batch containing `guid`.
    pub fn failing_on(guid: &str) -> Self {
        Self::configured(|state| state.fail_insert_on = Some(guid.to_string()))
    }

    /// A store that fails to prepare statements for exactly `rows` rows.
    pub fn failing_prepare(rows: usize) -> Self {
        Self::configured(|state| state.fail_prepare_on = Some(rows))
    }

    /// A store whose `nth` commit, counted from 1 across all sessions, fails.
    pub fn failing_commit(nth: usize) -> Self {
        Self::configured(|state| state.fail_commit_on = Some(nth))
    }

    /// A store that refuses its `nth` connection, counted from 1.
    pub fn failing_open(nth: usize) -> Self {
        Self::configured(|state| state.fail_open_on = Some(nth))
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens a new session with its own event log.
    pub fn session(&self) -> MemorySession {
        let mut state = self.lock();
        state.logs.push(Vec::new());
        MemorySession {
            store: self.clone(),
            index: state.logs.len() - 1,
            pending: Vec::new(),
            prepared: None,
        }
    }

    /// Durable rows, in commit order.
    pub fn committed(&self) -> Vec<BindingRow> {
        self.lock().rows.clone()
    }

    pub fn committed_guids(&self) -> Vec<String> {
        self.lock()
            .rows
            .iter()
            .filter_map(|row| row.marketo_guid.clone())
            .collect()
    }

    /// Event log of every session opened so far.
    pub fn logs(&self) -> Vec<Vec<SessionEvent>> {
        self.lock().logs.clone()
    }

    fn log(&self, index: usize, event: SessionEvent) {
        self.lock().logs[index].push(event);
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    type Session = MemorySession;

    async fn open(&self) -> Result<MemorySession, ConnectorError> {
        {
            let mut state = self.lock();
            state.opens += 1;
            if state.fail_open_on == Some(state.opens) {
                return Err(ConnectorError::InvalidUrl(format!(
                    "injected failure on connection {}",
                    state.opens
                )));
            }
        }
        Ok(self.session())
    }
}

pub struct MemorySession {
    store: MemoryStore,
    index: usize,
    pending: Vec<BindingRow>,
    prepared: Option<usize>,
}

#[async_trait]
impl InsertSession for MemorySession {
    async fn begin(&mut self) -> Result<(), DbError> {
        self.store.log(self.index, SessionEvent::Begin);
        self.pending.clear();
        Ok(())
    }

    async fn prepare(&mut self, rows: usize) -> Result<(), DbError> {
        self.store.log(self.index, SessionEvent::Prepare(rows));
        self.prepared = None;
        if self.store.lock().fail_prepare_on == Some(rows) {
            return Err(DbError::Write(format!("injected failure preparing {rows} rows")));
        }
        self.prepared = Some(rows);
        Ok(())
    }

    async fn insert(&mut self, rows: &[BindingRow]) -> Result<u64, DbError> {
        self.store.log(self.index, SessionEvent::Insert(rows.len()));

        let prepared = self.prepared.ok_or(DbError::NotPrepared)?;
        if prepared != rows.len() {
            return Err(DbError::BatchShape {
                prepared,
                rows: rows.len(),
            });
        }

        let state = self.store.lock();
        if let Some(guid) = &state.fail_insert_on
            && rows.iter().any(|r| r.marketo_guid.as_ref() == Some(guid))
        {
            return Err(DbError::Write(format!("injected failure on {guid}")));
        }

        let mut affected = 0;
        for row in rows {
            let duplicate = match &row.marketo_guid {
                Some(guid) => {
                    state.keys.contains(guid)
                        || self
                            .pending
                            .iter()
                            .any(|p| p.marketo_guid.as_ref() == Some(guid))
                }
                None => false,
            };
            if !duplicate {
                self.pending.push(row.clone());
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.store.log(self.index, SessionEvent::Commit);
        self.prepared = None;

        let mut state = self.store.lock();
        state.commits += 1;
        if state.fail_commit_on == Some(state.commits) {
            return Err(DbError::Write(format!(
                "injected failure on commit {}",
                state.commits
            )));
        }
        for row in self.pending.drain(..) {
            if let Some(guid) = &row.marketo_guid {
                state.keys.insert(guid.clone());
            }
            state.rows.push(row);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.store.log(self.index, SessionEvent::Rollback);
        self.prepared = None;
        self.pending.clear();
        Ok(())
    }
}

/// Number of rows inserted between consecutive commits of one session log.
pub fn inserts_per_commit(log: &[SessionEvent]) -> Vec<usize> {
    let mut windows = Vec::new();
    let mut rows = 0;
    for event in log {
        match event {
            SessionEvent::Insert(n) => rows += n,
            SessionEvent::Commit => {
                windows.push(rows);
                rows = 0;
            }
            _ => {}
        }
    }
    windows
}

/// Sizes of the insert batches in one session log.
pub fn batch_sizes(log: &[SessionEvent]) -> Vec<usize> {
    log.iter()
        .filter_map(|event| match event {
            SessionEvent::Insert(n) => Some(*n),
            _ => None,
        })
        .collect()
}
