use crate::adapters::memory::limit_lead_key;
use crate::domain::model::{
    CounterKey, LeadInsert, LeadRecord, LeadStatus, NewLead, Period, Tool, UsageCounter,
};
use crate::domain::ports::{LeadStore, UsageStore};
use crate::utils::error::{QuotaError, Result};
use async_trait::async_trait;
use chrono::Utc;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Marks the one lead that a quota wall created for a (user, tool) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LimitLeadRef {
    user_id: String,
    tool: Tool,
    lead_id: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument {
    #[serde(default)]
    counters: Vec<UsageCounter>,
    #[serde(default)]
    leads: Vec<LeadRecord>,
    #[serde(default)]
    limit_leads: Vec<LimitLeadRef>,
    #[serde(default)]
    next_lead_id: u64,
}

impl StoreDocument {
    fn counter_mut(&mut self, key: &CounterKey) -> Option<&mut UsageCounter> {
        self.counters.iter_mut().find(|c| {
            c.user_id == key.user_id && c.tool == key.tool && c.period == key.period
        })
    }

    fn limit_lead(&self, user_id: &str, tool: Tool) -> Option<&LeadRecord> {
        let lead_ref = self
            .limit_leads
            .iter()
            .find(|r| r.user_id == user_id && r.tool == tool)?;
        self.leads.iter().find(|lead| lead.id == lead_ref.lead_id)
    }

    fn push_lead(&mut self, lead: NewLead) -> LeadRecord {
        self.next_lead_id += 1;
        let record = LeadRecord::from_new(self.next_lead_id, lead, Utc::now());
        self.leads.push(record.clone());
        record
    }
}

enum Update<T> {
    Changed(T),
    Unchanged(T),
}

/// Counters and leads kept in one JSON document on disk.
///
/// Every operation takes an advisory lock on `<file>.lock` and runs its whole
/// read-modify-write on the blocking pool, so handles in different tasks or
/// processes never interleave. A caller that stops waiting does not cancel
/// the operation; it still completes under the lock. The document is
/// replaced by renaming a uniquely named temp file over it.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn open_lock_file(&self, operation: &str) -> Result<File> {
        let io_error = |e: std::io::Error| {
            QuotaError::storage(
                operation,
                format!("cannot open lock {}: {}", self.lock_path.display(), e),
            )
        };
        std::fs::create_dir_all(self.parent_dir()).map_err(io_error)?;
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(io_error)
    }

    fn read_document(&self, operation: &str) -> Result<StoreDocument> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(StoreDocument::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                QuotaError::storage(
                    operation,
                    format!("corrupt store file {}: {}", self.path.display(), e),
                )
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(QuotaError::storage(
                operation,
                format!("cannot read {}: {}", self.path.display(), e),
            )),
        }
    }

    fn write_document(&self, operation: &str, document: &StoreDocument) -> Result<()> {
        let io_error = |e: std::io::Error| {
            QuotaError::storage(operation, format!("cannot write {}: {}", self.path.display(), e))
        };

        let data = serde_json::to_vec_pretty(document)
            .map_err(|e| QuotaError::storage(operation, e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(self.parent_dir()).map_err(io_error)?;
        tmp.write_all(&data).map_err(io_error)?;
        tmp.as_file().sync_all().map_err(io_error)?;
        tmp.persist(&self.path).map_err(|e| io_error(e.error))?;
        tracing::debug!("Persisted store to {}", self.path.display());
        Ok(())
    }

    async fn run_blocking<T, F>(operation: &'static str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| QuotaError::storage(operation, format!("store task failed: {}", e)))?
    }

    /// Reads the document under a shared lock.
    async fn read<T, F>(&self, operation: &'static str, view: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(StoreDocument) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        Self::run_blocking(operation, move || {
            let lock = RwLock::new(store.open_lock_file(operation)?);
            let _guard = lock
                .read()
                .map_err(|e| QuotaError::storage(operation, format!("cannot lock store: {}", e)))?;
            view(store.read_document(operation)?)
        })
        .await
    }

    /// Read-modify-write under an exclusive lock. The file is rewritten only
    /// when `change` reports `Update::Changed`.
    async fn update<T, F>(&self, operation: &'static str, change: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreDocument) -> Result<Update<T>> + Send + 'static,
    {
        let store = self.clone();
        Self::run_blocking(operation, move || {
            let mut lock = RwLock::new(store.open_lock_file(operation)?);
            let _guard = lock
                .write()
                .map_err(|e| QuotaError::storage(operation, format!("cannot lock store: {}", e)))?;
            let mut document = store.read_document(operation)?;
            match change(&mut document)? {
                Update::Changed(value) => {
                    store.write_document(operation, &document)?;
                    Ok(value)
                }
                Update::Unchanged(value) => Ok(value),
            }
        })
        .await
    }
}

#[async_trait]
impl UsageStore for JsonFileStore {
    async fn load(&self, key: &CounterKey) -> Result<Option<u64>> {
        let key = key.clone();
        self.read("load usage", move |mut document| {
            Ok(document.counter_mut(&key).map(|c| c.count))
        })
        .await
    }

    async fn increment(&self, key: &CounterKey) -> Result<u64> {
        let key = key.clone();
        self.update("increment usage", move |document| {
            let count = match document.counter_mut(&key) {
                Some(counter) => {
                    counter.count += 1;
                    counter.count
                }
                None => {
                    document.counters.push(UsageCounter {
                        user_id: key.user_id.clone(),
                        tool: key.tool,
                        period: key.period,
                        count: 1,
                    });
                    1
                }
            };
            Ok(Update::Changed(count))
        })
        .await
    }

    async fn counters(&self, period: &Period) -> Result<Vec<UsageCounter>> {
        let period = *period;
        self.read("list usage", move |document| {
            Ok(document
                .counters
                .into_iter()
                .filter(|c| c.period == period)
                .collect())
        })
        .await
    }

    async fn counters_for_user(&self, user_id: &str, period: &Period) -> Result<Vec<UsageCounter>> {
        let user_id = user_id.to_string();
        let period = *period;
        self.read("list usage", move |document| {
            Ok(document
                .counters
                .into_iter()
                .filter(|c| c.period == period && c.user_id == user_id)
                .collect())
        })
        .await
    }
}

#[async_trait]
impl LeadStore for JsonFileStore {
    async fn find_limit_lead(&self, user_id: &str, tool: Tool) -> Result<Option<LeadRecord>> {
        let user_id = user_id.to_string();
        self.read("find lead", move |document| {
            Ok(document.limit_lead(&user_id, tool).cloned())
        })
        .await
    }

    async fn insert_limit_lead(&self, lead: NewLead) -> Result<LeadInsert> {
        let (user_id, tool) = limit_lead_key(&lead)?;
        self.update("create lead", move |document| {
            if let Some(existing) = document.limit_lead(&user_id, tool) {
                return Ok(Update::Unchanged(LeadInsert::Existing(existing.clone())));
            }
            let record = document.push_lead(lead);
            document.limit_leads.push(LimitLeadRef {
                user_id,
                tool,
                lead_id: record.id,
            });
            Ok(Update::Changed(LeadInsert::Inserted(record)))
        })
        .await
    }

    async fn insert(&self, lead: NewLead) -> Result<LeadRecord> {
        self.update("create lead", move |document| {
            Ok(Update::Changed(document.push_lead(lead)))
        })
        .await
    }

    async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<LeadRecord>> {
        self.read("list leads", move |document| {
            Ok(document
                .leads
                .into_iter()
                .rev()
                .filter(|lead| status.map_or(true, |s| lead.status == s))
                .collect())
        })
        .await
    }

    async fn set_status(&self, id: u64, status: LeadStatus) -> Result<LeadRecord> {
        self.update("update lead", move |document| {
            let lead = document
                .leads
                .iter_mut()
                .find(|lead| lead.id == id)
                .ok_or(QuotaError::LeadNotFound { id })?;
            lead.status = status;
            Ok(Update::Changed(lead.clone()))
        })
        .await
    }
}
