use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::Task;

pub const DEFAULT_STORAGE_KEY: &str = "tasks";

/// Durable home of the task collection.
///
/// `read` hands back the raw text stored under the adapter's key, `save`
/// replaces it with the full serialized snapshot.
pub trait TaskPersistence {
    fn read(&self) -> anyhow::Result<Option<String>>;

    fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()>;
}

/// File-backed key-value storage: one `<key>.json` file per key inside the
/// data directory.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub key: String,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, key: &str) -> anyhow::Result<Self> {
        validate_key(key)?;

        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(format!("{key}.json"));

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            key: key.to_string(),
            tasks_path,
        })
    }
}

impl TaskPersistence for DataStore {
    #[tracing::instrument(skip(self), fields(key = %self.key))]
    fn read(&self) -> anyhow::Result<Option<String>> {
        if !self.tasks_path.exists() {
            debug!(file = %self.tasks_path.display(), "no stored tasks yet");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.tasks_path)
            .with_context(|| format!("failed reading {}", self.tasks_path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, tasks), fields(key = %self.key))]
    fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let payload = encode_tasks(tasks)?;
        write_atomic(&self.tasks_path, &payload)
            .with_context(|| format!("failed to save {}", self.tasks_path.display()))
    }
}

/// In-memory stand-in for the on-disk store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    key: String,
    entries: HashMap<String, String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_key(DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            entries: HashMap::new(),
            saves: 0,
        }
    }

    /// Seeds the store with raw text, as if an earlier session had written it.
    pub fn with_raw(raw: &str) -> Self {
        let mut store = Self::new();
        store.entries.insert(store.key.clone(), raw.to_string());
        store
    }

    pub fn raw(&self) -> Option<&str> {
        self.entries.get(&self.key).map(String::as_str)
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPersistence for MemoryStore {
    fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(self.raw().map(ToString::to_string))
    }

    fn save(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let payload = encode_tasks(tasks)?;
        self.entries.insert(self.key.clone(), payload);
        self.saves += 1;
        Ok(())
    }
}

pub fn encode_tasks(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string(tasks).context("failed to serialize tasks")
}

/// Parses a stored snapshot. Later entries reusing an id already seen are
/// dropped so the collection keeps unique ids.
#[tracing::instrument(skip(raw))]
pub fn decode_tasks(raw: &str) -> anyhow::Result<Vec<Task>> {
    let parsed: Vec<Task> =
        serde_json::from_str(raw.trim()).context("failed parsing stored tasks")?;

    let mut seen = HashSet::with_capacity(parsed.len());
    let mut out = Vec::with_capacity(parsed.len());
    for task in parsed {
        if !seen.insert(task.id) {
            warn!(id = %task.id, "dropping stored task with duplicate id");
            continue;
        }
        out.push(task);
    }

    debug!(count = out.len(), "decoded stored tasks");
    Ok(out)
}

fn validate_key(key: &str) -> anyhow::Result<()> {
    if key.trim().is_empty() {
        return Err(anyhow!("storage key cannot be empty"));
    }
    if key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(anyhow!("storage key must be a plain name, got: {key}"));
    }
    Ok(())
}

fn write_atomic(path: &Path, payload: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = payload.len(), "saving atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(payload.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
