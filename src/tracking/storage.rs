//! Result store backends
//!
//! Provides the `ResultStore` trait, an in-memory store and a JSON
//! file-based store writing one `{name}.json` document per run.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::validation::PipeResult;

/// Trait for result persistence backends
///
/// Implementations must tolerate concurrent saves from several outer-fold
/// workers.
pub trait ResultStore: Send + Sync + fmt::Debug {
    /// Save (or replace) the result stored under `result.name`
    fn save(&self, result: &PipeResult) -> Result<()>;

    /// Load a result by run name
    fn load(&self, name: &str) -> Result<PipeResult>;

    /// Names of all stored runs, sorted
    fn list(&self) -> Result<Vec<String>>;

    /// Delete a stored run
    fn delete(&self, name: &str) -> Result<()>;
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(Error::Storage(format!("invalid run name '{name}'")));
    }
    Ok(())
}

/// JSON file-based result store
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never observes a partially written document.
///
/// # Example
///
/// ```no_run
/// use afinar::tracking::{JsonFileStore, ResultStore};
///
/// let store = JsonFileStore::new("/tmp/afinar-runs");
/// let names = store.list().expect("directory should be readable");
/// ```
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl JsonFileStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn result_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl ResultStore for JsonFileStore {
    fn save(&self, result: &PipeResult) -> Result<()> {
        check_name(&result.name)?;
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(result)?;
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(".{}.{}.{n}.tmp", result.name, std::process::id()));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.result_path(&result.name))?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<PipeResult> {
        check_name(name)?;
        let path = self.result_path(name);
        if !path.exists() {
            return Err(Error::NotFound(format!("stored run '{name}'")));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let path = self.result_path(name);
        if !path.exists() {
            return Err(Error::NotFound(format!("stored run '{name}'")));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

/// In-memory result store for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryStore {
    results: Mutex<BTreeMap<String, PipeResult>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_results<R>(&self, f: impl FnOnce(&mut BTreeMap<String, PipeResult>) -> R) -> R {
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut results)
    }
}

impl ResultStore for InMemoryStore {
    fn save(&self, result: &PipeResult) -> Result<()> {
        self.with_results(|r| {
            r.insert(result.name.clone(), result.clone());
        });
        Ok(())
    }

    fn load(&self, name: &str) -> Result<PipeResult> {
        self.with_results(|r| r.get(name).cloned())
            .ok_or_else(|| Error::NotFound(format!("stored run '{name}'")))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.with_results(|r| r.keys().cloned().collect()))
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.with_results(|r| r.remove(name))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("stored run '{name}'")))
    }
}
