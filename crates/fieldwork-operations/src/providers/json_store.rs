use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use fieldwork_core::{Collect, CollectId, NewCollect, Target};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::error::OperationError;
use crate::traits::CollectStore;

const COLLECTS_SUBDIR: &str = "collects";
const COUNTER_FILENAME: &str = "next-id";

/// Everything stored for one collect.
#[derive(Debug, Serialize, Deserialize)]
struct CollectRecord {
    collect: Collect,
    #[serde(default)]
    targets: Vec<Target>,
}

/// Stores each collect with its targets in one pretty-printed JSON file.
pub struct JsonCollectStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCollectStore {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn collects_dir(&self) -> PathBuf {
        self.root.join(COLLECTS_SUBDIR)
    }

    fn record_path(&self, id: CollectId) -> PathBuf {
        self.collects_dir().join(format!("{id}.json"))
    }

    fn read_record(&self, id: CollectId) -> Result<Option<CollectRecord>> {
        read_record_file(&self.record_path(id))
    }

    fn write_record(&self, record: &CollectRecord) -> Result<()> {
        let path = self.record_path(record.collect.id);
        let content = serde_json::to_string_pretty(record)?;
        write_file(&path, content.as_bytes())
    }

    fn require_record(&self, id: CollectId) -> Result<CollectRecord> {
        self.read_record(id)?
            .ok_or(OperationError::CollectNotFound(id))
    }

    fn all_records(&self) -> Result<Vec<CollectRecord>> {
        let dir = self.collects_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(OperationError::StoreRead { path: dir, source }),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| OperationError::StoreRead {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(record) = read_record_file(&path)? {
                records.push(record);
            }
        }
        records.sort_by_key(|record| record.collect.id);
        Ok(records)
    }

    fn counter_path(&self) -> PathBuf {
        self.root.join(COUNTER_FILENAME)
    }

    fn next_id(&self) -> Result<CollectId> {
        let path = self.counter_path();
        match fs::read_to_string(&path) {
            Ok(content) => content
                .trim()
                .parse::<u64>()
                .map(CollectId)
                .map_err(|_| OperationError::InvalidCounter {
                    path,
                    content: content.trim().to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CollectId(1)),
            Err(source) => Err(OperationError::StoreRead { path, source }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_record_file(path: &Path) -> Result<Option<CollectRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(OperationError::StoreRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| OperationError::StoreParse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| OperationError::StoreWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| OperationError::StoreWrite {
        path: path.to_path_buf(),
        source,
    })
}

impl CollectStore for JsonCollectStore {
    fn create_collect(&self, new: &NewCollect) -> Result<Collect> {
        let _lock = self.lock();
        let id = self.next_id()?;
        if self.record_path(id).exists() {
            return Err(OperationError::CollectExists(id));
        }
        let collect = Collect::new(id, new, Utc::now());
        self.write_record(&CollectRecord {
            collect: collect.clone(),
            targets: Vec::new(),
        })?;
        write_file(&self.counter_path(), (id.0 + 1).to_string().as_bytes())?;
        debug!(collect = %collect.id, "collect record written");
        Ok(collect)
    }

    fn load_collect(&self, id: CollectId) -> Result<Option<Collect>> {
        Ok(self.read_record(id)?.map(|record| record.collect))
    }

    fn save_collect(&self, collect: &Collect) -> Result<()> {
        let _lock = self.lock();
        let mut record = self.require_record(collect.id)?;
        record.collect = collect.clone();
        self.write_record(&record)
    }

    fn delete_collect(&self, id: CollectId) -> Result<()> {
        let _lock = self.lock();
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OperationError::StoreWrite { path, source }),
        }
    }

    fn list_collects(&self) -> Result<Vec<Collect>> {
        Ok(self
            .all_records()?
            .into_iter()
            .map(|record| record.collect)
            .collect())
    }

    fn targets(&self, collect: CollectId) -> Result<Vec<Target>> {
        Ok(self
            .read_record(collect)?
            .map(|record| record.targets)
            .unwrap_or_default())
    }

    fn create_target(&self, target: &Target) -> Result<()> {
        let _lock = self.lock();
        let mut record = self.require_record(target.collect)?;
        record.targets.push(target.clone());
        self.write_record(&record)
    }

    fn save_target(&self, target: &Target) -> Result<()> {
        let _lock = self.lock();
        let mut record = self.require_record(target.collect)?;
        let slot = record
            .targets
            .iter_mut()
            .find(|known| known.identifier == target.identifier)
            .ok_or_else(|| fieldwork_core::CoreError::UnknownTarget(target.identifier.clone()))?;
        *slot = target.clone();
        self.write_record(&record)
    }

    fn delete_targets(&self, collect: CollectId) -> Result<()> {
        let _lock = self.lock();
        match self.read_record(collect)? {
            Some(mut record) => {
                record.targets.clear();
                self.write_record(&record)
            }
            None => Ok(()),
        }
    }

    fn target_exists(&self, identifier: &str) -> Result<bool> {
        Ok(self
            .all_records()?
            .iter()
            .flat_map(|record| &record.targets)
            .any(|target| target.identifier == identifier))
    }
}
