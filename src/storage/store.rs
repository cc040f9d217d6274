//! File-backed collections.
//!
//! Each collection is one JSON file holding `{"items":[…],"next_id":N}`,
//! guarded by its own lock. Writes are crash-atomic: the table is
//! serialized to a sibling temporary file and renamed over the original;
//! a failed rename unlinks the temporary file and leaves the previous
//! file intact.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory table plus the id counter persisted alongside it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Table<T> {
    pub items: Vec<T>,
    pub next_id: u64,
}

impl<T> Table<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Hand out the next id and advance the counter.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// One collection file behind one lock.
pub struct JsonStore<T> {
    path: PathBuf,
    table: Mutex<Table<T>>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send,
{
    /// Load the collection from `path`, starting empty if the file does not
    /// exist yet.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::empty(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Read under the lock: copy out what you need, then release.
    pub async fn read<R>(&self, f: impl FnOnce(&Table<T>) -> R) -> R {
        let table = self.table.lock().await;
        f(&table)
    }

    /// Mutate under the lock and persist. If `f` reports no change the file
    /// is left untouched.
    pub async fn write<R>(
        &self,
        f: impl FnOnce(&mut Table<T>) -> (bool, R),
    ) -> Result<R, StoreError> {
        let mut table = self.table.lock().await;
        let (changed, result) = f(&mut table);
        if changed {
            self.persist(&table).await?;
        }
        Ok(result)
    }

    async fn persist(&self, table: &Table<T>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(table)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(rename_err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(rename_err.into());
        }
        Ok(())
    }
}
