use crate::{
    api::{Store, Transaction},
    error::{Load, Parse, Persist, SerialiseValue},
    Error,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use snafu::ResultExt;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A transactional key-value store kept in memory and optionally persisted to a json file.
#[derive(Clone, Debug, Default)]
pub struct LocalStore {
    inner: Arc<LocalStoreInner>,
}

#[derive(Debug, Default)]
struct LocalStoreInner {
    kv: RwLock<BTreeMap<String, Value>>,
    /// Serialises the read-write transactions.
    writer: Mutex<()>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// A new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
    /// Open the store persisted at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let kv = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).context(Parse {
                path: path.display().to_string(),
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                return Err(error).context(Load {
                    path: path.display().to_string(),
                })
            }
        };
        tracing::debug!(path=%path.display(), entries=kv.len(), "Opened the local store");
        Ok(Self {
            inner: Arc::new(LocalStoreInner {
                kv: RwLock::new(kv),
                writer: Mutex::new(()),
                path: Some(path),
            }),
        })
    }
    /// Number of entries currently committed.
    pub fn len(&self) -> usize {
        self.inner.kv.read().len()
    }
    /// Whether the store has no committed entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, kv: &BTreeMap<String, Value>) -> Result<(), Error> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        let persist = Persist {
            path: path.display().to_string(),
        };
        let bytes = serde_json::to_vec_pretty(kv).context(SerialiseValue)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(persist.clone())?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes).context(persist.clone())?;
        std::fs::rename(&tmp, path).context(persist)
    }
}

impl Store for LocalStore {
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, E>,
        E: From<Error>,
    {
        let kv = self.inner.kv.read();
        f(&Transaction::read_only(&kv))
    }

    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R, E>,
        E: From<Error>,
    {
        let _writer = self.inner.writer.lock();
        let (result, writes) = {
            let kv = self.inner.kv.read();
            let mut txn = Transaction::read_write(&kv);
            let result = f(&mut txn)?;
            (result, txn.into_writes())
        };
        if writes.is_empty() {
            return Ok(result);
        }
        let mut next = self.inner.kv.read().clone();
        for (key, value) in writes {
            match value {
                Some(value) => next.insert(key, value),
                None => next.remove(&key),
            };
        }
        self.persist(&next)?;
        *self.inner.kv.write() = next;
        Ok(result)
    }
}
