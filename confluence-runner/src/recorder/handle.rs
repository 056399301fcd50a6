//! Shared, lock-guarded append handles. One handle per normalized path, so
//! every writer of a file serializes on the same mutex.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use confluence_core::domain::RecordError;

/// Hands out one `SinkHandle` per file.
#[derive(Debug, Default)]
pub struct SinkRegistry {
    handles: Mutex<HashMap<PathBuf, Arc<SinkHandle>>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle for `path`, created on first request. Spellings of the same
    /// path (relative, `./`, `..`) share a handle.
    pub fn handle(&self, path: impl AsRef<Path>) -> Arc<SinkHandle> {
        let key = normalize(path.as_ref());
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles
            .entry(key.clone())
            .or_insert_with(|| Arc::new(SinkHandle::new(key)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct HandleState {
    /// Parent directory exists.
    prepared: bool,
    appended: u64,
}

/// Append-only access to one file.
///
/// The lock is held for "prepare if needed + header if empty + one write +
/// flush"; a record is never split across writes.
#[derive(Debug)]
pub struct SinkHandle {
    path: PathBuf,
    state: Mutex<HandleState>,
}

impl SinkHandle {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(HandleState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle.
    pub fn appended(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .appended
    }

    /// Create the parent directory and write `header` if the file is new or
    /// empty. Idempotent.
    pub fn initialize(&self, header: Option<&[u8]>) -> Result<(), RecordError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_locked(&mut state, header, None)
    }

    /// Append one encoded record, preceded by `header` if the file is empty.
    pub fn append(&self, header: Option<&[u8]>, record: &[u8]) -> Result<(), RecordError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_locked(&mut state, header, Some(record))?;
        state.appended += 1;
        Ok(())
    }

    fn write_locked(
        &self,
        state: &mut HandleState,
        header: Option<&[u8]>,
        record: Option<&[u8]>,
    ) -> Result<(), RecordError> {
        let io_err = |source: io::Error| RecordError::Io {
            path: self.path.clone(),
            source,
        };

        if !state.prepared {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            state.prepared = true;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let empty = file.metadata().map_err(io_err)?.len() == 0;

        let mut buffer = Vec::new();
        if let (true, Some(header)) = (empty, header) {
            buffer.extend_from_slice(header);
        }
        if let Some(record) = record {
            buffer.extend_from_slice(record);
        }
        if buffer.is_empty() {
            return Ok(());
        }
        file.write_all(&buffer).map_err(io_err)?;
        file.flush().map_err(io_err)
    }
}

/// Absolute, lexically cleaned path. Existing parents are canonicalized so
/// symlinked spellings collapse too.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }

    match (cleaned.parent(), cleaned.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(cleaned),
        _ => cleaned,
    }
}
