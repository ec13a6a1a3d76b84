//! JSON files next to the source document.
//!
//! For a document `dir/guide.md` the store keeps:
//!
//! | File                       | Content                               |
//! |----------------------------|---------------------------------------|
//! | `dir/guide.json`           | key -> paragraph map                  |
//! | `dir/guide.usedKeys.json`  | sorted array of every key ever used   |
//! | `dir/guide.json.old`       | the map as it was before the last run |
//!
//! A missing map means "no history"; a missing key list means "no keys
//! retained beyond those in the map".

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{DocumentId, SnapshotStore};
use crate::algo::TextDiffer;
use crate::error::{ReconcileError, ReconcileResult};
use crate::reconcile::{Change, ChangeCounts, Reconciler};
use crate::snapshot::{DocumentState, RetainedKeys, Snapshot};

/// File store rooted at a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the key -> paragraph map.
    pub fn snapshot_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Path of the retained key list.
    pub fn retained_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.usedKeys.json"))
    }

    /// Path of the previous map's backup.
    pub fn backup_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.json.old"))
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self, id: &DocumentId) -> ReconcileResult<Option<DocumentState>> {
        let Some(snapshot) = read_json::<Snapshot>(&self.snapshot_path(id))? else {
            return Ok(None);
        };
        let retained = read_json::<RetainedKeys>(&self.retained_path(id))?.unwrap_or_default();
        Ok(Some(DocumentState::new(snapshot, retained)))
    }

    fn save(&self, id: &DocumentId, state: &DocumentState) -> ReconcileResult<()> {
        let snapshot_path = self.snapshot_path(id);
        let retained_path = self.retained_path(id);
        let snapshot = to_json(&snapshot_path, &state.snapshot)?;
        let retained = to_json(&retained_path, &state.retained)?;

        match fs::copy(&snapshot_path, self.backup_path(id)) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(ReconcileError::io(&snapshot_path, err)),
        }

        // Key list first: a map is never left beside a list missing its keys
        replace_all(&[(retained_path, retained), (snapshot_path, snapshot)])
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ReconcileResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ReconcileError::io(path, err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| ReconcileError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn to_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ReconcileResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| ReconcileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write every file to a temp sibling, then rename them into place.
///
/// Nothing is replaced unless all temp files were written. Leftover temp
/// files are removed on failure.
fn replace_all(files: &[(PathBuf, Vec<u8>)]) -> ReconcileResult<()> {
    let temps: Vec<PathBuf> = files.iter().map(|(path, _)| temp_path(path)).collect();
    let result = stage_and_rename(files, &temps);
    if result.is_err() {
        for temp in &temps {
            let _ = fs::remove_file(temp);
        }
    }
    result
}

fn stage_and_rename(files: &[(PathBuf, Vec<u8>)], temps: &[PathBuf]) -> ReconcileResult<()> {
    for ((_, bytes), temp) in files.iter().zip(temps) {
        fs::write(temp, bytes).map_err(|err| ReconcileError::io(temp, err))?;
    }
    for ((path, _), temp) in files.iter().zip(temps) {
        fs::rename(temp, path).map_err(|err| ReconcileError::io(path, err))?;
    }
    Ok(())
}

// =============================================================================
// File update
// =============================================================================

/// Reconcile a text file with the JSON files stored beside it.
///
/// The namespace (and document id) is the file name without extension.
/// Every change is logged at `info` level and returned.
pub fn update_file<D: TextDiffer>(path: &Path, reconciler: &Reconciler<D>) -> ReconcileResult<Vec<Change>> {
    let text = fs::read_to_string(path).map_err(|err| ReconcileError::io(path, err))?;
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(DocumentId::new)
        .ok_or_else(|| ReconcileError::io(path, ErrorKind::InvalidInput.into()))?;
    let store = JsonFileStore::new(path.parent().unwrap_or(Path::new("")));

    let mut log = Vec::new();
    super::update(&store, reconciler, &id, &text, &mut log)?;

    for change in &log {
        tracing::info!(document = %id, "{change}");
    }
    let counts: ChangeCounts = log.iter().collect();
    tracing::debug!(
        document = %id,
        added = counts.added,
        removed = counts.removed,
        changed = counts.changed,
        "updated paragraph keys"
    );
    Ok(log)
}

/// Run [`update_file`] over many files, in parallel with the `parallel`
/// feature. Results are in input order.
pub fn update_files<D, P>(paths: &[P], reconciler: &Reconciler<D>) -> Vec<ReconcileResult<Vec<Change>>>
where
    D: TextDiffer + Sync,
    P: AsRef<Path> + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        paths.par_iter().map(|p| update_file(p.as_ref(), reconciler)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        paths.iter().map(|p| update_file(p.as_ref(), reconciler)).collect()
    }
}
