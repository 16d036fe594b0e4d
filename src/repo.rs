use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::model::Snapshot;

#[derive(Debug, Clone)]
pub enum RepoError {
    Io(String),
    Corrupt(&'static str),
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoError::Io(e) => write!(f, "snapshot io error: {e}"),
            RepoError::Corrupt(what) => write!(f, "snapshot corrupt: {what}"),
        }
    }
}

impl std::error::Error for RepoError {}

impl From<io::Error> for RepoError {
    fn from(e: io::Error) -> Self {
        RepoError::Io(e.to_string())
    }
}

/// Storage seam for the engine. The in-memory impl backs tests; the file
/// impl is the production store. The durable format is the documented
/// `Snapshot` shape, serialized as JSON.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn load(&self) -> Result<Option<Snapshot>, RepoError>;
    async fn store(&self, snapshot: &Snapshot) -> Result<(), RepoError>;
}

// ── File-backed repository ───────────────────────────────────────

/// Single-file snapshot store.
///
/// On-disk format: `[u32: len][JSON: Snapshot][u32: crc32]`
/// - `len` is the byte length of the JSON payload (not including the CRC).
/// - The CRC covers the payload only; a mismatch rejects the whole snapshot.
/// - Writes go to a temp file, fsync, then rename over the live file, so a
///   crash mid-write leaves the previous snapshot intact.
pub struct FileRepository {
    path: PathBuf,
}

impl FileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, RepoError> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut len_buf = [0u8; 4];
        if let Err(e) = file.read_exact(&mut len_buf) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return Err(RepoError::Corrupt("truncated length prefix"));
            }
            return Err(e.into());
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        if let Err(e) = file.read_exact(&mut payload) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return Err(RepoError::Corrupt("truncated payload"));
            }
            return Err(e.into());
        }

        let mut crc_buf = [0u8; 4];
        if let Err(e) = file.read_exact(&mut crc_buf) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return Err(RepoError::Corrupt("truncated crc"));
            }
            return Err(e.into());
        }
        if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
            return Err(RepoError::Corrupt("crc mismatch"));
        }

        let snapshot = serde_json::from_slice(&payload)
            .map_err(|_| RepoError::Corrupt("undecodable payload"))?;
        Ok(Some(snapshot))
    }

    fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), RepoError> {
        let payload = serde_json::to_vec(snapshot)
            .map_err(|e| RepoError::Io(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let tmp_path = path.with_extension("snap.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&(payload.len() as u32).to_le_bytes())?;
        file.write_all(&payload)?;
        file.write_all(&crc.to_le_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        metrics::histogram!(crate::observability::SNAPSHOT_BYTES).record(payload.len() as f64);
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepository for FileRepository {
    async fn load(&self) -> Result<Option<Snapshot>, RepoError> {
        Self::read_snapshot(&self.path)
    }

    async fn store(&self, snapshot: &Snapshot) -> Result<(), RepoError> {
        Self::write_snapshot(&self.path, snapshot)
    }
}

// ── In-memory repository ─────────────────────────────────────────

/// Test store. Clones share the same backing cell, so a test can hand one
/// handle to the engine and inspect the other.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<Mutex<Option<Snapshot>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last stored snapshot, if any.
    pub fn last(&self) -> Option<Snapshot> {
        self.inner.lock().expect("repository mutex poisoned").clone()
    }
}

#[async_trait]
impl SnapshotRepository for MemoryRepository {
    async fn load(&self) -> Result<Option<Snapshot>, RepoError> {
        Ok(self.last())
    }

    async fn store(&self, snapshot: &Snapshot) -> Result<(), RepoError> {
        *self.inner.lock().expect("repository mutex poisoned") = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("lessonbook_test_repo");
        fs::create_dir_all(&dir).unwrap();
        dir.join(format!("{name}_{}.snap", Ulid::new()))
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            bookings: vec![Booking {
                id: Ulid::new(),
                learner_id: Ulid::new(),
                tutor_id: Ulid::new(),
                subject: "Physique".into(),
                start_time: 1000,
                end_time: 2000,
                status: BookingStatus::Confirmed,
                price: 50,
                review_given: false,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn store_and_load() {
        let path = tmp_path("store_and_load");
        let repo = FileRepository::new(&path);
        let snapshot = sample_snapshot();
        repo.store(&snapshot).await.unwrap();
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, Some(snapshot));
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn load_missing_file() {
        let repo = FileRepository::new(tmp_path("missing"));
        assert_eq!(repo.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_overwrites() {
        let path = tmp_path("overwrite");
        let repo = FileRepository::new(&path);
        repo.store(&sample_snapshot()).await.unwrap();
        let second = sample_snapshot();
        repo.store(&second).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), Some(second));
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_crc_rejected() {
        let path = tmp_path("corrupt_crc");
        let repo = FileRepository::new(&path);
        repo.store(&sample_snapshot()).await.unwrap();

        // Flip a payload byte past the length prefix.
        let mut bytes = fs::read(&path).unwrap();
        bytes[10] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        match repo.load().await {
            Err(RepoError::Corrupt(_)) => {}
            other => panic!("expected corrupt error, got {other:?}"),
        }
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn truncated_file_rejected() {
        let path = tmp_path("truncated");
        let repo = FileRepository::new(&path);
        repo.store(&sample_snapshot()).await.unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        match repo.load().await {
            Err(RepoError::Corrupt(_)) => {}
            other => panic!("expected corrupt error, got {other:?}"),
        }
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn memory_repo_shares_state_across_clones() {
        let repo = MemoryRepository::new();
        let handle = repo.clone();
        repo.store(&sample_snapshot()).await.unwrap();
        assert!(handle.last().is_some());
        assert_eq!(handle.load().await.unwrap(), repo.last());
    }
}
