// Persistent version store: one flat directory of delta and metadata
// files.
//
// Each tracked revision persists as a `<name>_v<N>.delta` operation
// stream plus a `<name>_v<N>.meta` fixed-size record.  Versions for a
// name form a contiguous range starting at 1.  Records are immutable
// once written; concurrent readers of written revisions are safe, and
// writers for the same name must be serialised by the caller.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::delta::Delta;
use crate::engine::{self, DeltaSource, EngineError};
use crate::wire::{self, MAX_NAME_LEN, Metadata, WireError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure in the storage layer.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying filesystem error.
    Io(io::Error),
    /// A persisted record failed to decode.
    Wire(WireError),
    /// Delta construction or chain reconstruction failed.
    Engine(EngineError),
    /// No such revision on disk.
    UnknownVersion { name: String, version: u32 },
    /// The name has no tracked revisions at all.
    NotTracked(String),
    /// Filename key exceeds the metadata field capacity.
    NameTooLong(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Wire(e) => write!(f, "{e}"),
            Self::Engine(e) => write!(f, "{e}"),
            Self::UnknownVersion { name, version } => {
                write!(f, "no version {version} tracked for '{name}'")
            }
            Self::NotTracked(name) => write!(f, "'{name}' is not tracked"),
            Self::NameTooLong(name) => write!(
                f,
                "filename '{name}' exceeds {MAX_NAME_LEN} bytes"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Wire(e) => Some(e),
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WireError> for StoreError {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}

impl From<EngineError> for StoreError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Advisory 32-bit additive byte-sum, rendered as 8 lowercase hex digits.
pub fn additive_checksum(data: &[u8]) -> String {
    let sum = data
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)));
    format!("{sum:08x}")
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Receipt returned by [`Store::track`].
#[derive(Debug, Clone)]
pub struct TrackOutcome {
    /// Version number assigned to the new revision.
    pub version: u32,
    /// Reference buffer length the delta was built against.
    pub original_size: u32,
    /// Embedded payload bytes persisted.
    pub delta_size: u32,
    /// Operations persisted.
    pub operation_count: u32,
}

/// One tracked name as reported by [`Store::list`].
#[derive(Debug, Clone)]
pub struct FileSummary {
    /// Original filename key.
    pub name: String,
    /// Number of tracked revisions.
    pub version_count: u32,
    /// Metadata of the newest revision.
    pub latest: Metadata,
}

/// A flat-directory delta store.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace path-hostile characters so any name maps into one flat
    /// directory.  Only `/`, `\` and `:` are transformed.
    fn sanitize(name: &str) -> String {
        name.chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                other => other,
            })
            .collect()
    }

    fn delta_path(&self, name: &str, version: u32) -> PathBuf {
        self.dir
            .join(format!("{}_v{version}.delta", Self::sanitize(name)))
    }

    fn meta_path(&self, name: &str, version: u32) -> PathBuf {
        self.dir
            .join(format!("{}_v{version}.meta", Self::sanitize(name)))
    }

    // -----------------------------------------------------------------
    // Version discovery
    // -----------------------------------------------------------------

    /// Sorted version numbers tracked for `name`.
    pub fn versions(&self, name: &str) -> Result<Vec<u32>, StoreError> {
        let prefix = format!("{}_v", Self::sanitize(name));
        let mut versions = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(rest) = file_name
                .strip_prefix(&prefix)
                .and_then(|r| r.strip_suffix(".meta"))
            else {
                continue;
            };
            if let Ok(version) = rest.parse::<u32>() {
                versions.push(version);
            }
        }

        versions.sort_unstable();
        Ok(versions)
    }

    /// Newest version for `name`, or an error if nothing is tracked.
    pub fn latest_version(&self, name: &str) -> Result<u32, StoreError> {
        self.versions(name)?
            .last()
            .copied()
            .ok_or_else(|| StoreError::NotTracked(name.to_string()))
    }

    // -----------------------------------------------------------------
    // Load / save
    // -----------------------------------------------------------------

    /// Load only the metadata record of one revision.
    pub fn metadata(&self, name: &str, version: u32) -> Result<Metadata, StoreError> {
        let meta_bytes = match std::fs::read(self.meta_path(name, version)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownVersion {
                    name: name.to_string(),
                    version,
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(wire::decode_metadata(&meta_bytes)?)
    }

    /// Load the metadata and delta persisted for one revision.
    pub fn load(&self, name: &str, version: u32) -> Result<(Metadata, Delta), StoreError> {
        let meta = self.metadata(name, version)?;
        let delta_bytes = std::fs::read(self.delta_path(name, version))?;
        let delta = wire::decode_delta(&delta_bytes, meta.operation_count, meta.original_size)?;
        Ok((meta, delta))
    }

    /// Persist one revision: the delta file first, then its metadata.
    ///
    /// If the metadata write fails the orphaned delta file is removed,
    /// so a revision is visible only once both files exist.
    pub fn save(&self, meta: &Metadata, delta: &Delta) -> Result<(), StoreError> {
        let delta_path = self.delta_path(&meta.filename, meta.version);
        std::fs::write(&delta_path, wire::encode_delta(delta))?;

        let meta_path = self.meta_path(&meta.filename, meta.version);
        if let Err(e) = std::fs::write(&meta_path, wire::encode_metadata(meta)) {
            let _ = std::fs::remove_file(&delta_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove both files of one revision.
    pub fn delete_version(&self, name: &str, version: u32) -> Result<(), StoreError> {
        let meta_path = self.meta_path(name, version);
        if !meta_path.exists() {
            return Err(StoreError::UnknownVersion {
                name: name.to_string(),
                version,
            });
        }
        std::fs::remove_file(&meta_path)?;
        std::fs::remove_file(self.delta_path(name, version))?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Tracking and reconstruction
    // -----------------------------------------------------------------

    /// Record `data` as the next revision of `name`.
    ///
    /// Reconstructs the current latest revision as the reference,
    /// builds the delta, and persists it with fresh metadata.  The
    /// message is truncated to the metadata field capacity on a
    /// character boundary.
    pub fn track(&self, name: &str, data: &[u8], message: &str) -> Result<TrackOutcome, StoreError> {
        if name.len() > MAX_NAME_LEN {
            return Err(StoreError::NameTooLong(name.to_string()));
        }

        let latest = self.versions(name)?.last().copied();
        let reference = match latest {
            Some(version) => self.reconstruct(name, version)?,
            None => Vec::new(),
        };

        let delta = engine::build_delta(&reference, data);
        let version = latest.unwrap_or(0) + 1;
        let meta = Metadata {
            filename: name.to_string(),
            version,
            original_size: delta.original_size(),
            delta_size: delta.delta_size(),
            operation_count: delta.operation_count(),
            timestamp: epoch_seconds(),
            checksum: additive_checksum(&reference),
            message: truncate_to_boundary(message, MAX_NAME_LEN).to_string(),
        };
        self.save(&meta, &delta)?;

        Ok(TrackOutcome {
            version,
            original_size: meta.original_size,
            delta_size: meta.delta_size,
            operation_count: meta.operation_count,
        })
    }

    /// Rebuild the bytes of revision `version` of `name`.
    pub fn reconstruct(&self, name: &str, version: u32) -> Result<Vec<u8>, StoreError> {
        engine::reconstruct(self, name, version).map_err(Into::into)
    }

    /// Reconstruct a revision and write it to `path`.
    pub fn restore_to(&self, name: &str, version: u32, path: &Path) -> Result<usize, StoreError> {
        let bytes = self.reconstruct(name, version)?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len())
    }

    /// Summaries of every tracked name, sorted by name.
    pub fn list(&self) -> Result<Vec<FileSummary>, StoreError> {
        let mut by_name: BTreeMap<String, (u32, Metadata)> = BTreeMap::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("meta") {
                continue;
            }
            let meta = wire::decode_metadata(&std::fs::read(&path)?)?;
            match by_name.get_mut(&meta.filename) {
                Some((count, latest)) => {
                    *count += 1;
                    if meta.version > latest.version {
                        *latest = meta;
                    }
                }
                None => {
                    by_name.insert(meta.filename.clone(), (1, meta));
                }
            }
        }

        Ok(by_name
            .into_iter()
            .map(|(name, (version_count, latest))| FileSummary {
                name,
                version_count,
                latest,
            })
            .collect())
    }
}

impl DeltaSource for Store {
    fn load_delta(
        &self,
        name: &str,
        version: u32,
    ) -> Result<Delta, Box<dyn std::error::Error + Send + Sync>> {
        let (_, delta) = self.load(name, version)?;
        Ok(delta)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate_to_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
