//! Artifact file formats.
//!
//! # Binary layout
//!
//! ```text
//! [MAGIC: 4 bytes][format version: u16 LE][crc32 of payload: u32 LE][postcard payload]
//! ```
//!
//! # JSON layout
//!
//! `{"format_version": N, "artifact": {...}}`, pretty-printed.
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the target, so readers see either the old file or the new
//! one and a failed write leaves nothing behind. [`StagedWrite`] splits the
//! two steps so several files can be staged before any of them is published.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use super::artifact::Artifact;
use super::error::ArtifactError;
use super::schema::{ArtifactModelSchema, JsonEnvelope};

/// Leading bytes of a binary artifact.
pub const MAGIC: [u8; 4] = *b"CRSK";

/// Current artifact format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4;

/// True if `path` selects the JSON format.
pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn encode(artifact: &Artifact, path: &Path) -> Result<Vec<u8>, ArtifactError> {
    if is_json_path(path) {
        Ok(to_json(artifact)?.into_bytes())
    } else {
        to_bytes(artifact)
    }
}

pub(crate) fn save(artifact: &Artifact, path: &Path) -> Result<(), ArtifactError> {
    let bytes = encode(artifact, path)?;
    write_atomic(path, &bytes)?;
    tracing::info!(
        path = %path.display(),
        model_id = artifact.model_id(),
        bytes = bytes.len(),
        "wrote artifact"
    );
    Ok(())
}

pub(crate) fn stage_artifact(artifact: &Artifact, path: &Path) -> Result<StagedWrite, ArtifactError> {
    stage(path, &encode(artifact, path)?)
}

pub(crate) fn load(path: &Path) -> Result<Artifact, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| ArtifactError::io(path, e))?;
    let artifact = if is_json_path(path) {
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| ArtifactError::corrupt(format!("not UTF-8: {e}")))?;
        from_json(text)?
    } else {
        from_bytes(&bytes)?
    };
    tracing::info!(
        path = %path.display(),
        model_id = artifact.model_id(),
        n_features = artifact.n_features(),
        "loaded artifact"
    );
    Ok(artifact)
}

pub(crate) fn to_bytes(artifact: &Artifact) -> Result<Vec<u8>, ArtifactError> {
    let payload = postcard::to_allocvec(&ArtifactModelSchema::from(artifact))
        .map_err(|e| ArtifactError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Artifact, ArtifactError> {
    if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
        return Err(ArtifactError::corrupt("bad magic"));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let stored = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
    let payload = &bytes[HEADER_LEN..];
    let actual = crc32fast::hash(payload);
    if stored != actual {
        return Err(ArtifactError::corrupt(format!(
            "checksum mismatch: header {stored:08x}, payload {actual:08x}"
        )));
    }
    let schema: ArtifactModelSchema =
        postcard::from_bytes(payload).map_err(|e| ArtifactError::corrupt(format!("decode: {e}")))?;
    Artifact::try_from(schema)
}

pub(crate) fn to_json(artifact: &Artifact) -> Result<String, ArtifactError> {
    let envelope = JsonEnvelope {
        format_version: FORMAT_VERSION,
        artifact: ArtifactModelSchema::from(artifact),
    };
    serde_json::to_string_pretty(&envelope).map_err(|e| ArtifactError::Encode(e.to_string()))
}

pub(crate) fn from_json(json: &str) -> Result<Artifact, ArtifactError> {
    // Check the version before the body so old files fail with a clear error.
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ArtifactError::corrupt(format!("decode: {e}")))?;
    let version = value
        .get("format_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| ArtifactError::corrupt("missing format_version"))?;
    if version != u64::from(FORMAT_VERSION) {
        return Err(ArtifactError::UnsupportedVersion {
            found: u16::try_from(version).unwrap_or(u16::MAX),
            supported: FORMAT_VERSION,
        });
    }
    let envelope: JsonEnvelope =
        serde_json::from_value(value).map_err(|e| ArtifactError::corrupt(format!("decode: {e}")))?;
    Artifact::try_from(envelope.artifact)
}

// =============================================================================
// Atomic writes
// =============================================================================

/// Bytes synced to a temporary sibling of their destination but not yet
/// visible there.
///
/// Dropping a staged write removes the temporary file and leaves the
/// destination untouched.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedWrite {
    /// Final destination.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename the temporary file over the destination.
    pub fn publish(self) -> Result<(), ArtifactError> {
        let Self { tmp, path } = self;
        match tmp.persist(&path) {
            Ok(_) => Ok(()),
            Err(e) => {
                remove_temporary(e.file);
                Err(ArtifactError::Io { path, source: e.error })
            }
        }
    }

    /// Remove the temporary file without publishing it.
    pub fn discard(self) {
        remove_temporary(self.tmp);
    }
}

fn remove_temporary(tmp: NamedTempFile) {
    let tmp_path = tmp.path().to_path_buf();
    if let Err(e) = tmp.close() {
        tracing::warn!(path = %tmp_path.display(), error = %e, "failed to remove temporary file");
    }
}

/// Write `bytes` to a temporary sibling of `path` without publishing it.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<StagedWrite, ArtifactError> {
    let io_err = |p: &Path, source| ArtifactError::Io {
        path: p.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(tmp.path(), e))?;
    Ok(StagedWrite {
        tmp,
        path: path.to_path_buf(),
    })
}

/// [`stage`] `value` as pretty JSON.
pub fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<StagedWrite, ArtifactError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Encode(e.to_string()))?;
    stage(path, json.as_bytes())
}

/// Serialize `value` as pretty JSON and publish it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    stage_json(path, value)?.publish()
}

/// Write `bytes` to a temporary sibling of `path`, then rename it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    stage(path, bytes)?.publish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_extension_is_case_insensitive() {
        assert!(is_json_path(Path::new("model.json")));
        assert!(is_json_path(Path::new("dir/model.JSON")));
        assert!(!is_json_path(Path::new("model.bin")));
        assert!(!is_json_path(Path::new("model")));
    }

    #[test]
    fn short_input_is_bad_magic() {
        let err = from_bytes(b"CRS").unwrap_err();
        assert!(matches!(err, ArtifactError::Corrupt { reason } if reason == "bad magic"));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(
            from_bytes(&bytes),
            Err(ArtifactError::UnsupportedVersion { found, .. }) if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn json_without_version_is_corrupt() {
        assert!(matches!(
            from_json(r#"{"artifact": {}}"#),
            Err(ArtifactError::Corrupt { .. })
        ));
        assert!(matches!(
            from_json(r#"{"format_version": 99, "artifact": {}}"#),
            Err(ArtifactError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let back: Vec<i32> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, [4]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn staged_write_is_invisible_until_published() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        fs::write(&path, b"old").unwrap();

        let staged = stage(&path, b"new").unwrap();
        assert_eq!(staged.path(), path.as_path());
        assert_eq!(fs::read(&path).unwrap(), b"old");
        staged.discard();
        assert_eq!(fs::read(&path).unwrap(), b"old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        stage(&path, b"new").unwrap().publish().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
