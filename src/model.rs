//! Provisioning of the whisper model into a writable location

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, SttEngineError};

/// Copy the bundled model at `source` into `dest_dir` unless a large enough
/// copy is already there, and return the destination path.
///
/// The result must be larger than `min_bytes`; anything smaller is treated as
/// a missing model.
pub fn provision_model(source: &Path, dest_dir: &Path, min_bytes: u64) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        SttEngineError::ModelMissing(format!("no file name in {}", source.display()))
    })?;
    let dest = dest_dir.join(file_name);

    let existing = file_len(&dest);
    if existing > min_bytes {
        debug!("Model already present: {} ({} bytes)", dest.display(), existing);
        return Ok(dest);
    }

    if !source.exists() {
        return Err(SttEngineError::ModelMissing(source.display().to_string()).into());
    }

    info!("Copying model {} to {}", source.display(), dest.display());
    fs::create_dir_all(dest_dir)?;
    let copied = fs::copy(source, &dest)?;
    info!("Model copied size={}", copied);

    check_model(&dest, min_bytes)?;
    Ok(dest)
}

/// Coarse sanity check: the model file exists and is larger than `min_bytes`
pub fn check_model(path: &Path, min_bytes: u64) -> Result<()> {
    let len = file_len(path);
    if len > min_bytes {
        Ok(())
    } else {
        Err(SttEngineError::ModelMissing(format!(
            "{} ({} bytes, need more than {})",
            path.display(),
            len,
            min_bytes
        ))
        .into())
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    #[test]
    fn test_copies_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bundle").join("ggml-tiny.bin");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, vec![7u8; 2048]).unwrap();
        let dest_dir = dir.path().join("files");

        let dest = provision_model(&source, &dest_dir, 1024).unwrap();
        assert_eq!(dest, dest_dir.join("ggml-tiny.bin"));
        assert_eq!(fs::metadata(&dest).unwrap().len(), 2048);

        // A present copy is reused even after the bundle disappears
        fs::remove_file(&source).unwrap();
        assert_eq!(provision_model(&source, &dest_dir, 1024).unwrap(), dest);
    }

    #[test]
    fn test_small_copy_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("ggml-tiny.bin");
        fs::write(&source, vec![1u8; 4096]).unwrap();
        let dest_dir = dir.path().join("files");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(dest_dir.join("ggml-tiny.bin"), b"partial").unwrap();

        let dest = provision_model(&source, &dest_dir, 1024).unwrap();
        assert_eq!(fs::metadata(dest).unwrap().len(), 4096);
    }

    #[test]
    fn test_undersized_bundle_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("ggml-tiny.bin");
        fs::write(&source, b"not a model").unwrap();

        let result = provision_model(&source, &dir.path().join("files"), 1_000_000);
        assert!(matches!(
            result,
            Err(SyncError::Stt(SttEngineError::ModelMissing(_)))
        ));
    }

    #[test]
    fn test_absent_bundle_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = provision_model(&dir.path().join("nope.bin"), dir.path(), 10);
        assert!(matches!(
            result,
            Err(SyncError::Stt(SttEngineError::ModelMissing(_)))
        ));
    }
}
