use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use tempfile::TempPath;

/// Extension given to every staged clip. Bytes are stored as uploaded; the
/// decoder probes the actual container from the content.
pub const STAGED_EXTENSION: &str = ".wav";

const STAGED_PREFIX: &str = "amygdala-";

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Uploaded audio is empty")]
    EmptyUpload,
    #[error("Failed to write staged audio: {0}")]
    Io(#[from] io::Error),
}

/// Materializes uploaded audio as uniquely named files for the engine.
#[derive(Debug, Clone)]
pub struct AudioStager {
    dir: PathBuf,
}

impl AudioStager {
    /// Stages into `dir`, creating it if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Stages into the system temporary directory.
    pub fn in_temp_dir() -> Self {
        Self { dir: std::env::temp_dir() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` to a fresh file and syncs it to disk.
    ///
    /// On any write failure the partially written file is removed before the
    /// error is returned.
    pub fn stage(&self, bytes: &[u8]) -> Result<StagedAudioFile, StagingError> {
        if bytes.is_empty() {
            return Err(StagingError::EmptyUpload);
        }

        let mut file = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(STAGED_EXTENSION)
            .tempfile_in(&self.dir)
            .map_err(|e| {
                error!("Failed to create staging file in {:?}: {}", self.dir, e);
                StagingError::Io(e)
            })?;

        // `file` deletes itself on drop, so `?` below never leaves a partial file.
        file.write_all(bytes)?;
        file.flush()?;
        file.as_file().sync_all()?;

        let path = file.into_temp_path();
        debug!("Staged {} bytes at {:?}", bytes.len(), path);
        Ok(StagedAudioFile {
            path,
            len: bytes.len() as u64,
        })
    }
}

/// A staged clip owned by one request.
///
/// The file is removed by [`StagedAudioFile::release`], or when the value is
/// dropped on any other path.
#[derive(Debug)]
pub struct StagedAudioFile {
    path: TempPath,
    len: u64,
}

impl StagedAudioFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Deletes the file now, reporting failures instead of ignoring them.
    pub fn release(self) -> io::Result<()> {
        let display = self.path.to_path_buf();
        self.path.close().map_err(|e| {
            warn!("Failed to remove staged audio {:?}: {}", display, e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_writes_all_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AudioStager::new(dir.path()).unwrap();
        let staged = stager.stage(b"RIFF....WAVE").unwrap();

        assert!(staged.path().exists());
        assert_eq!(staged.len(), 12);
        assert_eq!(fs::read(staged.path()).unwrap(), b"RIFF....WAVE");
        assert_eq!(
            staged.path().extension().and_then(|e| e.to_str()),
            Some("wav")
        );
    }

    #[test]
    fn test_staged_paths_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AudioStager::new(dir.path()).unwrap();
        let a = stager.stage(b"a").unwrap();
        let b = stager.stage(b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_release_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AudioStager::new(dir.path()).unwrap();
        let staged = stager.stage(b"audio").unwrap();
        let path = staged.path().to_path_buf();

        staged.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AudioStager::new(dir.path()).unwrap();
        let path = {
            let staged = stager.stage(b"audio").unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AudioStager::new(dir.path()).unwrap();
        assert!(matches!(stager.stage(b""), Err(StagingError::EmptyUpload)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let stager = AudioStager::new(dir.path().join("staging")).unwrap();
        fs::remove_dir(stager.dir()).unwrap();

        assert!(matches!(stager.stage(b"audio"), Err(StagingError::Io(_))));
        assert!(!stager.dir().exists());
    }
}
