use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::data::DashboardData;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_POLL: Duration = Duration::from_millis(100);

/// Read-only loader for the dashboard data file
///
/// The file is read under a shared lock, waiting out any writer that holds an
/// exclusive one. Nothing here writes the data file.
pub struct Storage {
    file_path: PathBuf,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn wait_for_shared_lock(&self, file: &File) -> Result<()> {
        let start = Instant::now();
        loop {
            match FileExt::try_lock_shared(file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another process is writing: {:?}",
                            self.file_path
                        );
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to lock {:?}", self.file_path))
                }
            }
        }
    }

    /// Loads the data file
    ///
    /// Correspondence entries that cannot be read are skipped with a warning;
    /// a file that is not valid YAML is an error.
    pub fn load(&self) -> Result<DashboardData> {
        let file = File::open(&self.file_path).with_context(|| {
            format!(
                "Failed to open data file {:?} (pass --data or set PORTBOARD_DATA)",
                self.file_path
            )
        })?;

        self.wait_for_shared_lock(&file)?;

        let data: DashboardData = serde_yaml::from_reader(BufReader::new(&file))
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))?;
        FileExt::unlock(&file)?;

        tracing::debug!(
            path = ?self.file_path,
            correspondence = data.correspondence.len(),
            collections = data.collections.len(),
            "data file loaded"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portboard.yaml");
        fs::write(
            &path,
            r#"
correspondence:
  - id: C1
    subject: Pilotage fees
    status: pending
    priority: high
collections:
  vessels:
    - { id: V1, name: MV Apapa }
"#,
        )
        .unwrap();

        let loaded = Storage::new(&path).load().unwrap();
        assert_eq!(loaded.correspondence.len(), 1);
        assert_eq!(loaded.correspondence[0].subject, "Pilotage fees");
        assert_eq!(loaded.collection_len("vessels"), Some(1));
    }

    #[test]
    fn test_missing_file_is_an_error_and_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portboard.yaml");
        let err = Storage::new(&path).load().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open data file"));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_waits_out_a_writer_then_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portboard.yaml");
        fs::write(&path, "correspondence: []\n").unwrap();

        let writer = File::open(&path).unwrap();
        FileExt::lock_exclusive(&writer).unwrap();
        let err = Storage::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("Timeout waiting for file lock"));

        FileExt::unlock(&writer).unwrap();
        assert!(Storage::new(&path).load().is_ok());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portboard.yaml");
        fs::write(&path, "correspondence: [this is: not: valid").unwrap();
        assert!(Storage::new(&path).load().is_err());
    }
}
