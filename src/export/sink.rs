use std::{
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

/// Destination of exported files.
pub trait FileSink: Send + Sync {
    /// Store `bytes` under `filename` and return where they ended up.
    fn save(&self, filename: &str, mime: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

pub type SinkHandle = Arc<dyn FileSink>;

/// Writes exports into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The current directory, or the temp directory when it cannot be resolved.
    pub fn current_dir() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
    }
}

impl FileSink for DirectorySink {
    fn save(&self, filename: &str, mime: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), mime, bytes = bytes.len(), "Wrote export");
        Ok(path)
    }
}

/// Keeps saved files in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(filename, mime, bytes)` of every save, oldest first.
    pub fn files(&self) -> Vec<(String, String, Vec<u8>)> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl FileSink for MemorySink {
    fn save(&self, filename: &str, mime: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((filename.to_string(), mime.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(filename))
    }
}
