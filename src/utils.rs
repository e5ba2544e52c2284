//! Utility functions for file handling and common operations

use crate::{CurateError, CurateResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Check if a file is gzip compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> CurateResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(CurateError::Io(e)),
    }
}

/// Get the number of CPU cores, with a fallback default
pub fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> CurateResult<()> {
    if !path.as_ref().exists() {
        return Err(CurateError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> CurateResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| CurateError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Create parent directories if they don't exist
pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> CurateResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Chunking utility for splitting work across threads
pub fn chunk_work<T: Clone>(items: Vec<T>, num_chunks: usize) -> Vec<Vec<T>> {
    if items.is_empty() || num_chunks == 0 {
        return vec![items];
    }

    let num_chunks = std::cmp::min(num_chunks, items.len());
    let chunk_size = std::cmp::max(1, items.len() / num_chunks);

    let mut chunks = Vec::new();
    let mut start = 0;

    for i in 0..num_chunks {
        let end = if i == num_chunks - 1 {
            items.len() // Last chunk gets all remaining items
        } else {
            std::cmp::min(start + chunk_size, items.len())
        };

        if start < items.len() {
            chunks.push(items[start..end].to_vec());
            start = end;
        }
    }

    chunks
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting timer: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn log_elapsed(&self) {
        let duration = self.elapsed();
        log::info!("Timer '{}' elapsed: {:.2?}", self.name, duration);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}
