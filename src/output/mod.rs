//! Byte sinks and sources, and the model sinks built on them.
//!
//! [`Writer`] and [`Reader`] are the file-output capabilities: the same
//! trait objects back CSV/JSON exports, response recordings and replay
//! fixtures. [`NilWriter`] turns any of them into a dry run.

pub mod csv;
pub mod json;

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::OutputError;

pub use self::csv::CsvSink;
pub use self::json::JsonLinesSink;

/// Accepts bytes.
pub trait Writer: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<(), OutputError>;
}

/// Produces bytes.
pub trait Reader: Send {
    fn read(&mut self) -> Result<Vec<u8>, OutputError>;
}

/// Receives finished models of type `M`.
pub trait Sink<M>: Send {
    fn deliver(&mut self, model: &M) -> Result<(), OutputError>;
}

// ─── Writers ─────────────────────────────────────────────────────────────────

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        (**self).write(bytes)
    }
}

/// Discards everything. Used for dry runs and local replays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilWriter;

impl Writer for NilWriter {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Appends to a file, creating it (and its parent directories) on first write.
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    truncate: bool,
    file: Option<File>,
}

impl FileWriter {
    /// Append to `path`, keeping existing content.
    pub fn append(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            truncate: false,
            file: None,
        }
    }

    /// Replace `path` on first write.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            truncate: true,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File, OutputError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(!self.truncate)
                    .truncate(self.truncate)
                    .open(&self.path)?
            }
        };
        Ok(self.file.insert(file))
    }
}

impl Writer for FileWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        let file = self.file()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }
}

/// Shared in-memory buffer. Clones write to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Writer for BufferWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), OutputError> {
        let mut buffer = match self.buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        buffer.extend_from_slice(bytes);
        Ok(())
    }
}

// ─── Readers ─────────────────────────────────────────────────────────────────

/// Reads a whole file.
#[derive(Debug, Clone)]
pub struct FileReader {
    path: PathBuf,
}

impl FileReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reader for FileReader {
    fn read(&mut self) -> Result<Vec<u8>, OutputError> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Serves a fixed byte buffer on every read.
#[derive(Debug, Clone, Default)]
pub struct BufferReader {
    bytes: Vec<u8>,
}

impl BufferReader {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl Reader for BufferReader {
    fn read(&mut self) -> Result<Vec<u8>, OutputError> {
        Ok(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_writer_accepts_everything() {
        let mut w = NilWriter;
        assert!(w.write(b"anything").is_ok());
    }

    #[test]
    fn test_buffer_writer_clones_share_buffer() {
        let writer = BufferWriter::new();
        let mut clone = writer.clone();
        clone.write(b"abc").unwrap();
        clone.write(b"def").unwrap();
        assert_eq!(writer.contents_string(), "abcdef");
    }

    #[test]
    fn test_file_writer_creates_parents_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");

        let mut writer = FileWriter::append(&path);
        writer.write(b"one\n").unwrap();
        writer.write(b"two\n").unwrap();
        drop(writer);

        let mut again = FileWriter::append(&path);
        again.write(b"three\n").unwrap();

        let mut reader = FileReader::new(&path);
        assert_eq!(reader.read().unwrap(), b"one\ntwo\nthree\n");
    }

    #[test]
    fn test_file_writer_create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        FileWriter::append(&path).write(b"old").unwrap();
        FileWriter::create(&path).write(b"new").unwrap();
        assert_eq!(FileReader::new(&path).read().unwrap(), b"new");
    }
}
