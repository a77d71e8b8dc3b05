//! Stock [`ImageSource`] implementations.

use crate::decoder::ImageSource;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens a file on every `provide` call.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSource for FileSource {
    fn provide(&self) -> std::io::Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Serves an in-memory encoded image.
#[derive(Debug, Clone)]
pub struct BytesSource {
    bytes: Arc<[u8]>,
}

impl BytesSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }
}

impl ImageSource for BytesSource {
    fn provide(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(SharedBytes(Arc::clone(&self.bytes)))))
    }
}

struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_source_reads_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"tessera").unwrap();

        let source = FileSource::new(file.path());
        let mut contents = String::new();
        source.provide().unwrap().read_to_string(&mut contents).unwrap();

        assert_eq!(contents, "tessera");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = FileSource::new("/definitely/not/here.png");
        assert!(source.provide().is_err());
    }

    #[test]
    fn test_bytes_source_can_be_read_twice() {
        let source = BytesSource::new(vec![1u8, 2, 3]);

        for _ in 0..2 {
            let mut out = Vec::new();
            source.provide().unwrap().read_to_end(&mut out).unwrap();
            assert_eq!(out, vec![1, 2, 3]);
        }
    }
}
