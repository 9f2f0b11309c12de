//! JSON Lines writer for per-iteration records.
//!
//! Each line is a complete JSON object and the file is opened in append mode,
//! so an interrupted run leaves every completed iteration readable.

use crate::error::PersistenceResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Buffered JSON Lines writer.
pub struct JsonLinesWriter<T: Serialize> {
    path: PathBuf,
    buffer: Vec<T>,
    max_buffer_size: usize,
    writer: Option<BufWriter<File>>,
    records_written: usize,
}

impl<T: Serialize> JsonLinesWriter<T> {
    pub fn new(path: impl Into<PathBuf>, max_buffer_size: usize) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(?e, dir = %parent.display(), "Failed to create directory");
            }
        }
        Self {
            path,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            writer: None,
            records_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn add_record(&mut self, record: T) -> PersistenceResult<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write buffered records. The file is created on the first non-empty flush.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        if self.writer.is_none() {
            info!(path = %self.path.display(), "Opening JSON Lines writer (append mode)");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        for record in &self.buffer {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;

        let count = self.buffer.len();
        self.records_written += count;
        self.buffer.clear();
        debug!(path = %self.path.display(), records = count, "Flushed records");
        Ok(())
    }

    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(
                path = %self.path.display(),
                records = self.records_written,
                "Closed JSON Lines writer"
            );
        }
        Ok(())
    }
}

impl<T: Serialize> Drop for JsonLinesWriter<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(?e, "Failed to close writer on drop");
        }
    }
}

/// Read every line of a JSON Lines file. Blank lines are ignored.
pub fn read_json_lines<T: DeserializeOwned>(path: impl AsRef<Path>) -> PersistenceResult<Vec<T>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        stage: usize,
        iteration: usize,
        rms_ms: f64,
    }

    fn row(i: usize) -> Row {
        Row {
            stage: 0,
            iteration: i,
            rms_ms: 10.0 / (i + 1) as f64,
        }
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stages.jsonl");
        let mut writer = JsonLinesWriter::new(&path, 100);
        for i in 0..5 {
            writer.add_record(row(i)).unwrap();
        }
        writer.close().unwrap();

        let rows: Vec<Row> = read_json_lines(&path).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[3], row(3));
    }

    #[test]
    fn test_append_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stages.jsonl");
        {
            let mut writer = JsonLinesWriter::new(&path, 100);
            for i in 0..3 {
                writer.add_record(row(i)).unwrap();
            }
        }
        {
            let mut writer = JsonLinesWriter::new(&path, 100);
            for i in 3..6 {
                writer.add_record(row(i)).unwrap();
            }
            writer.close().unwrap();
        }
        let rows: Vec<Row> = read_json_lines(&path).unwrap();
        assert_eq!(rows.len(), 6, "Should have 6 records total from 2 writers");
    }

    #[test]
    fn test_flush_on_buffer_full() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stages.jsonl");
        let mut writer = JsonLinesWriter::new(&path, 2);
        writer.add_record(row(0)).unwrap();
        assert!(!path.exists());
        writer.add_record(row(1)).unwrap();
        assert_eq!(writer.records_written(), 2);
        assert_eq!(read_json_lines::<Row>(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_flush_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stages.jsonl");
        let mut writer: JsonLinesWriter<Row> = JsonLinesWriter::new(&path, 100);
        writer.flush().unwrap();
        assert!(!path.exists());
    }
}
