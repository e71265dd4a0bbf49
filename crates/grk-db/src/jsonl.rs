//! Line-delimited JSON streams.
//!
//! [`JsonlStream`] is a single-pass, forward-only iterator over the records of
//! a JSONL file. It never holds more than one line in memory. To restart a
//! sequence, open a new stream on the same path.
//!
//! Malformed records are skipped with a warning and counted; blank lines are
//! ignored. A read error ends the stream.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{DbError, DbResult};

/// Forward-only stream of `T` records decoded from a JSONL file.
pub struct JsonlStream<T> {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_num: usize,
    skipped: usize,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlStream<T> {
    /// Open a stream over `path`.
    pub fn open(path: &Path) -> DbResult<Self> {
        let file = File::open(path)
            .map_err(|e| DbError::snapshot_io(path, format!("Failed to open: {}", e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_num: 0,
            skipped: 0,
            _marker: PhantomData,
        })
    }

    /// Number of malformed records skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Path this stream reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: DeserializeOwned> Iterator for JsonlStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        "Stopped reading {} at line {}: {}",
                        self.path.display(),
                        self.line_num + 1,
                        e
                    );
                    return None;
                }
            };
            self.line_num += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        "Skipping malformed record in {} line {}: {}",
                        self.path.display(),
                        self.line_num,
                        e
                    );
                }
            }
        }
    }
}

/// Write `records` to `path` as JSONL, replacing any existing file.
pub fn write_jsonl<'a, T, I>(path: &Path, records: I) -> DbResult<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = File::create(path)
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to create: {}", e)))?;
    let mut writer = BufWriter::new(file);
    let mut count = 0;

    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{}", line)
            .map_err(|e| DbError::snapshot_io(path, format!("Failed to write: {}", e)))?;
        count += 1;
    }

    writer
        .flush()
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to flush: {}", e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to sync: {}", e)))?;
    Ok(count)
}

/// Append a single record to a JSONL file, creating it if needed.
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> DbResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DbError::snapshot_io(parent, format!("Failed to create directory: {}", e)))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to open for append: {}", e)))?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to append: {}", e)))?;
    Ok(())
}
