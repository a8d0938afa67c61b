//! CSV export of journal entries.
//!
//! The export replaces the target file atomically:
//! 1. Rows are written to a temp file in the target's directory
//! 2. The temp file is synced to disk
//! 3. It is renamed over the target

use crate::types::format_timestamp;
use crate::{Error, JournalEntry, Result};
use fs2::FileExt;
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    id: String,
    date: String,
    exercise: &'a str,
    content: &'a str,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a JournalEntry> for CsvRow<'a> {
    fn from(entry: &'a JournalEntry) -> Self {
        CsvRow {
            id: entry.id.to_string(),
            date: format_timestamp(&entry.date),
            exercise: &entry.exercise,
            content: &entry.content,
            user_id: entry.user_id.to_string(),
            created_at: format_timestamp(&entry.created_at),
            updated_at: format_timestamp(&entry.updated_at),
        }
    }
}

/// Write `entries` to `path` as CSV with a header row.
///
/// Returns the number of rows written. An existing file is replaced.
pub fn write_entries_csv(entries: &[JournalEntry], path: &Path) -> Result<usize> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&parent)?;

    let temp = NamedTempFile::new_in(&parent)?;

    // Exclusive lock serializes concurrent exporters writing the same temp
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(temp.as_file());
        for entry in entries {
            writer.serialize(CsvRow::from(entry))?;
        }
        writer.flush()?;
    }

    // Header row is only emitted with the first record
    if entries.is_empty() {
        use std::io::Write;
        let mut file = temp.as_file();
        file.write_all(b"id,date,exercise,content,user_id,created_at,updated_at\n")?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} entries to {:?}", entries.len(), path);
    Ok(entries.len())
}
