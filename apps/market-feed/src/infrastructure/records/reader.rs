//! Reading JSON Lines into a [`RecordWindow`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use super::SourceError;
use crate::domain::validation::RecordWindow;

impl RecordWindow {
    /// Read JSON Lines from `reader`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, so a corrupt line is
    /// skipped like any other malformed record. With `max_records`, reading
    /// stops once that many non-blank lines have been consumed.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Read` if the underlying reader fails.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        max_records: Option<usize>,
    ) -> Result<Self, SourceError> {
        let mut window = Self::new();
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            if max_records.is_some_and(|max| window.consumed() >= max) {
                debug!(max_records = ?max_records, "Record window full");
                break;
            }

            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| SourceError::Read { source })?;
            if read == 0 {
                break;
            }
            line_no += 1;
            window.push_line(&String::from_utf8_lossy(&buf), line_no);
        }

        Ok(window)
    }

    /// Open and read a JSON Lines file.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Open` if the file cannot be opened and
    /// `SourceError::Read` if reading fails.
    pub fn open(path: impl AsRef<Path>, max_records: Option<usize>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let window = Self::from_reader(BufReader::new(file), max_records)?;
        info!(
            path = %path.display(),
            records = window.len(),
            skipped = window.skipped_count(),
            "Record window loaded"
        );
        Ok(window)
    }
}
