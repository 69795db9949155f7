use crate::file::csv::error::FileError;
use model::records::activity::ActivityRecord;
use std::io::Read;

/// Decodes activity rows from delimited text, one record per row.
///
/// The first row is taken as the header and never yielded. Every following
/// row must have the header's field count and exactly eight values. The
/// first malformed row yields its error and ends the iteration.
pub struct ActivityCsvSource<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    failed: bool,
}

impl<R: Read> ActivityCsvSource<R> {
    pub fn new(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        ActivityCsvSource {
            records: reader.into_records(),
            failed: false,
        }
    }
}

impl<R: Read> Iterator for ActivityCsvSource<R> {
    type Item = Result<ActivityRecord, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = match self.records.next()? {
            Ok(record) => {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                ActivityRecord::from_fields(record.iter())
                    .map_err(|source| FileError::Record { line, source })
            }
            Err(e) => Err(FileError::CsvError(e)),
        };

        self.failed = item.is_err();
        Some(item)
    }
}
