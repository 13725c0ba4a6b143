// Primitives for reading CSV files.

use std::io::Read;

use csv::Reader;

use crate::sync::{io_common::column_name, *};

pub fn read_csv_records(path: &str) -> SyncResult<Vec<Record>> {
    let rdr = reader_builder()
        .from_path(path)
        .context(CsvReadSnafu { path })?;
    records_from_reader(rdr, path)
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    // The header is read by hand to name the empty columns.
    builder.has_headers(false).flexible(true);
    builder
}

/// Reads the records of a CSV source. The first line is the header.
///
/// Empty cells are null, all the other cells are strings.
pub fn records_from_reader<R: Read>(rdr: Reader<R>, path: &str) -> SyncResult<Vec<Record>> {
    let mut records = rdr.into_records();
    let header = match records.next() {
        Some(line) => line.context(CsvReadSnafu { path })?,
        None => {
            warn!("Empty CSV file {}", path);
            return Ok(Vec::new());
        }
    };
    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if h.trim().is_empty() {
                column_name(idx + 1)
            } else {
                h.to_string()
            }
        })
        .collect();
    debug!("read_csv_records: headers: {:?}", headers);

    let mut res: Vec<Record> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is on line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvReadSnafu { path })?;
        debug!("read_csv_records: lineno: {:?} line: {:?}", lineno, line);
        let mut record = Record::new();
        for (col, h) in headers.iter().enumerate() {
            let v = match line.get(col) {
                Some(s) if !s.is_empty() => JSValue::String(s.to_string()),
                _ => JSValue::Null,
            };
            record.insert(h.clone(), v);
        }
        res.push(record);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(data: &str) -> Vec<Record> {
        let rdr = reader_builder().from_reader(data.as_bytes());
        records_from_reader(rdr, "test.csv").unwrap()
    }

    #[test]
    fn header_and_rows() {
        let records = read("Respondent ID,Collector ID,,Question\n1,2,Acme,Role\n3,4,,\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Respondent ID"), Some(&json!("1")));
        assert_eq!(records[0].get("Column3"), Some(&json!("Acme")));
        assert_eq!(records[1].get("Column3"), Some(&JSValue::Null));
        assert_eq!(records[1].get("Question"), Some(&JSValue::Null));
    }

    #[test]
    fn short_lines() {
        let records = read("a,b,c\n1\n");
        assert_eq!(records[0].get("a"), Some(&json!("1")));
        assert_eq!(records[0].get("c"), Some(&JSValue::Null));
    }

    #[test]
    fn empty_file() {
        assert!(read("").is_empty());
    }
}
