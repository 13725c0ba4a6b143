// Primitives for reading JSON exports.

use crate::sync::*;

pub fn read_json_value(path: &str) -> SyncResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Reads a file containing a JSON array of records.
pub fn read_json_records(path: &str) -> SyncResult<Vec<Record>> {
    let js = read_json_value(path)?;
    let records = records_from_json(js, path)?;
    debug!("read_json_records: {} records in {:?}", records.len(), path);
    Ok(records)
}

pub fn records_from_json(js: JSValue, path: &str) -> SyncResult<Vec<Record>> {
    let items = match js {
        JSValue::Array(items) => items,
        _ => whatever!("{}: expected an array of records", path),
    };
    let mut res: Vec<Record> = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            JSValue::Object(record) => res.push(record),
            x => whatever!("{}: element {} is not a record: {}", path, idx, x),
        }
    }
    Ok(res)
}
