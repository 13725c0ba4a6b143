use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate};

use crate::sync::{
    io_common::{column_name, float_to_json, is_blank},
    records::RESPONDENT_ID_FIELDS,
    *,
};

/// Reads the records of one worksheet: the worksheet with the given name, or the
/// first one.
///
/// Rows that have a respondent column but no respondent are dropped.
pub fn read_excel_records(path: &str, worksheet_name: Option<&str>) -> SyncResult<Vec<Record>> {
    let wrange = match get_range(path, worksheet_name)? {
        Some(wrange) => wrange,
        None => {
            warn!("No worksheets found in {}", path);
            return Ok(Vec::new());
        }
    };
    let records = range_to_records(&wrange);
    let num_rows = records.len();
    let filtered = filter_missing_respondents(records);
    info!(
        "Processed {} rows from {}. {} rows remain after filtering out missing respondent ids",
        num_rows,
        path,
        filtered.len()
    );
    Ok(filtered)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> SyncResult<Option<Range<DataType>>> {
    debug!(
        "read_excel_records: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        let wrange = workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(Some(wrange))
    } else {
        match workbook.worksheet_range_at(0) {
            Some(wrange) => Ok(Some(wrange.context(OpeningExcelSnafu { path })?)),
            None => Ok(None),
        }
    }
}

/// Converts a worksheet into records. The first row holds the column names.
pub fn range_to_records(wrange: &Range<DataType>) -> Vec<Record> {
    let (height, width) = wrange.get_size();
    if height == 0 || width == 0 {
        warn!("Empty worksheet");
        return Vec::new();
    }
    // Columns are named after their absolute position in the sheet.
    let first_col = wrange.start().map(|(_, col)| col as usize).unwrap_or(0);

    let mut iter = wrange.rows();
    let headers: Vec<String> = match iter.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(idx, cell)| header_name(cell, first_col + idx + 1))
            .collect(),
        None => return Vec::new(),
    };
    debug!("range_to_records: headers: {:?}", headers);
    let date_columns: Vec<bool> = headers.iter().map(|h| is_date_column(h)).collect();

    let mut res: Vec<Record> = Vec::new();
    for row in iter {
        let mut record = Record::new();
        for (idx, header) in headers.iter().enumerate() {
            let v = row
                .get(idx)
                .map(|cell| cell_to_json(cell, date_columns[idx]))
                .unwrap_or(JSValue::Null);
            record.insert(header.clone(), v);
        }
        res.push(record);
    }
    res
}

/// The trimmed, non-empty names in the first row of every worksheet.
pub fn worksheet_headers(path: &str) -> SyncResult<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let mut res: Vec<String> = Vec::new();
    for (worksheet_name, wrange) in workbook.worksheets() {
        // Empty worksheets have no header.
        if let Some(header) = wrange.rows().next() {
            debug!(
                "worksheet_headers: {:?} {:?}: {} columns",
                path,
                worksheet_name,
                header.len()
            );
            res.extend(
                header
                    .iter()
                    .filter_map(cell_to_string)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            );
        }
    }
    Ok(res)
}

fn header_name(cell: &DataType, column: usize) -> String {
    match cell_to_string(cell) {
        Some(s) if !s.trim().is_empty() => s,
        _ => column_name(column),
    }
}

fn cell_to_string(cell: &DataType) -> Option<String> {
    match cell {
        DataType::Empty => None,
        DataType::String(s) => Some(s.clone()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(format!("{}", f)),
        DataType::Bool(b) => Some(b.to_string()),
        DataType::DateTime(f) => excel_serial_to_date(*f).or_else(|| Some(format!("{}", f))),
        _ => None,
    }
}

/// The JSON value of a cell.
///
/// In the date columns, the numbers are read as dates. Error cells are null.
pub fn cell_to_json(cell: &DataType, date_column: bool) -> JSValue {
    match cell {
        DataType::Empty => JSValue::Null,
        DataType::String(s) => JSValue::String(s.clone()),
        DataType::Bool(b) => JSValue::Bool(*b),
        DataType::Int(i) if date_column => date_or_number(*i as f64),
        DataType::Int(i) => JSValue::from(*i),
        DataType::Float(f) if date_column => date_or_number(*f),
        DataType::Float(f) => float_to_json(*f),
        DataType::DateTime(f) => date_or_number(*f),
        _ => JSValue::Null,
    }
}

fn date_or_number(serial: f64) -> JSValue {
    match excel_serial_to_date(serial) {
        Some(d) => JSValue::String(d),
        // Keep the original value if it is not a date.
        None => float_to_json(serial),
    }
}

/// True for the columns that hold dates: 'Start Date', 'End Date', ...
pub fn is_date_column(header: &str) -> bool {
    let lower = header.to_lowercase();
    lower.contains("date") || lower.contains("start") || lower.contains("end")
}

/// Converts a spreadsheet serial date (days since 1899-12-30) to yyyy-MM-dd.
///
/// The time of the day is dropped.
pub fn excel_serial_to_date(serial: f64) -> Option<String> {
    // Range of the dates supported by the spreadsheets: years 100 to 9999.
    if !serial.is_finite() || serial <= -657_435.0 || serial >= 2_958_466.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::days(serial.trunc() as i64))?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Drops the records that have a respondent column without a value.
/// Records without any respondent column are kept.
pub fn filter_missing_respondents(records: Vec<Record>) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| {
            let respondent = record.iter().find(|(k, _)| {
                RESPONDENT_ID_FIELDS[..2]
                    .iter()
                    .any(|name| k.trim().eq_ignore_ascii_case(name))
            });
            match respondent {
                Some((_, v)) => !is_blank(v),
                None => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(start: (u32, u32), rows: Vec<Vec<DataType>>) -> Range<DataType> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut wrange = Range::new(start, (start.0 + height - 1, start.1 + width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                wrange.set_value((start.0 + r as u32, start.1 + c as u32), cell);
            }
        }
        wrange
    }

    fn s(x: &str) -> DataType {
        DataType::String(x.to_string())
    }

    #[test]
    fn serial_dates() {
        assert_eq!(excel_serial_to_date(1.0).as_deref(), Some("1899-12-31"));
        assert_eq!(excel_serial_to_date(45_000.0).as_deref(), Some("2023-03-15"));
        assert_eq!(excel_serial_to_date(45_000.75).as_deref(), Some("2023-03-15"));
        assert_eq!(excel_serial_to_date(3_000_000.0), None);
        assert_eq!(excel_serial_to_date(f64::NAN), None);
    }

    #[test]
    fn date_columns() {
        assert!(is_date_column("Start Date"));
        assert!(is_date_column("END"));
        assert!(is_date_column("Date Created"));
        assert!(!is_date_column("Respondent ID"));
    }

    #[test]
    fn cells() {
        assert_eq!(cell_to_json(&DataType::Empty, false), JSValue::Null);
        assert_eq!(cell_to_json(&s("x"), true), json!("x"));
        assert_eq!(cell_to_json(&DataType::Float(12345.0), false), json!(12345));
        assert_eq!(cell_to_json(&DataType::Float(0.5), false), json!(0.5));
        assert_eq!(cell_to_json(&DataType::Int(7), false), json!(7));
        assert_eq!(cell_to_json(&DataType::Bool(true), false), json!(true));
        assert_eq!(
            cell_to_json(&DataType::Float(45_000.0), true),
            json!("2023-03-15")
        );
        assert_eq!(
            cell_to_json(&DataType::DateTime(45_000.5), false),
            json!("2023-03-15")
        );
    }

    #[test]
    fn records_from_sheet() {
        let wrange = sheet(
            (0, 0),
            vec![
                vec![s("Respondent ID"), s("Start Date"), DataType::Empty, s("Question")],
                vec![
                    DataType::Float(101.0),
                    DataType::Float(45_000.0),
                    s("Acme Corp"),
                    DataType::Empty,
                ],
            ],
        );
        let records = range_to_records(&wrange);
        assert_eq!(records.len(), 1);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["Respondent ID", "Start Date", "Column3", "Question"]);
        assert_eq!(records[0].get("Respondent ID"), Some(&json!(101)));
        assert_eq!(records[0].get("Start Date"), Some(&json!("2023-03-15")));
        assert_eq!(records[0].get("Column3"), Some(&json!("Acme Corp")));
        assert_eq!(records[0].get("Question"), Some(&JSValue::Null));
    }

    #[test]
    fn column_names_follow_the_sheet_position() {
        let wrange = sheet((0, 2), vec![vec![DataType::Empty, s("b")], vec![s("x"), s("y")]]);
        let records = range_to_records(&wrange);
        assert_eq!(records[0].get("Column3"), Some(&json!("x")));
        assert_eq!(records[0].get("b"), Some(&json!("y")));
    }

    #[test]
    fn empty_sheet() {
        let wrange: Range<DataType> = Range::empty();
        assert!(range_to_records(&wrange).is_empty());
    }

    #[test]
    fn missing_respondents_are_dropped() {
        let records: Vec<Record> = vec![
            json!({"respondent id": 1, "a": 1}),
            json!({"respondent id": "  ", "a": 2}),
            json!({"respondent id": null, "a": 3}),
        ]
        .into_iter()
        .map(|js| js.as_object().cloned().unwrap())
        .collect();
        let kept = filter_missing_respondents(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].get("a"), Some(&json!(1)));

        let no_column: Vec<Record> = vec![json!({"a": 1}).as_object().cloned().unwrap()];
        assert_eq!(filter_missing_respondents(no_column).len(), 1);
    }

    #[test]
    fn missing_workbook() {
        let res = read_excel_records("/nonexistent/survey_sync/survey.xlsx", None);
        assert!(matches!(res, Err(SyncError::OpeningExcel { .. })));
    }
}
