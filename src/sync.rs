pub mod answers;
pub mod company_update;
pub mod config_reader;
pub mod headers;
pub mod index;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod io_json;
pub mod records;

use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::sync::answers::{index_answers, AnswersSummary};
use crate::sync::company_update::{update_companies, UpdateSummary};
use crate::sync::config_reader::*;
use crate::sync::index::{DryRunIndex, IndexSink, JsonFileIndex};
use crate::sync::io_common::simplify_file_name;

/// A record as read from a source: an ordered mapping from column names to values.
pub type Record = JSMap<String, JSValue>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SyncError {
    #[snafu(display("Error opening spreadsheet {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {name:?} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Error reading file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON from {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error reading CSV file {path}"))]
    CsvRead { source: csv::Error, path: String },
    #[snafu(display("Unknown {what} provider {provider:?}"))]
    UnknownProvider { provider: String, what: String },
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Cannot create an identifier for {what}"))]
    Derive {
        source: survey_ids::DeriveError,
        what: String,
    },
    #[snafu(display("Difference detected between the output and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Reads all the records of a source, dispatching on the provider.
pub fn read_records(source: &SourceSettings) -> SyncResult<Vec<Record>> {
    info!(
        "Attempting to read {} records from {:?}",
        source.provider, source.file_path
    );
    match source.provider.as_str() {
        "json" => io_json::read_json_records(&source.file_path),
        "xlsx" => {
            io_excel::read_excel_records(&source.file_path, source.excel_worksheet_name.as_deref())
        }
        "csv" => io_csv::read_csv_records(&source.file_path),
        x => UnknownProviderSnafu {
            provider: x,
            what: "source",
        }
        .fail(),
    }
}

fn open_index(settings: &IndexSettings) -> SyncResult<Box<dyn IndexSink>> {
    match settings.provider.as_str() {
        "stdout" => Ok(Box::new(DryRunIndex::stdout())),
        "file" => {
            let path = settings.file_path.clone().context(InvalidConfigSnafu {
                message: "the file index requires a filePath",
            })?;
            Ok(Box::new(JsonFileIndex::open(&path)?))
        }
        x => UnknownProviderSnafu {
            provider: x,
            what: "index",
        }
        .fail(),
    }
}

/// Reads the records of the configured source and opens the configured index.
fn records_and_index(config: &SyncConfig) -> SyncResult<(Vec<Record>, Box<dyn IndexSink>)> {
    let records = read_records(&config.source)?;
    info!("Processing {} documents", records.len());

    let index_settings = config.index_settings();
    let index = open_index(&index_settings)?;
    info!(
        "Updating the {} index {:?}",
        index_settings.provider, index_settings.file_path
    );
    Ok((records, index))
}

/// Reads the configured source and merges the company of every respondent into
/// the configured index.
pub fn run_company_update(
    config_path: Option<String>,
    overrides: &ConfigOverrides,
) -> SyncResult<UpdateSummary> {
    let config = resolve_config(config_path.as_deref(), overrides)?;
    info!("config: {:?}", config);
    let settings = config.company_settings()?;

    let (records, mut index) = records_and_index(&config)?;
    let summary = update_companies(records, &settings, index.as_mut())?;
    info!("Summary: {:?}", summary);
    Ok(summary)
}

/// Reads the configured source and indexes one document per answered question.
pub fn run_answer_index(
    config_path: Option<String>,
    overrides: &ConfigOverrides,
) -> SyncResult<AnswersSummary> {
    let config = resolve_config(config_path.as_deref(), overrides)?;
    info!("config: {:?}", config);
    let settings = config.answer_settings()?;

    let (records, mut index) = records_and_index(&config)?;
    let summary = index_answers(records, &settings, index.as_mut())?;
    info!("Summary: {:?}", summary);
    Ok(summary)
}

/// Options of the spreadsheet conversion.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ConvertOptions {
    pub excel_worksheet_name: Option<String>,
    pub with_ids: bool,
    pub out: Option<String>,
    pub reference: Option<String>,
}

/// Converts a spreadsheet export into a JSON array of records.
pub fn run_convert(input: &str, options: &ConvertOptions) -> SyncResult<()> {
    let mut records =
        io_excel::read_excel_records(input, options.excel_worksheet_name.as_deref())?;
    if options.with_ids {
        records::stamp_response_ids(&mut records, &simplify_file_name(input))?;
    }
    info!(
        "Successfully processed {} and prepared {} records",
        input,
        records.len()
    );

    let pretty_js = serde_json::to_string_pretty(&records).context(WritingJsonSnafu {})?;
    write_output(options.out.as_deref(), &pretty_js)?;

    // The reference output, if provided for comparison
    if let Some(reference) = &options.reference {
        check_reference(reference, &pretty_js)?;
    }
    Ok(())
}

/// Lists the distinct headers found in all the spreadsheets of a directory.
pub fn run_headers(input_dir: &str, out: Option<&str>) -> SyncResult<()> {
    let infos = headers::collect_headers(input_dir)?;
    let pretty_js = serde_json::to_string_pretty(&infos).context(WritingJsonSnafu {})?;
    write_output(out, &pretty_js)?;
    info!("Successfully extracted {} distinct headers", infos.len());
    Ok(())
}

/// Derives the identifier of an answer, or of a whole response if no question
/// should be taken into account.
pub fn run_derive(
    respondent_id: &str,
    survey_id: &str,
    question: Option<&str>,
    response: bool,
) -> SyncResult<String> {
    let what = format!("respondent {:?} survey {:?}", respondent_id, survey_id);
    let id = if response {
        survey_ids::derive_response_id(Some(respondent_id), Some(survey_id))
    } else {
        survey_ids::derive(Some(respondent_id), Some(survey_id), question)
    }
    .context(DeriveSnafu { what })?;
    Ok(id.to_string())
}

/// Writes to the given file, or to the standard output if the path is missing,
/// empty or 'stdout'.
pub fn write_output(out: Option<&str>, contents: &str) -> SyncResult<()> {
    match out {
        None | Some("") | Some("stdout") => {
            println!("{}", contents);
            Ok(())
        }
        Some(path) => {
            debug!("write_output: writing {} bytes to {:?}", contents.len(), path);
            fs::write(path, contents).context(WritingFileSnafu { path })
        }
    }
}

fn check_reference(reference_path: &str, pretty_js: &str) -> SyncResult<()> {
    let reference = io_json::read_json_value(reference_path)?;
    let pretty_js_ref = serde_json::to_string_pretty(&reference).context(WritingJsonSnafu {})?;
    if pretty_js_ref != pretty_js {
        warn!("Found differences with the reference {}", reference_path);
        print_diff(pretty_js_ref.as_str(), pretty_js, "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("Output matches the reference {}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("survey_sync_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn derive_command() {
        let id = run_derive("12345", "67890", Some("Gender?"), false).unwrap();
        assert_eq!(id, "1a73512d-cc79-e810-a6ee-956b348ba1c1");
        let id = run_derive("12345", "67890", Some("Gender?"), true).unwrap();
        assert_eq!(id, "46a45849-2f54-e186-7add-a92514863c05");
    }

    #[test]
    fn derive_command_rejects_empty_ids() {
        let res = run_derive("", "67890", None, false);
        assert!(matches!(res, Err(SyncError::Derive { .. })));
    }

    #[test]
    fn unknown_source_provider() {
        let source = SourceSettings {
            provider: "parquet".to_string(),
            file_path: "data.parquet".to_string(),
            excel_worksheet_name: None,
        };
        let res = read_records(&source);
        assert!(matches!(res, Err(SyncError::UnknownProvider { .. })));
    }

    #[test]
    fn file_index_requires_a_path() {
        let settings = IndexSettings {
            provider: "file".to_string(),
            file_path: None,
        };
        assert!(matches!(
            open_index(&settings),
            Err(SyncError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn company_update_from_json_to_file_index() {
        let input = temp_path("company_input.json");
        let index_path = temp_path("company_index.json");
        let _ = fs::remove_file(&index_path);
        fs::write(
            &input,
            r#"[
                {"Respondent ID": 42, "Collector ID": "99", "Question": "Role", "Column11": null, "Column12": "Acme Corp"},
                {"Respondent ID": 43, "Collector ID": "99", "Question": "Role"},
                {"Collector ID": "99", "Column11": "Initech"}
            ]"#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            input: Some(input.display().to_string()),
            out: Some(index_path.display().to_string()),
            ..ConfigOverrides::default()
        };
        let summary = run_company_update(None, &overrides).unwrap();
        assert_eq!(summary.documents_processed, 3);
        assert_eq!(summary.updates_made, 1);
        assert_eq!(summary.skipped_no_company, 1);
        assert_eq!(summary.skipped_missing_ids, 1);

        let stored = io_json::read_json_records(&index_path.display().to_string()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].get("id"),
            Some(&JSValue::String(
                "e3aa7e91-2824-1579-4ff3-f0e418ae13c2".to_string()
            ))
        );
        assert_eq!(
            stored[0].get("Company"),
            Some(&JSValue::String("Acme Corp".to_string()))
        );

        let _ = fs::remove_file(&input);
        let _ = fs::remove_file(&index_path);
    }

    #[test]
    fn answers_then_companies_share_the_documents() {
        let role = "What is your role in the organization?";
        let answers_input = temp_path("answers_input.json");
        let company_input = temp_path("answers_company_input.json");
        let index_path = temp_path("answers_index.json");
        let _ = fs::remove_file(&index_path);
        let answers_js = serde_json::json!([{
            "Respondent ID": 42,
            "Collector ID": "99",
            "Which Company Do You Represent?": "Duke Energy",
            role: "Engineer",
        }]);
        fs::write(&answers_input, answers_js.to_string()).unwrap();
        let company_js = serde_json::json!([{
            "Respondent ID": 42,
            "Collector ID": "99",
            "Question": role,
            "Column11": "Acme Corp",
        }]);
        fs::write(&company_input, company_js.to_string()).unwrap();

        let overrides = ConfigOverrides {
            input: Some(answers_input.display().to_string()),
            out: Some(index_path.display().to_string()),
            ..ConfigOverrides::default()
        };
        let summary = run_answer_index(None, &overrides).unwrap();
        assert_eq!(summary.answers_found, 2);
        assert_eq!(summary.updates_made, 2);

        let overrides = ConfigOverrides {
            input: Some(company_input.display().to_string()),
            ..overrides
        };
        let summary = run_company_update(None, &overrides).unwrap();
        assert_eq!(summary.updates_made, 1);

        let stored = io_json::read_json_records(&index_path.display().to_string()).unwrap();
        assert_eq!(stored.len(), 2);
        let role_doc = stored
            .iter()
            .find(|d| d.get("Question") == Some(&serde_json::json!(role)))
            .unwrap();
        assert_eq!(role_doc.get("Answer"), Some(&serde_json::json!("Engineer")));
        assert_eq!(role_doc.get("Company"), Some(&serde_json::json!("Acme Corp")));

        let _ = fs::remove_file(&answers_input);
        let _ = fs::remove_file(&company_input);
        let _ = fs::remove_file(&index_path);
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let reference = temp_path("reference.json");
        fs::write(&reference, r#"[{"a": 1}]"#).unwrap();
        let same = serde_json::to_string_pretty(&serde_json::json!([{"a": 1}])).unwrap();
        assert!(check_reference(&reference.display().to_string(), &same).is_ok());
        let other = serde_json::to_string_pretty(&serde_json::json!([{"a": 2}])).unwrap();
        assert!(matches!(
            check_reference(&reference.display().to_string(), &other),
            Err(SyncError::ReferenceMismatch { .. })
        ));
        let _ = fs::remove_file(&reference);
    }

    #[test]
    fn write_output_to_file() {
        let out = temp_path("out.txt");
        write_output(Some(&out.display().to_string()), "hello").unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello");
        let _ = fs::remove_file(&out);
    }
}
