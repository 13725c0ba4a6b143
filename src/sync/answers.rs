// Turns every survey response into one index document per answered question.

use std::collections::HashSet;

use serde::Serialize;

use crate::sync::{
    index::{BatchWriter, IndexDocument, IndexSink},
    io_common::value_as_string,
    records::{find_field, RESPONDENT_ID_FIELDS, SURVEY_ID_FIELDS},
    *,
};

/// The columns common to all the survey exports. They are never questions.
pub const DATA_COLUMNS: &[&str] = &[
    "Collector ID",
    "Custom Data 1",
    "Email Address",
    "End Date",
    "First Name",
    "IP Address",
    "Last Name",
    "Respondent ID",
    "Start Date",
    "surveyName",
];

/// The question followed by the block of columns holding the company.
pub const COMPANY_QUESTION: &str = "Which Company Do You Represent?";
/// The question followed by the contact details, which are not indexed.
pub const CONTACT_QUESTION: &str = "Please Provide Your Contact Information";

/// The companies accepted when no list is configured.
pub const DEFAULT_KNOWN_COMPANIES: &[&str] = &[
    "AEP",
    "Ameren",
    "Berkshire Hathaway Energy",
    "Arizona Public Service",
    "CenterPoint Energy",
    "Con Edison",
    "Consumers Energy",
    "Dominion",
    "DTE Energy",
    "Duke Energy",
    "Duquesne Light",
    "Entergy",
    "Eversource",
    "Exelon",
    "NextEra Energy",
    "NiSource",
    "PG&E",
    "PSEG",
    "Sempra",
    "Southern California Edison",
    "Southern Company",
    "Tampa Electric",
    "Tennessee Valley Authority",
    "Xcel Energy",
];

/// What is known about the respondent of a response.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RespondentInfo {
    pub respondent_id: Option<String>,
    pub survey_id: Option<String>,
    pub survey_name: Option<String>,
    pub survey_start: Option<String>,
    pub survey_end: Option<String>,
    pub ip_address: Option<String>,
    pub company: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// The counts reported at the end of the answer indexing.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct AnswersSummary {
    #[serde(rename = "responsesProcessed")]
    pub responses_processed: u64,
    #[serde(rename = "skippedMissingIds")]
    pub skipped_missing_ids: u64,
    #[serde(rename = "answersFound")]
    pub answers_found: u64,
    #[serde(rename = "updatesMade")]
    pub updates_made: u64,
    pub failed: u64,
}

pub fn is_data_column(name: &str) -> bool {
    let name = name.trim();
    DATA_COLUMNS
        .iter()
        .chain(RESPONDENT_ID_FIELDS.iter())
        .chain(SURVEY_ID_FIELDS.iter())
        .any(|c| name.eq_ignore_ascii_case(c))
}

/// True for the column names that look like a question: not a `Column{n}`
/// placeholder, longer than 20 characters, and made of several words.
pub fn is_potential_question(name: &str) -> bool {
    !name.to_lowercase().starts_with("column")
        && name.chars().count() > 20
        && name.find(' ').map(|idx| idx > 0).unwrap_or(false)
}

fn is_question(name: &str) -> bool {
    is_potential_question(name) && !is_data_column(name) && name.trim() != CONTACT_QUESTION
}

fn text_of(fields: &Record, names: &[&str]) -> Option<String> {
    find_field(fields, names).and_then(value_as_string)
}

/// Reads the data columns and the company of a response.
pub fn respondent_info(fields: &Record, known_companies: &HashSet<String>) -> RespondentInfo {
    RespondentInfo {
        respondent_id: text_of(fields, RESPONDENT_ID_FIELDS),
        survey_id: text_of(fields, SURVEY_ID_FIELDS),
        survey_name: text_of(fields, &["surveyName"]),
        survey_start: text_of(fields, &["Start Date"]),
        survey_end: text_of(fields, &["End Date"]),
        ip_address: text_of(fields, &["IP Address"]),
        company: find_company(fields, known_companies),
    }
}

/// The company is the first known company in the company question or in the
/// `Column{n}` fields right after it.
pub fn find_company(fields: &Record, known_companies: &HashSet<String>) -> Option<String> {
    let mut looking = false;
    for (name, value) in fields.iter() {
        if looking && !name.starts_with("Column") {
            debug!("find_company: no known company before {:?}", name);
            looking = false;
        }
        if is_data_column(name) {
            continue;
        }
        if looking || name.trim() == COMPANY_QUESTION {
            looking = true;
            if let Some(company) = value_as_string(value).map(|s| s.trim().to_string()) {
                if known_companies.contains(&company) {
                    return Some(company);
                }
            }
        }
    }
    None
}

/// Pairs the questions of a response with their answers, in the order of the
/// columns.
///
/// When a question has no value, its answer is the next non-empty value that is
/// not itself a question.
pub fn question_answers(fields: &Record) -> Vec<QuestionAnswer> {
    let mut res: Vec<QuestionAnswer> = Vec::new();
    for (name, value) in fields.iter() {
        let text = value_as_string(value).unwrap_or_default();
        if is_question(name) {
            res.push(QuestionAnswer {
                question: name.trim().to_string(),
                answer: text,
            });
        } else if !text.trim().is_empty() {
            if let Some(last) = res.last_mut() {
                if last.answer.trim().is_empty() {
                    last.answer = text;
                }
            }
        }
    }
    res
}

fn opt_string(v: &Option<String>) -> JSValue {
    match v {
        Some(s) => JSValue::String(s.clone()),
        None => JSValue::Null,
    }
}

/// One document per answered question, keyed by the identifier of the answer.
///
/// Questions without answer are left out. The company is only set when one was
/// found, so that an existing company is not erased.
pub fn answer_documents(
    info: &RespondentInfo,
    answers: &[QuestionAnswer],
) -> Result<Vec<IndexDocument>, survey_ids::DeriveError> {
    let mut res: Vec<IndexDocument> = Vec::new();
    for qa in answers.iter().filter(|qa| !qa.answer.trim().is_empty()) {
        let id = survey_ids::derive(
            info.respondent_id.as_deref(),
            info.survey_id.as_deref(),
            Some(qa.question.as_str()),
        )?;
        let mut doc = IndexDocument::new();
        doc.insert("id".to_string(), JSValue::String(id.to_string()));
        doc.insert("RespondentId".to_string(), opt_string(&info.respondent_id));
        doc.insert("SurveyId".to_string(), opt_string(&info.survey_id));
        doc.insert("SurveyName".to_string(), opt_string(&info.survey_name));
        doc.insert("SurveyStart".to_string(), opt_string(&info.survey_start));
        doc.insert("SurveyEnd".to_string(), opt_string(&info.survey_end));
        doc.insert("IPAddress".to_string(), opt_string(&info.ip_address));
        doc.insert("Question".to_string(), JSValue::String(qa.question.clone()));
        doc.insert("Answer".to_string(), JSValue::String(qa.answer.clone()));
        if let Some(company) = &info.company {
            doc.insert("Company".to_string(), JSValue::String(company.clone()));
        }
        res.push(doc);
    }
    Ok(res)
}

/// Indexes the answers of every response.
pub fn index_answers(
    records: impl IntoIterator<Item = Record>,
    settings: &AnswerSettings,
    sink: &mut dyn IndexSink,
) -> SyncResult<AnswersSummary> {
    let mut summary = AnswersSummary::default();
    let mut writer = BatchWriter::new(sink, settings.batch_size);

    for fields in records {
        summary.responses_processed += 1;
        let info = respondent_info(&fields, &settings.known_companies);
        if info.respondent_id.is_none() || info.survey_id.is_none() {
            warn!(
                "Skipping response {}: missing respondent or collector id",
                summary.responses_processed
            );
            summary.skipped_missing_ids += 1;
            continue;
        }
        if info.company.is_none() {
            debug!("index_answers: no company for respondent {:?}", info.respondent_id);
        }
        let answers = question_answers(&fields);
        let docs = answer_documents(&info, &answers).context(DeriveSnafu {
            what: format!("response {}", summary.responses_processed),
        })?;
        debug!(
            "index_answers: respondent {:?}: {} questions, {} answered",
            info.respondent_id,
            answers.len(),
            docs.len()
        );
        summary.answers_found += docs.len() as u64;
        for doc in docs {
            writer.push(doc)?;
        }
    }
    let (succeeded, failed) = writer.finish()?;
    summary.updates_made = succeeded;
    summary.failed = failed;

    info!(
        "Processed {} responses, {} answers indexed",
        summary.responses_processed, summary.updates_made
    );
    Ok(summary)
}
