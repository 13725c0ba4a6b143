// The typed view over the loosely-typed records read from the sources.

use crate::sync::io_common::{column_name, is_blank, value_as_string};
use crate::sync::*;

/// Names under which the respondent identifier appears in the exports.
pub const RESPONDENT_ID_FIELDS: &[&str] = &["Respondent ID", "Respondant ID", "RespondentID"];
/// Names under which the survey (collector) identifier appears in the exports.
pub const SURVEY_ID_FIELDS: &[&str] = &["Collector ID", "CollectorID"];
pub const QUESTION_FIELDS: &[&str] = &["Question"];

/// A survey record, validated at the boundary.
///
/// The identifiers are `None` when the field is missing, null or blank.
#[derive(PartialEq, Debug, Clone)]
pub struct SurveyRecord {
    pub respondent_id: Option<String>,
    pub survey_id: Option<String>,
    pub question: Option<String>,
    pub fields: Record,
}

impl SurveyRecord {
    pub fn from_fields(fields: Record) -> SurveyRecord {
        let respondent_id = find_field(&fields, RESPONDENT_ID_FIELDS).and_then(id_value);
        let survey_id = find_field(&fields, SURVEY_ID_FIELDS).and_then(id_value);
        let question = find_field(&fields, QUESTION_FIELDS).and_then(value_as_string);
        SurveyRecord {
            respondent_id,
            survey_id,
            question,
            fields,
        }
    }

    pub fn has_ids(&self) -> bool {
        self.respondent_id.is_some() && self.survey_id.is_some()
    }

    /// The first non-blank value in the company columns, in order.
    ///
    /// If a list of known companies is given, values that are not in the list are skipped.
    pub fn company(&self, settings: &CompanySettings) -> Option<&JSValue> {
        (settings.first_column..=settings.last_column)
            .filter_map(|n| self.fields.get(&column_name(n)))
            .filter(|v| !is_blank(v))
            .find(|v| match &settings.known_companies {
                Some(known) => value_as_string(v)
                    .map(|s| known.contains(s.trim()))
                    .unwrap_or(false),
                None => true,
            })
    }
}

/// Finds the value of the first of the names present in the record, ignoring the
/// case. Null and blank values count as missing.
pub fn find_field<'a>(fields: &'a Record, names: &[&str]) -> Option<&'a JSValue> {
    names.iter().find_map(|name| {
        fields
            .iter()
            .find(|(k, v)| k.trim().eq_ignore_ascii_case(name) && !is_blank(v))
            .map(|(_, v)| v)
    })
}

fn id_value(v: &JSValue) -> Option<String> {
    value_as_string(v).filter(|s| !s.trim().is_empty())
}

/// Stamps every record with the identifier of its response, the name of the
/// file it came from and its position.
///
/// A record without respondent or collector identifier cannot be stamped.
pub fn stamp_response_ids(records: &mut [Record], source_file: &str) -> SyncResult<()> {
    for (idx, record) in records.iter_mut().enumerate() {
        let respondent_id = find_field(record, RESPONDENT_ID_FIELDS).and_then(id_value);
        let survey_id = find_field(record, SURVEY_ID_FIELDS).and_then(id_value);
        let id = survey_ids::derive_response_id(respondent_id.as_deref(), survey_id.as_deref())
            .context(DeriveSnafu {
                what: format!("record {} of {}", idx, source_file),
            })?;
        record.insert("id".to_string(), JSValue::String(id.to_string()));
        record.insert(
            "sourceFile".to_string(),
            JSValue::String(source_file.to_string()),
        );
        record.insert("recordIndex".to_string(), JSValue::from(idx));
    }
    Ok(())
}
