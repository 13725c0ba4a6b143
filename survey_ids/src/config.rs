// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use uuid::Uuid;

/// The fields of a correlation key that must be filled.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum KeyField {
    RespondentId,
    SurveyId,
}

impl Display for KeyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyField::RespondentId => write!(f, "RespondentId"),
            KeyField::SurveyId => write!(f, "SurveyId"),
        }
    }
}

/// The triple identifying the answer of one respondent to one question of a survey.
///
/// A key can only be built through [CorrelationKey::new], which guarantees that
/// the respondent and the survey identifiers are not empty. The question is optional:
/// a missing question and an empty question are the same key.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct CorrelationKey {
    pub(crate) respondent_id: String,
    pub(crate) survey_id: String,
    pub(crate) question: Option<String>,
}

impl CorrelationKey {
    pub fn new(
        respondent_id: Option<&str>,
        survey_id: Option<&str>,
        question: Option<&str>,
    ) -> Result<CorrelationKey, DeriveError> {
        let respondent_id = required(respondent_id, KeyField::RespondentId)?;
        let survey_id = required(survey_id, KeyField::SurveyId)?;
        Ok(CorrelationKey {
            respondent_id,
            survey_id,
            question: question.filter(|q| !q.is_empty()).map(|q| q.to_string()),
        })
    }

    pub fn respondent_id(&self) -> &str {
        &self.respondent_id
    }

    pub fn survey_id(&self) -> &str {
        &self.survey_id
    }

    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }
}

pub(crate) fn required(value: Option<&str>, field: KeyField) -> Result<String, DeriveError> {
    match value {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(DeriveError::InvalidKind { field }),
    }
}

// ******** Output data structures *********

/// A 128-bit identifier derived from a [CorrelationKey] or from a response.
///
/// It displays as a lowercase, hyphenated UUID (8-4-4-4-12).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct DerivedIdentifier(pub(crate) Uuid);

impl DerivedIdentifier {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Display for DerivedIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Errors that prevent an identifier from being derived.
///
/// The only failure is a malformed key: the record cannot be processed and
/// retrying will not help.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DeriveError {
    InvalidKind { field: KeyField },
}

impl Error for DeriveError {}

impl Display for DeriveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeriveError::InvalidKind { field } => {
                write!(f, "Missing {} - cannot create an identifier", field)
            }
        }
    }
}
