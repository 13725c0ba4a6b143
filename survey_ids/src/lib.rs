/*!
Deterministic identifiers for survey responses.

An answer to a survey question is identified by the respondent, the survey (collector)
and the question. The same triple always maps to the same identifier, on any machine and
in any process, so that documents produced at different times by different tools can be
merged together in a search index.

```
use survey_ids::derive;

let id = derive(Some("12345"), Some("67890"), Some("Gender?"))?;
assert_eq!(id.to_string(), "1a73512d-cc79-e810-a6ee-956b348ba1c1");
# Ok::<(), survey_ids::DeriveError>(())
```

The identifier is built as follows:
1. the question is hashed with [question_hash] (0 when there is no question),
2. the string `{respondent}_{survey}_{question hash}` is hashed with SHA-256,
3. the first 16 bytes of the digest are used as is for the UUID.
*/

mod config;
mod hashing;

use log::debug;

pub use crate::config::*;
pub use crate::hashing::{question_hash, QUESTION_HASH_ALGORITHM};

use uuid::Uuid;

/// Derives the identifier of the answer of a respondent to a question.
///
/// Fails with [DeriveError::InvalidKind] if the respondent or the survey identifier
/// is missing or empty.
pub fn derive(
    respondent_id: Option<&str>,
    survey_id: Option<&str>,
    question: Option<&str>,
) -> Result<DerivedIdentifier, DeriveError> {
    let key = CorrelationKey::new(respondent_id, survey_id, question)?;
    Ok(derive_key(&key))
}

/// Derives the identifier of an already validated key. This cannot fail.
pub fn derive_key(key: &CorrelationKey) -> DerivedIdentifier {
    let qhash = question_hash(key.question()).to_string();
    let bytes = hashing::truncated_digest(&[
        key.respondent_id.as_str(),
        key.survey_id.as_str(),
        qhash.as_str(),
    ]);
    let res = DerivedIdentifier(Uuid::from_bytes(bytes));
    debug!(
        "derive_key: respondent: {:?} survey: {:?} question hash: {} -> {}",
        key.respondent_id, key.survey_id, qhash, res
    );
    res
}

/// Derives the identifier of a whole response (all the questions answered by a
/// respondent for a survey).
///
/// This is the identifier attached to the records converted from the survey exports.
pub fn derive_response_id(
    respondent_id: Option<&str>,
    survey_id: Option<&str>,
) -> Result<DerivedIdentifier, DeriveError> {
    let respondent_id = config::required(respondent_id, KeyField::RespondentId)?;
    let survey_id = config::required(survey_id, KeyField::SurveyId)?;
    let bytes = hashing::truncated_digest(&[respondent_id.as_str(), survey_id.as_str()]);
    Ok(DerivedIdentifier(Uuid::from_bytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn is_canonical(s: &str) -> bool {
        let groups: Vec<&str> = s.split('-').collect();
        let lens: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        lens == vec![8, 4, 4, 4, 12]
            && groups
                .iter()
                .all(|g| g.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')))
    }

    #[test]
    fn regression_vectors() {
        init();
        let id = derive(Some("12345"), Some("67890"), Some("Gender?")).unwrap();
        assert_eq!(id.to_string(), "1a73512d-cc79-e810-a6ee-956b348ba1c1");

        let id = derive(Some("R1"), Some("S1"), None).unwrap();
        assert_eq!(id.to_string(), "ac73d412-b84b-3ea0-15e0-e9c71c9db2d5");

        let id = derive(Some("R1"), Some("S1"), Some("some question")).unwrap();
        assert_eq!(id.to_string(), "d6ed6ad5-2c79-b14e-7354-9d78a75314cc");

        let id = derive(Some("42"), Some("99"), Some("Role")).unwrap();
        assert_eq!(id.to_string(), "e3aa7e91-2824-1579-4ff3-f0e418ae13c2");
    }

    #[test]
    fn deterministic() {
        init();
        let a = derive(Some("R1"), Some("S1"), Some("Q")).unwrap();
        let b = derive(Some("R1"), Some("S1"), Some("Q")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn sensitive_to_each_field() {
        init();
        let base = derive(Some("R1"), Some("S1"), Some("Q")).unwrap();
        assert_ne!(base, derive(Some("R2"), Some("S1"), Some("Q")).unwrap());
        assert_ne!(base, derive(Some("R1"), Some("S2"), Some("Q")).unwrap());
        assert_ne!(base, derive(Some("R1"), Some("S1"), Some("Q2")).unwrap());
    }

    #[test]
    fn missing_ids_are_invalid() {
        init();
        assert_eq!(
            derive(Some(""), Some("S1"), Some("Q")),
            Err(DeriveError::InvalidKind {
                field: KeyField::RespondentId
            })
        );
        assert_eq!(
            derive(Some("R1"), Some(""), Some("Q")),
            Err(DeriveError::InvalidKind {
                field: KeyField::SurveyId
            })
        );
        assert_eq!(
            derive(None, Some("S1"), Some("Q")),
            Err(DeriveError::InvalidKind {
                field: KeyField::RespondentId
            })
        );
        assert_eq!(
            derive(Some("R1"), None, None),
            Err(DeriveError::InvalidKind {
                field: KeyField::SurveyId
            })
        );
    }

    #[test]
    fn missing_question_is_empty_question() {
        init();
        let none = derive(Some("R1"), Some("S1"), None).unwrap();
        let empty = derive(Some("R1"), Some("S1"), Some("")).unwrap();
        let some = derive(Some("R1"), Some("S1"), Some("some question")).unwrap();
        assert_eq!(none, empty);
        assert_ne!(none, some);

        let key = CorrelationKey::new(Some("R1"), Some("S1"), Some("")).unwrap();
        assert_eq!(key.question(), None);
    }

    #[test]
    fn canonical_format() {
        init();
        for (r, s, q) in [
            ("1", "2", None),
            ("12345", "67890", Some("Gender?")),
            ("respondent", "survey", Some("Which Company Do You Represent?")),
            ("Ünïcödé", "s", Some("¿Qué?")),
        ] {
            let id = derive(Some(r), Some(s), q).unwrap().to_string();
            assert!(is_canonical(&id), "not canonical: {}", id);
        }
    }

    #[test]
    fn raw_digest_bytes_are_kept() {
        // No version or variant bits are forced: the bytes are the digest prefix.
        let id = derive(Some("12345"), Some("67890"), Some("Gender?")).unwrap();
        assert_eq!(
            id.as_bytes()[..4],
            [0x1a, 0x73, 0x51, 0x2d]
        );
        assert_eq!(id.as_uuid().get_version_num(), 0x0e);
    }

    #[test]
    fn response_identifiers() {
        init();
        let id = derive_response_id(Some("12345"), Some("67890")).unwrap();
        assert_eq!(id.to_string(), "46a45849-2f54-e186-7add-a92514863c05");
        assert_ne!(
            id,
            derive(Some("12345"), Some("67890"), None).unwrap(),
        );
        assert_eq!(
            derive_response_id(Some("12345"), None),
            Err(DeriveError::InvalidKind {
                field: KeyField::SurveyId
            })
        );
    }

    #[test]
    fn error_message() {
        let err = derive(None, Some("S1"), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing RespondentId - cannot create an identifier"
        );
    }
}
