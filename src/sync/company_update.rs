use serde::Serialize;

use crate::sync::{
    index::{BatchWriter, IndexDocument, IndexSink},
    records::SurveyRecord,
    *,
};

/// The counts reported at the end of a company update.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct UpdateSummary {
    #[serde(rename = "documentsProcessed")]
    pub documents_processed: u64,
    #[serde(rename = "updatesMade")]
    pub updates_made: u64,
    #[serde(rename = "skippedMissingIds")]
    pub skipped_missing_ids: u64,
    #[serde(rename = "skippedNoCompany")]
    pub skipped_no_company: u64,
    pub failed: u64,
}

/// Merges the company of every respondent into the index.
///
/// Each document only carries the derived identifier and the company, so the
/// other fields of the indexed answers are left untouched. Records that cannot
/// be processed are counted and skipped.
pub fn update_companies(
    records: impl IntoIterator<Item = Record>,
    settings: &CompanySettings,
    sink: &mut dyn IndexSink,
) -> SyncResult<UpdateSummary> {
    let mut summary = UpdateSummary::default();
    let mut writer = BatchWriter::new(sink, settings.batch_size);

    for fields in records {
        summary.documents_processed += 1;
        let record = SurveyRecord::from_fields(fields);
        if !record.has_ids() {
            warn!(
                "Skipping document {}: missing respondent or collector id",
                summary.documents_processed
            );
            summary.skipped_missing_ids += 1;
            continue;
        }
        let company = match record.company(settings) {
            Some(company) => company.clone(),
            None => {
                debug!(
                    "Skipping respondent {:?}: no company found",
                    record.respondent_id
                );
                summary.skipped_no_company += 1;
                continue;
            }
        };
        let id = match survey_ids::derive(
            record.respondent_id.as_deref(),
            record.survey_id.as_deref(),
            record.question.as_deref(),
        ) {
            Ok(id) => id,
            Err(e) => {
                warn!("Cannot derive the id of document {}: {}", summary.documents_processed, e);
                summary.failed += 1;
                continue;
            }
        };
        debug!(
            "update_companies: respondent {:?} id {} company {}",
            record.respondent_id, id, company
        );

        let mut doc = IndexDocument::new();
        doc.insert("id".to_string(), JSValue::String(id.to_string()));
        doc.insert("Company".to_string(), company);
        writer.push(doc)?;
    }
    let (succeeded, failed) = writer.finish()?;
    summary.updates_made = succeeded;
    summary.failed += failed;

    info!(
        "Processed {} documents, {} updates made",
        summary.documents_processed, summary.updates_made
    );
    Ok(summary)
}
