use tokio::time::timeout;
use tracing::{info, warn};

use super::OrchestratorSettings;
use crate::models::{AnswerBundle, AnswerMethod, PatientRecord};
use crate::prompts;
use crate::records::RecordStore;

pub(super) struct IdentificationOutcome {
    pub(super) bundle: AnswerBundle,
    pub(super) record: Option<PatientRecord>,
}

impl IdentificationOutcome {
    fn failure(text: String) -> Self {
        Self {
            bundle: AnswerBundle::new(AnswerMethod::IdentificationFailure, text),
            record: None,
        }
    }
}

pub(super) async fn identify(
    records: &dyn RecordStore,
    settings: &OrchestratorSettings,
    message: &str,
) -> IdentificationOutcome {
    let name = message.trim();
    if name.chars().count() < settings.min_name_chars {
        return IdentificationOutcome::failure(prompts::invalid_name_text());
    }

    let lookup = match timeout(settings.collaborator_timeout, records.lookup(name)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("patient record lookup timed out");
            return IdentificationOutcome {
                bundle: AnswerBundle::new(AnswerMethod::Error, prompts::records_unavailable_text()),
                record: None,
            };
        }
    };

    match lookup {
        Ok(Some(record)) => {
            info!(patient_id = %record.patient_id, "patient identified");
            IdentificationOutcome {
                bundle: AnswerBundle::new(
                    AnswerMethod::IdentificationSuccess,
                    prompts::identification_summary(&record),
                ),
                record: Some(record),
            }
        }
        Ok(None) => {
            let known = known_names(records, settings).await;
            let suggestions = near_matches(name, &known, settings.near_match_limit);
            info!(
                suggestions = suggestions.len(),
                "no patient record matched the supplied name"
            );
            IdentificationOutcome::failure(prompts::name_not_found_text(name, &suggestions))
        }
        Err(err) => {
            warn!("patient record lookup failed: {err}");
            IdentificationOutcome {
                bundle: AnswerBundle::new(AnswerMethod::Error, prompts::records_unavailable_text()),
                record: None,
            }
        }
    }
}

/// Suggestions are best effort; a failing listing just means none are offered.
async fn known_names(records: &dyn RecordStore, settings: &OrchestratorSettings) -> Vec<String> {
    match timeout(settings.collaborator_timeout, records.list_names()).await {
        Ok(Ok(names)) => names,
        Ok(Err(err)) => {
            warn!("listing patient names failed: {err}");
            Vec::new()
        }
        Err(_) => {
            warn!("listing patient names timed out");
            Vec::new()
        }
    }
}

/// Case-insensitive containment in either direction, in listing order.
pub(super) fn near_matches(name: &str, known: &[String], limit: usize) -> Vec<String> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    known
        .iter()
        .filter(|candidate| {
            let candidate = candidate.to_lowercase();
            candidate.contains(&needle) || needle.contains(&candidate)
        })
        .take(limit)
        .cloned()
        .collect()
}
