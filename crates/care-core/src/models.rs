use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    AdministrativeAgent,
    ClinicalAgent,
    SystemError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabValues {
    #[serde(default)]
    pub creatinine: Option<f64>,
    #[serde(default)]
    pub egfr: Option<f64>,
    #[serde(default)]
    pub potassium: Option<f64>,
    #[serde(default)]
    pub hemoglobin: Option<f64>,
    #[serde(default)]
    pub albumin: Option<f64>,
}

/// Discharge report for one patient, in the shape produced by the records pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub admission_date: Option<String>,
    pub discharge_date: String,
    pub primary_diagnosis: String,
    #[serde(default)]
    pub secondary_diagnoses: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub lab_values: LabValues,
    #[serde(default)]
    pub dietary_restrictions: Option<String>,
    #[serde(default)]
    pub follow_up: Option<String>,
    #[serde(default)]
    pub warning_signs: Option<String>,
    #[serde(default)]
    pub discharge_instructions: Option<String>,
    #[serde(default)]
    pub attending_physician: Option<String>,
}

impl PatientRecord {
    /// Compact rendering handed to the clinical path as supplementary grounding.
    pub fn grounding_context(&self) -> String {
        let mut lines = vec![
            "Patient Context:".to_string(),
            format!("- Name: {}", self.patient_name),
            format!("- Primary Diagnosis: {}", self.primary_diagnosis),
        ];
        if !self.secondary_diagnoses.is_empty() {
            lines.push(format!(
                "- Secondary Diagnoses: {}",
                self.secondary_diagnoses.join(", ")
            ));
        }
        if !self.medications.is_empty() {
            lines.push(format!(
                "- Current Medications: {}",
                self.medications.join(", ")
            ));
        }
        let labs = [
            self.lab_values
                .creatinine
                .map(|value| format!("Creatinine {value}")),
            self.lab_values.egfr.map(|value| format!("eGFR {value}")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        if !labs.is_empty() {
            lines.push(format!("- Lab Values: {}", labs.join(", ")));
        }
        lines.push(format!("- Discharge Date: {}", self.discharge_date));
        if let Some(warning_signs) = non_empty(self.warning_signs.as_deref()) {
            lines.push(format!("- Warning Signs to Watch: {warning_signs}"));
        }

        lines.join("\n")
    }

    pub fn first_name(&self) -> &str {
        self.patient_name
            .split_whitespace()
            .next()
            .unwrap_or(self.patient_name.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMethod {
    Greeting,
    IdentificationSuccess,
    IdentificationFailure,
    Rag,
    WebSearch,
    NoContext,
    NoWebResults,
    General,
    Error,
}

impl AnswerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::IdentificationSuccess => "identification_success",
            Self::IdentificationFailure => "identification_failure",
            Self::Rag => "rag",
            Self::WebSearch => "web_search",
            Self::NoContext => "no_context",
            Self::NoWebResults => "no_web_results",
            Self::General => "general",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub rank: usize,
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Citation {
    pub fn render(&self) -> String {
        match self.url.as_deref() {
            Some(url) => format!("Source {}: {} ({url})", self.rank, self.locator),
            None => format!("Source {}: {}", self.rank, self.locator),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerBundle {
    pub text: String,
    pub method: AnswerMethod,
    pub citations: Vec<Citation>,
    pub patient_identified: bool,
}

impl AnswerBundle {
    pub fn new(method: AnswerMethod, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            method,
            citations: Vec::new(),
            patient_identified: false,
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Passage as returned by the similarity index, before ranks are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub text: String,
    pub locator: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub rank: usize,
    pub text: String,
    pub locator: String,
    pub score: f32,
}

impl RetrievedPassage {
    /// Assigns dense 1-based ranks in descending score order. The sort is stable, so
    /// equal scores keep the provider's order; non-finite scores sink to the bottom.
    pub fn rank_hits(hits: Vec<IndexedPassage>, limit: usize) -> Vec<Self> {
        let mut hits = hits;
        hits.sort_by(|left, right| sortable_score(right.score).total_cmp(&sortable_score(left.score)));

        hits.into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, hit)| Self {
                rank: index + 1,
                text: hit.text,
                locator: hit.locator,
                score: hit.score,
            })
            .collect()
    }
}

fn sortable_score(score: f32) -> f32 {
    if score.is_finite() {
        score
    } else {
        f32::NEG_INFINITY
    }
}

/// Per-conversation state. Fields are private so the counters and the identification
/// flag can only move forward through the methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    id: String,
    turn_count: u64,
    patient_identified: bool,
    patient_record: Option<PatientRecord>,
    history: Vec<Turn>,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turn_count: 0,
            patient_identified: false,
            patient_record: None,
            history: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    pub fn patient_identified(&self) -> bool {
        self.patient_identified
    }

    pub fn patient_record(&self) -> Option<&PatientRecord> {
        self.patient_record.as_ref()
    }

    pub fn patient_name(&self) -> Option<&str> {
        self.patient_record
            .as_ref()
            .map(|record| record.patient_name.as_str())
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Accepts an inbound message: bumps the turn counter and records the user turn.
    pub fn begin_turn(&mut self, message: &str) {
        self.turn_count = self.turn_count.saturating_add(1);
        self.push_turn(Speaker::User, message);
    }

    pub fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        let timestamp = Utc::now();
        self.history.push(Turn {
            speaker,
            text: text.into(),
            timestamp,
        });
        self.last_active_at = timestamp;
    }

    /// Returns false when the session was already identified; the record is then left untouched.
    pub fn mark_identified(&mut self, record: PatientRecord) -> bool {
        if self.patient_identified {
            return false;
        }
        self.patient_record = Some(record);
        self.patient_identified = true;
        true
    }

    /// Explicit reset, outside normal message processing.
    pub fn reset_identification(&mut self) {
        self.patient_identified = false;
        self.patient_record = None;
    }

    /// Plain-text transcript summary for operator display.
    pub fn transcript_summary(&self, max_chars_per_turn: usize) -> String {
        let mut summary = format!(
            "Patient: {}\nTotal Turns: {}\nStarted: {}\n\nConversation History:\n",
            self.patient_name().unwrap_or("Not identified"),
            self.turn_count,
            self.created_at.to_rfc3339(),
        );
        for (index, turn) in self.history.iter().enumerate() {
            let mut text = turn.text.chars().take(max_chars_per_turn).collect::<String>();
            if turn.text.chars().count() > max_chars_per_turn {
                text.push_str("...");
            }
            summary.push_str(&format!(
                "\n{}. [{}] {}\n",
                index + 1,
                speaker_label(turn.speaker),
                text
            ));
        }
        summary
    }
}

fn speaker_label(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::User => "USER",
        Speaker::AdministrativeAgent => "RECEPTIONIST",
        Speaker::ClinicalAgent => "CLINICAL",
        Speaker::SystemError => "SYSTEM",
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
