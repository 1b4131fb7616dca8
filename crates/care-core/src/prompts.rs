use crate::models::{PatientRecord, non_empty};
use crate::web_search::WebSearchResponse;

pub const MEDICAL_DISCLAIMER: &str = "⚠️ This information is for educational purposes only and does not replace professional medical advice. Always consult your healthcare provider for medical decisions.";

pub const WEB_DISCLAIMER: &str = "⚠️ This answer draws on recent literature found through web search, not on your care team's reference material. It has not been reviewed by a clinician and may be incomplete. Do not change any medication or treatment without talking to your healthcare provider.";

pub const CLINICAL_SYSTEM_PROMPT: &str = "You are a clinical assistant specialised in nephrology and post-discharge care. Answer strictly from the supplied reference context and patient information. If the context does not cover the question, say so plainly. Cite every fact with its [Source N] marker. Never diagnose, prescribe or change a treatment plan, and remind the patient to contact their doctor for urgent concerns.";

pub const WEB_SYSTEM_PROMPT: &str = "You are a clinical assistant summarising recent medical literature for a patient after hospital discharge. Use only the supplied search results. Cite results with their [Source N] marker, state clearly that the information comes from recent literature, and keep the language patient-friendly. Never diagnose or prescribe.";

pub const TIE_BREAKER_SYSTEM_PROMPT: &str = "You classify patient messages. Answer with exactly YES or NO.";

const ANSWER_INSTRUCTIONS: &str = "Address the question directly, use bullet points where they help, cite [Source N] for medical facts and remind the patient to consult their healthcare provider.";

const MEDICATION_SUMMARY_LIMIT: usize = 5;

pub fn greeting_text() -> String {
    format!(
        "Hello! Welcome to the Post-Discharge Care Assistant. 🏥\n\n{MEDICAL_DISCLAIMER}\n\nI'm here to help with questions about your recovery and discharge instructions.\n\n**To get started, could you please tell me your full name?**\n\n(Example: John Smith)"
    )
}

pub fn invalid_name_text() -> String {
    "I didn't quite catch that. Could you please provide your full name? (First and Last name)"
        .to_string()
}

pub fn name_not_found_text(name: &str, suggestions: &[String]) -> String {
    let hint = if suggestions.is_empty() {
        "\n\nPlease check your name spelling and try again.".to_string()
    } else {
        let listed = suggestions
            .iter()
            .map(|suggestion| format!("- {suggestion}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\n\nDid you mean one of these?\n{listed}")
    };
    format!("I couldn't find a discharge report for '{name}' in our system.{hint}")
}

pub fn identification_summary(record: &PatientRecord) -> String {
    let mut lines = vec![
        format!(
            "Hi {}! 👋 I found your discharge report.",
            record.first_name()
        ),
        String::new(),
        format!("📋 **Patient Summary: {}**", record.patient_name),
        format!("🏥 **Diagnosis:** {}", record.primary_diagnosis),
        format!("📅 **Discharge Date:** {}", record.discharge_date),
    ];

    if !record.medications.is_empty() {
        lines.push(format!(
            "💊 **Medications:** ({} total)",
            record.medications.len()
        ));
        lines.extend(
            record
                .medications
                .iter()
                .take(MEDICATION_SUMMARY_LIMIT)
                .map(|medication| format!("  - {medication}")),
        );
    }

    let labs = &record.lab_values;
    let lab_lines = [
        labs.creatinine
            .map(|value| format!("  - Creatinine: {value} mg/dL")),
        labs.egfr.map(|value| format!("  - eGFR: {value} mL/min/1.73m²")),
        labs.potassium
            .map(|value| format!("  - Potassium: {value} mEq/L")),
        labs.hemoglobin
            .map(|value| format!("  - Hemoglobin: {value} g/dL")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    if !lab_lines.is_empty() {
        lines.push("🔬 **Lab Values:**".to_string());
        lines.extend(lab_lines);
    }

    if let Some(warning_signs) = non_empty(record.warning_signs.as_deref()) {
        lines.push(format!("⚠️ **Warning Signs:** {warning_signs}"));
    }
    if let Some(follow_up) = non_empty(record.follow_up.as_deref()) {
        lines.push(format!("📞 **Follow-up:** {follow_up}"));
    }

    lines.push(String::new());
    lines.push(
        "How are you feeling today? Ask me anything about your recovery or discharge instructions."
            .to_string(),
    );
    lines.join("\n")
}

pub fn general_acknowledgement_text(record: Option<&PatientRecord>) -> String {
    let follow_up = record
        .and_then(|record| non_empty(record.follow_up.as_deref()))
        .map(|follow_up| format!(" Your follow-up plan: {follow_up}."))
        .unwrap_or_default();
    format!(
        "Thanks for letting me know.{follow_up} If you have questions about symptoms, medications or lab results, just ask and I'll look them up for you."
    )
}

pub fn rag_user_prompt(query: &str, context: &str, supplementary: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(supplementary) = non_empty(supplementary) {
        parts.push(format!("PATIENT INFORMATION:\n{supplementary}\n"));
    }
    parts.push(format!("MEDICAL REFERENCE CONTEXT:\n{context}\n"));
    parts.push(format!("PATIENT QUESTION:\n{query}\n"));
    parts.push(ANSWER_INSTRUCTIONS.to_string());
    parts.join("\n")
}

pub fn web_user_prompt(
    query: &str,
    response: &WebSearchResponse,
    cited: usize,
    supplementary: Option<&str>,
) -> String {
    let mut parts = Vec::new();
    if let Some(supplementary) = non_empty(supplementary) {
        parts.push(format!("PATIENT INFORMATION:\n{supplementary}\n"));
    }
    parts.push(format!(
        "RECENT MEDICAL LITERATURE:\n{}\n",
        web_context(response, cited)
    ));
    parts.push(format!("PATIENT QUESTION:\n{query}\n"));
    parts.push(ANSWER_INSTRUCTIONS.to_string());
    parts.join("\n")
}

/// Templated answer used when generation over search results is unavailable.
pub fn web_fallback_text(response: &WebSearchResponse, cited: usize) -> String {
    let mut text = String::from("Here is what recent medical literature says:\n\n");
    if let Some(answer) = non_empty(response.direct_answer.as_deref()) {
        text.push_str(answer);
        text.push_str("\n\n");
    }
    text.push_str(&web_context(response, cited));
    text
}

fn web_context(response: &WebSearchResponse, cited: usize) -> String {
    let mut blocks = Vec::new();
    if let Some(answer) = non_empty(response.direct_answer.as_deref()) {
        blocks.push(format!("Summary: {answer}"));
    }
    blocks.extend(
        response
            .results
            .iter()
            .take(cited)
            .enumerate()
            .map(|(index, result)| {
                format!(
                    "[Source {}: {}]\n{}\n{}",
                    index + 1,
                    result.title,
                    result.url,
                    result.snippet
                )
            }),
    );
    blocks.join("\n\n")
}

pub fn tie_breaker_prompt(message: &str) -> String {
    format!(
        "Patient message: \"{message}\"\n\nIs this a medical question that requires clinical expertise? Answer with just YES or NO.\n\nMedical questions include symptoms, side effects, treatment advice, medication questions and health concerns. General questions include appointment scheduling, greetings and clarification of instructions."
    )
}

pub fn diagnosis_trailer(diagnosis: &str) -> String {
    format!("📋 Related to your diagnosis: {diagnosis}")
}

pub fn sources_section(rendered: &str, from_web: bool) -> String {
    if from_web {
        format!("📚 **Sources (recent literature):**\n{rendered}")
    } else {
        format!("📚 **Sources:**\n{rendered}")
    }
}

pub fn no_context_text() -> String {
    format!(
        "I couldn't find information about that in the nephrology reference material. Please ask your healthcare provider, or rephrase the question.\n\n{MEDICAL_DISCLAIMER}"
    )
}

pub fn no_web_results_text() -> String {
    format!(
        "I searched recent medical literature but couldn't find anything relevant to your question. Please ask your healthcare provider for the latest guidance.\n\n{MEDICAL_DISCLAIMER}"
    )
}

pub fn error_text() -> String {
    format!(
        "I apologize, but I encountered an error processing your question. Please consult your healthcare provider directly for medical advice.\n\n{MEDICAL_DISCLAIMER}"
    )
}

pub fn timeout_text() -> String {
    format!(
        "I'm sorry, that took longer than expected and I had to stop. Please try your message again, or contact your healthcare provider if it's urgent.\n\n{MEDICAL_DISCLAIMER}"
    )
}

pub fn records_unavailable_text() -> String {
    format!(
        "I'm having trouble reaching the patient records right now. Please try again in a moment.\n\n{MEDICAL_DISCLAIMER}"
    )
}

pub fn busy_text() -> String {
    format!(
        "I'm still working on your previous message. Please wait a moment and try again.\n\n{MEDICAL_DISCLAIMER}"
    )
}
