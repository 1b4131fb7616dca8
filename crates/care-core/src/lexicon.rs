use std::sync::LazyLock;

use regex::Regex;

static YEAR_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b20\d{2}\b").expect("year token regex is valid"));

const SYMPTOM_TERMS: &[&str] = &[
    "symptom",
    "pain",
    "swelling",
    "swollen",
    "bleeding",
    "fever",
    "nausea",
    "vomit",
    "dizzy",
    "dizziness",
    "fatigue",
    "tired",
    "headache",
    "itching",
    "cramp",
    "shortness of breath",
    "breathing",
    "urine",
    "urinate",
    "weight gain",
    "confusion",
];

const LAB_TERMS: &[&str] = &[
    "lab result",
    "lab value",
    "lab test",
    "labs",
    "test result",
    "creatinine",
    "egfr",
    "gfr",
    "potassium",
    "hemoglobin",
    "albumin",
    "blood pressure",
    "blood sugar",
    "dialysis",
    "kidney",
];

const MEDICATION_TERMS: &[&str] = &[
    "medication",
    "medicine",
    "side effect",
    "dose",
    "dosage",
    "pill",
    "prescription",
    "treatment",
    "diagnosis",
    "inhibitor",
    "diuretic",
    "lisinopril",
    "furosemide",
    "insulin",
];

const QUERY_PATTERN_TERMS: &[&str] = &[
    "should i",
    "is it normal",
    "is this normal",
    "what if",
    "can i",
    "is it safe",
    "worried",
    "concern",
    "emergency",
    "doctor",
];

const RECENCY_TERMS: &[&str] = &[
    "latest",
    "recent",
    "recently",
    "new",
    "newest",
    "current",
    "currently",
    "guideline",
    "guidelines",
    "breakthrough",
    "breakthroughs",
    "trial",
    "trials",
];

/// Static classification vocabulary shared by routing and the retrieval policy.
#[derive(Debug, Clone, Copy)]
pub struct KeywordLexicon {
    medical_groups: &'static [&'static [&'static str]],
    recency_terms: &'static [&'static str],
}

pub static STANDARD_LEXICON: KeywordLexicon = KeywordLexicon {
    medical_groups: &[
        SYMPTOM_TERMS,
        LAB_TERMS,
        MEDICATION_TERMS,
        QUERY_PATTERN_TERMS,
    ],
    recency_terms: RECENCY_TERMS,
};

impl Default for KeywordLexicon {
    fn default() -> Self {
        STANDARD_LEXICON
    }
}

impl KeywordLexicon {
    /// Case-insensitive substring match against every medical term group.
    pub fn is_medical(&self, message: &str) -> bool {
        let normalized = message.to_lowercase();
        self.medical_groups
            .iter()
            .any(|terms| contains_any(normalized.as_str(), terms))
    }

    /// Recency terms match whole words so "knew" or "recurrent" do not count; four-digit
    /// years from the 2000s count as recency tokens too.
    pub fn has_recency_signal(&self, query: &str) -> bool {
        let normalized = query.to_lowercase();
        let has_term = normalized
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .any(|token| self.recency_terms.contains(&token));

        has_term || YEAR_TOKEN_RE.is_match(normalized.as_str())
    }
}

fn contains_any(query: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| query.contains(term))
}
