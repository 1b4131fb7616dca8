use crate::lexicon::{KeywordLexicon, STANDARD_LEXICON};
use crate::models::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Greeting,
    Identification,
    Medical,
    General,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Identification => "identification",
            Self::Medical => "medical",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntentRouter {
    lexicon: KeywordLexicon,
}

impl IntentRouter {
    pub fn new(lexicon: KeywordLexicon) -> Self {
        Self { lexicon }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_LEXICON)
    }

    /// Expects the state after the turn counter has been bumped for `message`.
    pub fn route(&self, state: &SessionState, message: &str) -> Route {
        route_for(
            &self.lexicon,
            state.turn_count(),
            state.patient_identified(),
            message,
        )
    }
}

/// First match wins: opening turn, then identification, then lexicon classification.
pub fn route_for(
    lexicon: &KeywordLexicon,
    turn_count: u64,
    patient_identified: bool,
    message: &str,
) -> Route {
    if turn_count == 1 {
        return Route::Greeting;
    }

    if !patient_identified {
        return Route::Identification;
    }

    if lexicon.is_medical(message) {
        Route::Medical
    } else {
        Route::General
    }
}
