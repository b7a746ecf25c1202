use std::sync::OnceLock;

use regex::Regex;

use crate::models::{AssistantCategory, Classification};

struct Rule {
    keywords: &'static [&'static str],
    category: AssistantCategory,
    urgent: bool,
}

const EMERGENCY_KEYWORDS: &[&str] = &[
    "chest pain",
    "heart attack",
    "can't breathe",
    "cannot breathe",
    "difficulty breathing",
    "shortness of breath",
    "severe bleeding",
    "unconscious",
    "stroke",
    "seizure",
    "overdose",
    "emergency",
];

const SYMPTOM_KEYWORDS: &[&str] = &[
    "symptom", "pain", "ache", "fever", "cough", "headache", "nausea", "dizzy",
    "rash", "sore", "vomit", "swelling", "hurt", "bleeding", "infection",
];

const APPOINTMENT_KEYWORDS: &[&str] = &[
    "appointment", "book", "schedule", "reschedule", "cancel", "consultation", "visit",
];

const MEDICATION_KEYWORDS: &[&str] = &[
    "medication", "medicine", "drug", "dose", "dosage", "pill", "tablet",
    "prescription", "side effect", "antibiotic",
];

const HEALTH_ADVICE_KEYWORDS: &[&str] = &[
    "diet", "nutrition", "exercise", "workout", "weight", "fitness", "calorie",
    "healthy", "sleep", "vitamin",
];

const MENTAL_HEALTH_KEYWORDS: &[&str] = &[
    "stress", "anxiety", "anxious", "depress", "depressed", "mental", "lonely", "panic",
    "mood", "overwhelmed", "sad",
];

/// Evaluated top to bottom; the first rule with a matching keyword wins.
const RULES: &[Rule] = &[
    Rule { keywords: EMERGENCY_KEYWORDS, category: AssistantCategory::SymptomAnalysis, urgent: true },
    Rule { keywords: SYMPTOM_KEYWORDS, category: AssistantCategory::SymptomAnalysis, urgent: false },
    Rule { keywords: APPOINTMENT_KEYWORDS, category: AssistantCategory::AppointmentBooking, urgent: false },
    Rule { keywords: MEDICATION_KEYWORDS, category: AssistantCategory::MedicationInfo, urgent: false },
    Rule { keywords: HEALTH_ADVICE_KEYWORDS, category: AssistantCategory::HealthAdvice, urgent: false },
    Rule { keywords: MENTAL_HEALTH_KEYWORDS, category: AssistantCategory::MentalHealth, urgent: false },
];

/// Inflections a keyword may carry and still count as the same word.
const SUFFIXES: &str = "(?:s|es|ed|ing|ion)?";

/// One whole-word pattern per rule, in `RULES` order.
fn rule_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                let alternatives: Vec<String> = rule.keywords.iter().map(|k| regex::escape(k)).collect();
                let pattern = format!(r"\b(?:{}){}\b", alternatives.join("|"), SUFFIXES);
                Regex::new(&pattern).expect("keyword pattern is valid")
            })
            .collect()
    })
}

pub fn classify(input: &str) -> Classification {
    let text = input.to_lowercase();

    RULES
        .iter()
        .zip(rule_patterns())
        .find(|(_, pattern)| pattern.is_match(&text))
        .map(|(rule, _)| Classification { category: rule.category, urgent: rule.urgent })
        .unwrap_or_else(Classification::general)
}
