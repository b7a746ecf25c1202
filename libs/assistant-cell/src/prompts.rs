use crate::models::{AssistantCategory, Classification};

const BASE_PROMPT: &str = "You are MediConnect's virtual health assistant. \
Be warm, concise and accurate. You do not diagnose or prescribe; encourage the \
user to consult a qualified doctor for medical decisions.";

const URGENT_PROMPT: &str = "The user may be describing a medical emergency. \
Start your answer by telling them to contact local emergency services or go to \
the nearest emergency department immediately, then give brief safety guidance.";

fn category_prompt(category: AssistantCategory) -> &'static str {
    match category {
        AssistantCategory::SymptomAnalysis => {
            "Help the user describe their symptoms, mention possible common causes \
             without diagnosing, and explain when to see a doctor."
        }
        AssistantCategory::AppointmentBooking => {
            "Help the user book, reschedule or cancel appointments on MediConnect. \
             Explain that appointments are requested from the Book Appointment page \
             and confirmed by the doctor."
        }
        AssistantCategory::MedicationInfo => {
            "Give general information about medications, common uses and side \
             effects. Never recommend doses; refer dosing questions to a doctor or pharmacist."
        }
        AssistantCategory::HealthAdvice => {
            "Give practical, evidence-based advice on nutrition, exercise, sleep and \
             healthy habits."
        }
        AssistantCategory::MentalHealth => {
            "Respond with empathy. Offer supportive coping strategies and suggest \
             speaking with a mental health professional when appropriate."
        }
        AssistantCategory::GeneralChat => {
            "Answer general questions about MediConnect and health topics."
        }
    }
}

pub fn system_prompt(classification: &Classification) -> String {
    let mut prompt = format!("{} {}", BASE_PROMPT, category_prompt(classification.category));
    if classification.urgent {
        prompt.push(' ');
        prompt.push_str(URGENT_PROMPT);
    }
    prompt
}
