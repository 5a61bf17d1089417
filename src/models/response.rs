use serde::{Deserialize, Serialize};

/// Answer event delivered by the questionnaire UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvent {
    pub question_id: String,
    pub option_index: Option<usize>,
    pub option_text: Option<String>,
    pub free_text: Option<String>,
}

/// Stored answer; doubles as the `psychometric_responses.csv` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResponse {
    pub session_id: Option<String>,
    pub t_ms: Option<u64>,
    pub question_id: String,
    pub option_index: Option<usize>,
    pub option_text: Option<String>,
    pub free_text: Option<String>,
}
