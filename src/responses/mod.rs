use std::collections::HashMap;

use serde_json::Value;

use crate::export::Record;
use crate::models::{AnswerEvent, QuestionResponse};

/// Questionnaire answers keyed by question id, plus demographics.
#[derive(Debug, Default, Clone)]
pub struct ResponseStore {
    answers: HashMap<String, QuestionResponse>,
    demographics: Record,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A later answer to the same question replaces the earlier one.
    pub fn record(&mut self, event: AnswerEvent, session_id: Option<String>, t_ms: Option<u64>) {
        let response = QuestionResponse {
            session_id,
            t_ms,
            question_id: event.question_id.clone(),
            option_index: event.option_index,
            option_text: event.option_text,
            free_text: event.free_text,
        };
        self.answers.insert(event.question_id, response);
    }

    pub fn get(&self, question_id: &str) -> Option<&QuestionResponse> {
        self.answers.get(question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Answers ordered by timestamp, then question id. Untimed answers first.
    pub fn ordered(&self) -> Vec<QuestionResponse> {
        let mut rows: Vec<QuestionResponse> = self.answers.values().cloned().collect();
        rows.sort_by(|a, b| {
            a.t_ms
                .cmp(&b.t_ms)
                .then_with(|| a.question_id.cmp(&b.question_id))
        });
        rows
    }

    /// Replace the demographics fields, keeping the caller's field order.
    pub fn set_demographics<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.demographics = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
    }

    /// Demographics row with `session_id` in front. Empty when nothing was
    /// entered.
    pub fn demographics_record(&self, session_id: Option<&str>) -> Record {
        if self.demographics.is_empty() {
            return Record::new();
        }
        let mut record = Record::new();
        record.insert(
            "session_id".into(),
            session_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        for (key, value) in &self.demographics {
            if key != "session_id" {
                record.insert(key.clone(), value.clone());
            }
        }
        record
    }

    pub fn clear(&mut self) {
        self.answers.clear();
        self.demographics.clear();
    }
}
