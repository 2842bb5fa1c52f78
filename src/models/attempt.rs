// src/models/attempt.rs

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::question::Question;

/// Raw row of the `academy_quiz_attempts` table, optionally joined with the
/// quiz title.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score: Option<i32>,
    #[sqlx(default)]
    pub total_points: Option<i32>,
    #[sqlx(default)]
    pub total_questions: Option<i32>,
    /// Serialized JSON array of answer records.
    #[sqlx(default)]
    pub answers: Option<String>,
    #[sqlx(default)]
    pub time_spent_seconds: Option<i32>,
    #[sqlx(default)]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[sqlx(default)]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[sqlx(default)]
    pub quiz_title: Option<String>,
}

/// One learner answer, frozen at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: Uuid,
    /// Selected option id; `None` when the question was left unanswered.
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub selected_option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_index: Option<u32>,
    pub is_correct: bool,
}

/// Older rows store unanswered questions as an empty string.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Parses a stored answers blob. Absent, blank, malformed or non-array
/// input yields an empty list.
pub fn parse_answers(raw: Option<&str>) -> Vec<AnswerRecord> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str::<Vec<AnswerRecord>>(raw).unwrap_or_default()
}

pub fn serialize_answers(records: &[AnswerRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string(records)
}

#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score: Option<i32>,
    /// Explicit total points, falling back to the question count.
    pub total_points: Option<i32>,
    pub total_questions: Option<i32>,
    pub answers: Vec<AnswerRecord>,
    pub time_spent_seconds: Option<i32>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_title: Option<String>,
}

impl Attempt {
    /// Denominator used for the result percentage.
    pub fn denominator(&self) -> i64 {
        self.total_points
            .or(self.total_questions)
            .map(i64::from)
            .unwrap_or(1)
    }
}

impl From<AttemptRow> for Attempt {
    fn from(row: AttemptRow) -> Self {
        Attempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            score: row.score,
            total_points: row.total_points.or(row.total_questions),
            total_questions: row.total_questions,
            answers: parse_answers(row.answers.as_deref()),
            time_spent_seconds: row.time_spent_seconds,
            started_at: row.started_at,
            completed_at: row.completed_at.or(row.created_at),
            created_at: row.created_at,
            quiz_title: row.quiz_title,
        }
    }
}

/// DTO for submitting an attempt.
/// Key: question id, value: selected option id.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: HashMap<Uuid, String>,
}

/// Scored attempt as shown on the results screen.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: Attempt,
    pub percentage: i64,
    pub passed: bool,
}

#[derive(Debug, Serialize)]
pub struct AttemptQuizRef {
    pub id: Uuid,
    pub title: String,
    pub show_correct_answers: bool,
}

/// Attempt review: the attempt, its quiz and the full questions.
#[derive(Debug, Serialize)]
pub struct AttemptDetail {
    pub attempt: Attempt,
    pub quiz: AttemptQuizRef,
    pub questions: Vec<Question>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(selected: Option<&str>, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: Uuid::new_v4(),
            selected_option: selected.map(str::to_string),
            selected_index: selected.and_then(|s| s.parse().ok()),
            is_correct,
        }
    }

    #[test]
    fn test_answers_survive_storage() {
        let records = vec![record(Some("2"), true), record(None, false), record(Some("0"), false)];

        let blob = serialize_answers(&records).unwrap();
        assert_eq!(parse_answers(Some(&blob)), records);
    }

    #[test]
    fn test_malformed_answers_are_empty() {
        assert!(parse_answers(None).is_empty());
        assert!(parse_answers(Some("")).is_empty());
        assert!(parse_answers(Some("   ")).is_empty());
        assert!(parse_answers(Some("{not json")).is_empty());
        assert!(parse_answers(Some(r#"{"question_id": "x"}"#)).is_empty());
        assert!(parse_answers(Some("42")).is_empty());
    }

    #[test]
    fn test_legacy_blank_selection_reads_as_unanswered() {
        let id = Uuid::new_v4();
        let blob = format!(r#"[{{"question_id":"{id}","selected_option":"","is_correct":false}}]"#);

        let parsed = parse_answers(Some(&blob));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].selected_option, None);
        assert_eq!(parsed[0].question_id, id);
    }

    #[test]
    fn test_denominator_falls_back_to_question_count() {
        let row = AttemptRow {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            score: Some(3),
            total_points: None,
            total_questions: Some(4),
            answers: Some("garbage".into()),
            time_spent_seconds: None,
            started_at: None,
            completed_at: None,
            created_at: None,
            quiz_title: None,
        };

        let attempt = Attempt::from(row);
        assert_eq!(attempt.total_points, Some(4));
        assert_eq!(attempt.denominator(), 4);
        assert!(attempt.answers.is_empty());
    }
}
