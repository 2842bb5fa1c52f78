// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::config::DEFAULT_PASSING_SCORE;
use crate::models::question::{CreateQuestionRequest, Question, PublicQuestion};

pub const QUIZZES_TABLE: &str = "academy_quizzes";

/// Raw row of the `academy_quizzes` table, optionally joined with a
/// `question_count` aggregate.
#[derive(Debug, Clone, FromRow)]
pub struct QuizRow {
    pub id: Uuid,
    pub title: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub status: String,
    #[sqlx(default)]
    pub time_limit_minutes: Option<i32>,
    #[sqlx(default)]
    pub passing_score: Option<i32>,
    #[sqlx(default)]
    pub shuffle_questions: Option<bool>,
    #[sqlx(default)]
    pub show_correct_answers: Option<bool>,
    pub created_by: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[sqlx(default)]
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    #[sqlx(default)]
    pub question_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl QuizStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Published => "published",
            QuizStatus::Archived => "archived",
        }
    }

    /// Unknown values read as draft.
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "published" => QuizStatus::Published,
            "archived" => QuizStatus::Archived,
            _ => QuizStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: QuizStatus,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: Option<i32>,
    pub shuffle_questions: bool,
    pub show_correct_answers: bool,
    pub created_by: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub question_count: i64,
}

impl Quiz {
    /// Passing threshold as a percentage.
    pub fn passing_threshold(&self) -> i64 {
        self.passing_score
            .map(i64::from)
            .unwrap_or(DEFAULT_PASSING_SCORE)
    }
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Quiz {
            id: row.id,
            title: row.title,
            description: row.description,
            status: QuizStatus::from_db(&row.status),
            time_limit_minutes: row.time_limit_minutes,
            passing_score: row.passing_score,
            shuffle_questions: row.shuffle_questions.unwrap_or(false),
            show_correct_answers: row.show_correct_answers.unwrap_or(true),
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
            question_count: row.question_count.unwrap_or(0),
        }
    }
}

/// Quiz list item for a learner, with their own progress on it.
#[derive(Debug, Serialize)]
pub struct QuizSummary {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub user_best_score: Option<i64>,
    pub user_attempts_count: u32,
}

/// A published quiz ready to be played.
#[derive(Debug, Serialize)]
pub struct QuizSession {
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// Admin view of a quiz with its full questions.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// DTO for creating a new quiz. New quizzes always start as drafts.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,
    pub status: Option<QuizStatus>,
}

impl UpdateQuizRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.time_limit_minutes.is_none()
            && self.passing_score.is_none()
            && self.shuffle_questions.is_none()
            && self.show_correct_answers.is_none()
            && self.status.is_none()
    }
}

/// Quiz header inside an import document.
#[derive(Debug, Deserialize, Validate)]
pub struct ImportQuizHeader {
    #[validate(nested)]
    #[serde(flatten)]
    pub fields: CreateQuizRequest,
    pub status: Option<QuizStatus>,
}

/// A quiz together with its questions, in the shape of the import files.
#[derive(Debug, Deserialize, Validate)]
pub struct ImportQuizRequest {
    #[validate(nested)]
    pub quiz: ImportQuizHeader,
    #[validate(length(min = 1, max = 500))]
    pub questions: Vec<CreateQuestionRequest>,
}

impl ImportQuizRequest {
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        for question in &self.questions {
            question.validate_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> QuizRow {
        QuizRow {
            id: Uuid::new_v4(),
            title: "Rust basics".into(),
            description: None,
            status: "weird".into(),
            time_limit_minutes: None,
            passing_score: None,
            shuffle_questions: None,
            show_correct_answers: None,
            created_by: "admin".into(),
            created_at: None,
            updated_at: None,
            published_at: None,
            question_count: None,
        }
    }

    #[test]
    fn test_quiz_defaults() {
        let quiz = Quiz::from(row());

        assert_eq!(quiz.status, QuizStatus::Draft);
        assert!(!quiz.shuffle_questions);
        assert!(quiz.show_correct_answers);
        assert_eq!(quiz.question_count, 0);
        assert_eq!(quiz.passing_threshold(), 60);
    }

    #[test]
    fn test_status_round_trip_through_db_text() {
        for status in [QuizStatus::Draft, QuizStatus::Published, QuizStatus::Archived] {
            assert_eq!(QuizStatus::from_db(status.as_str()), status);
        }
    }

    #[test]
    fn test_import_document_parses() {
        let doc = serde_json::json!({
            "quiz": {
                "title": "Capitals",
                "description": "Europe",
                "shuffle_questions": true,
                "status": "published"
            },
            "questions": [
                {
                    "question_text": "Capital of Italy?",
                    "options": ["Rome", "Milan"],
                    "correct_option_index": 0
                },
                {
                    "question_text": "Paris is in France",
                    "question_type": "true_false",
                    "options": ["True", "False"],
                    "correct_option_index": 0,
                    "points": 2
                }
            ]
        });

        let req: ImportQuizRequest = serde_json::from_value(doc).unwrap();
        assert!(req.validate_all().is_ok());
        assert_eq!(req.quiz.status, Some(QuizStatus::Published));
        assert_eq!(req.quiz.fields.shuffle_questions, Some(true));
        assert_eq!(req.questions.len(), 2);
    }

    #[test]
    fn test_import_rejects_bad_question() {
        let doc = serde_json::json!({
            "quiz": { "title": "Broken" },
            "questions": [
                { "question_text": "?", "options": ["A"], "correct_option_index": 3 }
            ]
        });

        let req: ImportQuizRequest = serde_json::from_value(doc).unwrap();
        assert!(req.validate_all().is_err());
    }

    #[test]
    fn test_import_requires_questions() {
        let doc = serde_json::json!({
            "quiz": { "title": "Empty" },
            "questions": []
        });

        let req: ImportQuizRequest = serde_json::from_value(doc).unwrap();
        let errors = req.validate_all().unwrap_err();
        assert!(errors.field_errors().contains_key("questions"));
    }
}
