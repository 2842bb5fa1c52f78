// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const QUESTIONS_TABLE: &str = "academy_quiz_questions";

/// Raw row of the `academy_quiz_questions` table.
///
/// Optional columns default to `None` when a deployment's schema lacks them,
/// and are normalized by [`Question::from`].
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    #[sqlx(default)]
    pub question_type: Option<String>,
    #[sqlx(default)]
    pub options: Option<serde_json::Value>,
    #[sqlx(default)]
    pub correct_option_index: Option<i32>,
    #[sqlx(default)]
    pub explanation: Option<String>,
    #[sqlx(default)]
    pub points: Option<i32>,
    #[sqlx(default)]
    pub display_order: Option<i32>,
    #[sqlx(default)]
    pub image_url: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
        }
    }

    /// Unknown or missing values read as multiple choice.
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw {
            Some("true_false") => QuestionType::TrueFalse,
            _ => QuestionType::MultipleChoice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// A question as served to clients and fed to the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<QuestionOption>,
    /// Identifier of the correct option (the stringified option index).
    pub correct_answer: String,
    pub correct_option_index: i32,
    pub explanation: Option<String>,
    pub points: i32,
    pub display_order: i32,
    pub image_url: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        let options = match row.options {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| QuestionOption {
                    id: index.to_string(),
                    text: match item {
                        serde_json::Value::String(text) => text,
                        other => other.to_string(),
                    },
                })
                .collect(),
            _ => Vec::new(),
        };
        let correct_index = row.correct_option_index.unwrap_or(0);

        Question {
            id: row.id,
            quiz_id: row.quiz_id,
            question_text: row.question_text,
            question_type: QuestionType::from_db(row.question_type.as_deref()),
            options,
            correct_answer: correct_index.to_string(),
            correct_option_index: correct_index,
            explanation: row.explanation,
            points: row.points.unwrap_or(1),
            display_order: row.display_order.unwrap_or(0),
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

/// DTO for sending a question to a learner mid-quiz (excludes the answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<QuestionOption>,
    pub points: i32,
    pub display_order: i32,
    pub image_url: Option<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            options: q.options,
            points: q.points,
            display_order: q.display_order,
            image_url: q.image_url,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_option_index: i32,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub points: Option<i32>,
    pub display_order: Option<i32>,
    #[validate(length(max = 2048))]
    pub image_url: Option<String>,
}

impl CreateQuestionRequest {
    /// Field validation plus the option/index invariant.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        check_index(self.correct_option_index, self.options.len()).map_err(|e| {
            let mut errors = validator::ValidationErrors::new();
            errors.add("correct_option_index", e);
            errors
        })
    }
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    pub correct_option_index: Option<i32>,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub points: Option<i32>,
    pub display_order: Option<i32>,
    #[validate(length(max = 2048))]
    pub image_url: Option<String>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none()
            && self.question_type.is_none()
            && self.options.is_none()
            && self.correct_option_index.is_none()
            && self.explanation.is_none()
            && self.points.is_none()
            && self.display_order.is_none()
            && self.image_url.is_none()
    }
}

/// DTO for bulk reordering: question ids in their new display order.
#[derive(Debug, Deserialize, Validate)]
pub struct ReorderQuestionsRequest {
    #[validate(length(min = 1, max = 500))]
    pub ordered_ids: Vec<Uuid>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    for opt in options {
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// The correct index must point at one of `option_count` options.
pub fn check_index(index: i32, option_count: usize) -> Result<(), validator::ValidationError> {
    if index < 0 || index as usize >= option_count {
        return Err(validator::ValidationError::new("correct_option_index_out_of_range"));
    }
    Ok(())
}
