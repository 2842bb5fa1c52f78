// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::quiz::{QUIZ_WITH_COUNT, load_questions, load_quiz},
    models::{
        question::{
            CreateQuestionRequest, QUESTIONS_TABLE, Question, QuestionRow, ReorderQuestionsRequest,
            UpdateQuestionRequest, check_index,
        },
        quiz::{
            CreateQuizRequest, ImportQuizRequest, QUIZZES_TABLE, Quiz, QuizDetail, QuizRow,
            QuizStatus, UpdateQuizRequest,
        },
    },
    storage::ImageStore,
    utils::{
        columns::{ColumnValue, Payload, insert_returning, update_returning},
        html::{clean_html, clean_optional},
        jwt::Claims,
    },
};

/// Lists every quiz regardless of status, most recently updated first.
/// Admin only.
pub async fn list_quizzes(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, QuizRow>(&format!("{} ORDER BY q.updated_at DESC", QUIZ_WITH_COUNT))
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quizzes: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let quizzes: Vec<Quiz> = rows.into_iter().map(Quiz::from).collect();
    Ok(Json(quizzes))
}

/// Returns one quiz with its full questions (answer keys included).
/// Admin only.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(&pool, id, false).await?;
    let questions = load_questions(&pool, id).await?;
    Ok(Json(QuizDetail { quiz, questions }))
}

fn new_quiz_payload(req: CreateQuizRequest, status: QuizStatus, created_by: String) -> Payload {
    let now = Utc::now();
    let published_at = (status == QuizStatus::Published).then_some(now);

    Payload::new(QUIZZES_TABLE)
        .set("title", ColumnValue::Text(Some(req.title.trim().to_string())))
        .set("description", ColumnValue::Text(clean_optional(req.description)))
        .set("time_limit_minutes", ColumnValue::Int(req.time_limit_minutes))
        .set("passing_score", ColumnValue::Int(req.passing_score))
        .set("shuffle_questions", ColumnValue::Bool(Some(req.shuffle_questions.unwrap_or(false))))
        .set("show_correct_answers", ColumnValue::Bool(Some(req.show_correct_answers.unwrap_or(true))))
        .set("status", ColumnValue::Text(Some(status.as_str().to_string())))
        .set("published_at", ColumnValue::Timestamp(published_at))
        .set("created_by", ColumnValue::Text(Some(created_by)))
}

/// Creates a new quiz. Quizzes always start as drafts.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = pool.acquire().await?;
    let row: QuizRow = insert_returning(
        &mut *conn,
        new_quiz_payload(payload, QuizStatus::Draft, claims.sub.clone()),
        &config.capabilities,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {}", e);
        e
    })?;

    tracing::info!(quiz_id = %row.id, "Quiz created");
    Ok((StatusCode::CREATED, Json(Quiz::from(row))))
}

/// Moves a quiz from `current` to `next`. Becoming published stamps
/// `published_at`, going back to draft clears it, anything else keeps it.
fn status_payload(next: QuizStatus, current: QuizStatus) -> Payload {
    let payload = Payload::new(QUIZZES_TABLE);
    if next == current {
        return payload;
    }

    let payload = payload.set("status", ColumnValue::Text(Some(next.as_str().to_string())));
    match next {
        QuizStatus::Published => payload.set("published_at", ColumnValue::Timestamp(Some(Utc::now()))),
        QuizStatus::Draft => payload.set("published_at", ColumnValue::Timestamp(None)),
        QuizStatus::Archived => payload,
    }
}

async fn apply_quiz_update(
    pool: &PgPool,
    config: &Config,
    id: Uuid,
    payload: Payload,
) -> Result<Quiz, AppError> {
    let payload = payload.set("updated_at", ColumnValue::Timestamp(Some(Utc::now())));
    let mut conn = pool.acquire().await?;
    update_returning::<QuizRow>(&mut *conn, payload, id, &config.capabilities)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;
    drop(conn);

    load_quiz(pool, id, false).await
}

/// Updates a quiz by ID. Fields are optional.
/// Admin only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.is_empty() {
        return Ok(Json(load_quiz(&pool, id, false).await?));
    }

    let mut update = match payload.status {
        Some(status) => {
            let current = load_quiz(&pool, id, false).await?;
            status_payload(status, current.status)
        }
        None => Payload::new(QUIZZES_TABLE),
    };
    update = update
        .set_some("title", payload.title.map(|t| t.trim().to_string()), ColumnValue::Text)
        .set_some("description", payload.description.map(|d| clean_html(&d)), ColumnValue::Text)
        .set_some("time_limit_minutes", payload.time_limit_minutes, ColumnValue::Int)
        .set_some("passing_score", payload.passing_score, ColumnValue::Int)
        .set_some("shuffle_questions", payload.shuffle_questions, ColumnValue::Bool)
        .set_some("show_correct_answers", payload.show_correct_answers, ColumnValue::Bool);

    let quiz = apply_quiz_update(&pool, &config, id, update).await.map_err(|e| {
        tracing::error!("Failed to update quiz {}: {}", id, e);
        e
    })?;
    Ok(Json(quiz))
}

/// Publishes a quiz, making it visible to learners.
/// Admin only.
pub async fn publish_quiz(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let current = load_quiz(&pool, id, false).await?;
    let update = status_payload(QuizStatus::Published, current.status);
    let quiz = apply_quiz_update(&pool, &config, id, update).await?;
    tracing::info!(quiz_id = %id, "Quiz published");
    Ok(Json(quiz))
}

/// Moves a quiz back to draft.
/// Admin only.
pub async fn unpublish_quiz(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let current = load_quiz(&pool, id, false).await?;
    let update = status_payload(QuizStatus::Draft, current.status);
    let quiz = apply_quiz_update(&pool, &config, id, update).await?;
    tracing::info!(quiz_id = %id, "Quiz unpublished");
    Ok(Json(quiz))
}

/// Deletes a quiz by ID, together with its questions and attempts.
/// Admin only.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM academy_quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    tracing::info!(quiz_id = %id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `display_order` is taken as given; callers resolve the request's own value.
fn new_question_payload(quiz_id: Uuid, req: CreateQuestionRequest, display_order: i32) -> Payload {
    Payload::new(QUESTIONS_TABLE)
        .set("quiz_id", ColumnValue::Uuid(quiz_id))
        .set("question_text", ColumnValue::Text(Some(clean_html(&req.question_text))))
        .set("question_type", ColumnValue::Text(Some(req.question_type.as_str().to_string())))
        .set("options", ColumnValue::Json(serde_json::json!(req.options)))
        .set("correct_option_index", ColumnValue::Int(Some(req.correct_option_index)))
        .set("explanation", ColumnValue::Text(clean_optional(req.explanation)))
        .set("points", ColumnValue::Int(Some(req.points.unwrap_or(1))))
        .set("display_order", ColumnValue::Int(Some(display_order)))
        .set("image_url", ColumnValue::Text(req.image_url))
}

/// Display order that appends after the quiz's current last question.
async fn next_display_order(pool: &PgPool, quiz_id: Uuid) -> Result<i32, AppError> {
    let next: Option<i32> = sqlx::query_scalar(
        "SELECT MAX(display_order) + 1 FROM academy_quiz_questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(pool)
    .await?;
    Ok(next.unwrap_or(0))
}

/// Imports a quiz with all of its questions in one transaction. Questions
/// are ordered by their position in the document.
/// Admin only.
pub async fn import_quiz(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ImportQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate_all()?;

    let ImportQuizRequest { quiz, questions } = payload;
    let status = quiz.status.unwrap_or_default();

    let mut tx = pool.begin().await?;
    let row: QuizRow = insert_returning(
        &mut *tx,
        new_quiz_payload(quiz.fields, status, claims.sub.clone()),
        &config.capabilities,
    )
    .await?;
    let quiz_id = row.id;

    for (index, question) in questions.into_iter().enumerate() {
        insert_returning::<QuestionRow>(
            &mut *tx,
            new_question_payload(quiz_id, question, index as i32),
            &config.capabilities,
        )
        .await
        .map_err(|e| {
            // Dropping `tx` rolls back the quiz and earlier questions.
            tracing::error!(%quiz_id, index, "Import failed: {}", e);
            e
        })?;
    }
    tx.commit().await?;

    let quiz = load_quiz(&pool, quiz_id, false).await?;
    tracing::info!(%quiz_id, questions = quiz.question_count, "Quiz imported");
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Lists a quiz's questions in display order.
/// Admin only.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_questions(&pool, quiz_id).await?))
}

/// Creates a new question, appended to the end unless an order is given.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate_all()?;
    load_quiz(&pool, quiz_id, false).await?;

    let display_order = match payload.display_order {
        Some(order) => order,
        None => next_display_order(&pool, quiz_id).await?,
    };
    let mut conn = pool.acquire().await?;
    let row: QuestionRow = insert_returning(
        &mut *conn,
        new_question_payload(quiz_id, payload, display_order),
        &config.capabilities,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {}", e);
        e
    })?;

    Ok((StatusCode::CREATED, Json(Question::from(row))))
}

/// Updates a question by ID. Fields are optional; the correct index is
/// checked against the options the question will have afterwards.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = sqlx::query_as::<_, QuestionRow>("SELECT * FROM academy_quiz_questions WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .map(Question::from)
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if payload.is_empty() {
        return Ok(Json(current));
    }

    let option_count = payload
        .options
        .as_ref()
        .map(Vec::len)
        .unwrap_or(current.options.len());
    let index = payload.correct_option_index.unwrap_or(current.correct_option_index);
    if let Err(e) = check_index(index, option_count) {
        let mut errors = validator::ValidationErrors::new();
        errors.add("correct_option_index", e);
        return Err(errors.into());
    }

    let update = Payload::new(QUESTIONS_TABLE)
        .set_some("question_text", payload.question_text.map(|t| clean_html(&t)), ColumnValue::Text)
        .set_some(
            "question_type",
            payload.question_type.map(|t| t.as_str().to_string()),
            ColumnValue::Text,
        )
        .set_some("correct_option_index", payload.correct_option_index, ColumnValue::Int)
        .set_some("explanation", payload.explanation.map(|e| clean_html(&e)), ColumnValue::Text)
        .set_some("points", payload.points, ColumnValue::Int)
        .set_some("display_order", payload.display_order, ColumnValue::Int)
        .set_some("image_url", payload.image_url, ColumnValue::Text);
    let update = match payload.options {
        Some(options) => update.set("options", ColumnValue::Json(serde_json::json!(options))),
        None => update,
    };

    let mut conn = pool.acquire().await?;
    let row = update_returning::<QuestionRow>(&mut *conn, update, id, &config.capabilities)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question {}: {}", id, e);
            e
        })?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(Question::from(row)))
}

/// Deletes a quiz question by ID, and its image if it had one.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    State(images): State<Arc<dyn ImageStore>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deleted: Option<Option<String>> = sqlx::query_scalar(
        "DELETE FROM academy_quiz_questions WHERE id = $1 RETURNING image_url",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to delete question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let image_url = deleted.ok_or(AppError::NotFound("Question not found".to_string()))?;
    if let Some(url) = image_url {
        images.delete(&url).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Rewrites the display order of a quiz's questions to match `ordered_ids`.
///
/// All updates run in one transaction: either every question moves or none
/// does. An id that is not a question of this quiz aborts the whole batch.
/// Admin only.
pub async fn reorder_questions(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<ReorderQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;
    for (index, question_id) in payload.ordered_ids.iter().enumerate() {
        let result = sqlx::query(
            "UPDATE academy_quiz_questions SET display_order = $1 WHERE id = $2 AND quiz_id = $3",
        )
        .bind(index as i32)
        .bind(question_id)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to reorder question {}: {:?}", question_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back the updates applied so far.
            return Err(AppError::NotFound(format!(
                "Question {} not found in quiz",
                question_id
            )));
        }
    }
    tx.commit().await?;

    tracing::info!(%quiz_id, count = payload.ordered_ids.len(), "Questions reordered");
    Ok(Json(load_questions(&pool, quiz_id).await?))
}

/// Uploads an image for a quiz from the multipart field `file`.
/// Admin only.
pub async fn upload_image(
    State(pool): State<PgPool>,
    State(images): State<Arc<dyn ImageStore>>,
    Path(quiz_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    load_quiz(&pool, quiz_id, false).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(AppError::BadRequest("Only image uploads are accepted".to_string()));
        }

        let file_name = field.file_name().unwrap_or("image.png").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Empty file".to_string()));
        }

        let stored = images.upload(quiz_id, &file_name, &bytes).await?;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(AppError::BadRequest("Missing 'file' field".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub url: String,
}

/// Deletes an uploaded image by its public URL.
/// Admin only.
pub async fn delete_image(
    State(images): State<Arc<dyn ImageStore>>,
    Json(payload): Json<DeleteImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = images.delete(&payload.url).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionType;

    fn create_request() -> CreateQuizRequest {
        CreateQuizRequest {
            title: "  Rust ownership  ".into(),
            description: Some("<b>Borrowing</b><script>x()</script>".into()),
            time_limit_minutes: Some(15),
            passing_score: None,
            shuffle_questions: None,
            show_correct_answers: None,
        }
    }

    #[test]
    fn test_new_quiz_payload_defaults() {
        let payload = new_quiz_payload(create_request(), QuizStatus::Draft, "admin".into());

        assert_eq!(
            payload.column_names(),
            vec![
                "title",
                "description",
                "time_limit_minutes",
                "passing_score",
                "shuffle_questions",
                "show_correct_answers",
                "status",
                "published_at",
                "created_by",
            ]
        );
        let expected = Payload::new(QUIZZES_TABLE)
            .set("title", ColumnValue::Text(Some("Rust ownership".into())))
            .set("description", ColumnValue::Text(Some("<b>Borrowing</b>".into())))
            .set("time_limit_minutes", ColumnValue::Int(Some(15)))
            .set("passing_score", ColumnValue::Int(None))
            .set("shuffle_questions", ColumnValue::Bool(Some(false)))
            .set("show_correct_answers", ColumnValue::Bool(Some(true)))
            .set("status", ColumnValue::Text(Some("draft".into())))
            .set("published_at", ColumnValue::Timestamp(None))
            .set("created_by", ColumnValue::Text(Some("admin".into())));
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_imported_published_quiz_gets_timestamp() {
        let payload = new_quiz_payload(create_request(), QuizStatus::Published, "import".into());

        assert_eq!(
            payload.get("status"),
            Some(&ColumnValue::Text(Some("published".into())))
        );
        assert!(matches!(
            payload.get("published_at"),
            Some(ColumnValue::Timestamp(Some(_)))
        ));
    }

    #[test]
    fn test_new_question_payload() {
        let req = CreateQuestionRequest {
            question_text: "Is <i>Rust</i> memory safe?".into(),
            question_type: QuestionType::TrueFalse,
            options: vec!["True".into(), "False".into()],
            correct_option_index: 0,
            explanation: None,
            points: None,
            display_order: None,
            image_url: None,
        };
        let quiz_id = Uuid::new_v4();

        let payload = new_question_payload(quiz_id, req, 4);
        let expected = Payload::new(QUESTIONS_TABLE)
            .set("quiz_id", ColumnValue::Uuid(quiz_id))
            .set("question_text", ColumnValue::Text(Some("Is <i>Rust</i> memory safe?".into())))
            .set("question_type", ColumnValue::Text(Some("true_false".into())))
            .set("options", ColumnValue::Json(serde_json::json!(["True", "False"])))
            .set("correct_option_index", ColumnValue::Int(Some(0)))
            .set("explanation", ColumnValue::Text(None))
            .set("points", ColumnValue::Int(Some(1)))
            .set("display_order", ColumnValue::Int(Some(4)))
            .set("image_url", ColumnValue::Text(None));
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_import_position_overrides_requested_order() {
        let req: CreateQuestionRequest = serde_json::from_value(serde_json::json!({
            "question_text": "Capital of Italy?",
            "options": ["Rome", "Milan"],
            "correct_option_index": 0,
            "display_order": 9
        }))
        .unwrap();

        let payload = new_question_payload(Uuid::new_v4(), req, 0);
        assert_eq!(payload.get("display_order"), Some(&ColumnValue::Int(Some(0))));
    }

    #[test]
    fn test_status_change_to_draft_clears_publication() {
        let draft = status_payload(QuizStatus::Draft, QuizStatus::Published);
        assert_eq!(
            draft,
            Payload::new(QUIZZES_TABLE)
                .set("status", ColumnValue::Text(Some("draft".into())))
                .set("published_at", ColumnValue::Timestamp(None))
        );
    }

    #[test]
    fn test_status_change_to_published_stamps_time() {
        let published = status_payload(QuizStatus::Published, QuizStatus::Draft);
        assert_eq!(
            published.get("status"),
            Some(&ColumnValue::Text(Some("published".into())))
        );
        assert!(matches!(
            published.get("published_at"),
            Some(ColumnValue::Timestamp(Some(_)))
        ));
    }

    #[test]
    fn test_unchanged_status_keeps_publication_time() {
        let republish = status_payload(QuizStatus::Published, QuizStatus::Published);
        assert!(republish.is_empty());

        let archived = status_payload(QuizStatus::Archived, QuizStatus::Published);
        assert_eq!(
            archived.column_names(),
            vec!["status"],
            "archiving leaves published_at untouched"
        );
    }
}
