// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::{PublicQuestion, Question, QuestionRow},
        quiz::{Quiz, QuizRow, QuizSession, QuizStatus, QuizSummary},
    },
    services::{ranking::user_quiz_stats, shuffle::comparator_shuffle},
    utils::jwt::Claims,
};

/// Quiz columns plus a live question count.
pub(crate) const QUIZ_WITH_COUNT: &str = r#"
    SELECT
        q.*,
        (SELECT COUNT(*) FROM academy_quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count
    FROM academy_quizzes q
"#;

/// Loads a quiz by id. With `published_only`, drafts and archived quizzes
/// read as missing.
pub(crate) async fn load_quiz(pool: &PgPool, id: Uuid, published_only: bool) -> Result<Quiz, AppError> {
    let row = sqlx::query_as::<_, QuizRow>(&format!("{} WHERE q.id = $1", QUIZ_WITH_COUNT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch quiz {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let quiz = Quiz::from(row);
    if published_only && quiz.status != QuizStatus::Published {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    Ok(quiz)
}

/// Loads a quiz's questions in display order.
pub(crate) async fn load_questions(pool: &PgPool, quiz_id: Uuid) -> Result<Vec<Question>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        r#"
        SELECT *
        FROM academy_quiz_questions
        WHERE quiz_id = $1
        ORDER BY display_order ASC, created_at ASC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions for quiz {}: {:?}", quiz_id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(rows.into_iter().map(Question::from).collect())
}

/// Lists published quizzes, newest first, with the caller's best score and
/// attempt count on each.
pub async fn list_published_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quizzes = sqlx::query_as::<_, QuizRow>(&format!(
        "{} WHERE q.status = 'published' ORDER BY q.updated_at DESC",
        QUIZ_WITH_COUNT
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch published quizzes: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let scores = sqlx::query_as::<_, (Uuid, i32)>(
        r#"
        SELECT quiz_id, score
        FROM academy_quiz_attempts
        WHERE user_id = $1 AND score IS NOT NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempt scores: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let stats = user_quiz_stats(&scores);

    let summaries: Vec<QuizSummary> = quizzes
        .into_iter()
        .map(|row| {
            let quiz = Quiz::from(row);
            let mine = stats.get(&quiz.id);
            QuizSummary {
                user_best_score: mine.map(|s| s.best_score),
                user_attempts_count: mine.map(|s| s.attempts).unwrap_or(0),
                quiz,
            }
        })
        .collect();

    Ok(Json(summaries))
}

/// Returns a published quiz ready to play. Correct answers are withheld;
/// shuffled quizzes get a fresh question order on every call.
pub async fn get_quiz_session(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut quiz = load_quiz(&pool, id, true).await?;
    let mut questions = load_questions(&pool, id).await?;

    if quiz.shuffle_questions {
        comparator_shuffle(&mut questions, &mut rand::thread_rng());
    }
    quiz.question_count = questions.len() as i64;

    Ok(Json(QuizSession {
        quiz,
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
    }))
}
