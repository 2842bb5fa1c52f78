// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::quiz::{load_questions, load_quiz},
    models::attempt::{
        Attempt, AttemptDetail, AttemptQuizRef, AttemptResult, AttemptRow, SubmitAttemptRequest,
        serialize_answers,
    },
    services::scoring::{passed, percentage, score_attempt},
    utils::jwt::Claims,
};

/// Starts a new attempt on a published quiz. The score stays empty until
/// the attempt is submitted.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    load_quiz(&pool, quiz_id, true).await?;

    let row = sqlx::query_as::<_, AttemptRow>(
        r#"
        INSERT INTO academy_quiz_attempts (quiz_id, user_id, total_questions, answers, started_at)
        VALUES ($1, $2, 0, '[]', NOW())
        RETURNING *
        "#,
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create attempt: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(attempt_id = %row.id, %quiz_id, %user_id, "Attempt started");
    Ok((StatusCode::CREATED, Json(Attempt::from(row))))
}

/// Scores and stores a learner's answers.
///
/// * Only the attempt's owner may submit, and only once.
/// * Each correct answer is worth one point, whatever the question's points.
/// * Elapsed time is measured from the attempt's start.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let existing = sqlx::query_as::<_, AttemptRow>("SELECT * FROM academy_quiz_attempts WHERE id = $1")
        .bind(attempt_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if existing.user_id != user_id {
        return Err(AppError::Forbidden("Attempt belongs to another user".to_string()));
    }
    if existing.completed_at.is_some() {
        return Err(AppError::Conflict("Attempt already submitted".to_string()));
    }

    let quiz = load_quiz(&pool, existing.quiz_id, false).await?;
    let questions = load_questions(&pool, existing.quiz_id).await?;
    let scored = score_attempt(&questions, &req.answers);
    let answers_blob = serialize_answers(&scored.records)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let completed_at = Utc::now();
    let time_spent = existing
        .started_at
        .map(|started| (completed_at - started).num_seconds().clamp(0, i32::MAX as i64) as i32);

    let row = sqlx::query_as::<_, AttemptRow>(
        r#"
        UPDATE academy_quiz_attempts
        SET score = $1, total_questions = $2, answers = $3,
            time_spent_seconds = $4, completed_at = $5
        WHERE id = $6 AND user_id = $7 AND completed_at IS NULL
        RETURNING *
        "#,
    )
    .bind(scored.score as i32)
    .bind(questions.len() as i32)
    .bind(answers_blob)
    .bind(time_spent)
    .bind(completed_at)
    .bind(attempt_id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store attempt {}: {:?}", attempt_id, e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::Conflict("Attempt already submitted".to_string()))?;

    let mut attempt = Attempt::from(row);
    attempt.quiz_title = Some(quiz.title.clone());
    let pct = percentage(i64::from(scored.score), attempt.denominator());

    tracing::info!(
        %attempt_id,
        score = scored.score,
        total = questions.len(),
        percentage = pct,
        "Attempt submitted"
    );

    Ok(Json(AttemptResult {
        attempt,
        percentage: pct,
        passed: passed(pct, quiz.passing_threshold()),
    }))
}

/// Lists the caller's submitted attempts, newest first.
pub async fn list_my_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let rows = sqlx::query_as::<_, AttemptRow>(
        r#"
        SELECT a.*, q.title AS quiz_title
        FROM academy_quiz_attempts a
        LEFT JOIN academy_quizzes q ON q.id = a.quiz_id
        WHERE a.user_id = $1 AND a.total_questions > 0
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let attempts: Vec<Attempt> = rows.into_iter().map(Attempt::from).collect();
    Ok(Json(attempts))
}

/// One of the caller's attempts with its quiz and full questions, for review.
pub async fn get_attempt_detail(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let row = sqlx::query_as::<_, AttemptRow>(
        r#"
        SELECT a.*, q.title AS quiz_title
        FROM academy_quiz_attempts a
        LEFT JOIN academy_quizzes q ON q.id = a.quiz_id
        WHERE a.id = $1 AND a.user_id = $2
        "#,
    )
    .bind(attempt_id)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    let quiz = load_quiz(&pool, row.quiz_id, false).await?;
    let questions = load_questions(&pool, row.quiz_id).await?;

    Ok(Json(AttemptDetail {
        attempt: Attempt::from(row),
        quiz: AttemptQuizRef {
            id: quiz.id,
            title: quiz.title,
            show_correct_answers: quiz.show_correct_answers,
        },
        questions,
    }))
}
