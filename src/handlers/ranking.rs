// src/handlers/ranking.rs

use std::collections::HashMap;

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::ranking::{RankingAttempt, Rankings, UserEmail},
    services::ranking::aggregate,
};

/// Tables consulted, in order, to resolve user ids to emails.
const EMAIL_SOURCES: [&str; 3] = ["profiles", "academy_users", "users"];

/// Admin leaderboard across all completed attempts.
///
/// Never fails: if the attempts cannot be read the response is simply empty.
pub async fn get_rankings(State(pool): State<PgPool>) -> impl IntoResponse {
    match build_rankings(&pool).await {
        Ok(rankings) => Json(rankings),
        Err(e) => {
            tracing::error!("Failed to build rankings: {:?}", e);
            Json(Rankings::default())
        }
    }
}

async fn build_rankings(pool: &PgPool) -> Result<Rankings, sqlx::Error> {
    let attempts = sqlx::query_as::<_, RankingAttempt>(
        r#"
        SELECT a.user_id, a.quiz_id, a.score, a.total_questions, q.title AS quiz_title
        FROM academy_quiz_attempts a
        LEFT JOIN academy_quizzes q ON q.id = a.quiz_id
        WHERE a.score IS NOT NULL
        ORDER BY a.created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let titles: HashMap<Uuid, String> = attempts
        .iter()
        .filter_map(|a| a.quiz_title.clone().map(|title| (a.quiz_id, title)))
        .collect();

    let mut user_ids: Vec<Uuid> = attempts.iter().map(|a| a.user_id).collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let emails = lookup_emails(pool, &user_ids).await;
    Ok(aggregate(&attempts, &titles, &emails))
}

/// Resolves emails from the first source that answers with any rows.
/// Unresolved users are left out of the map.
async fn lookup_emails(pool: &PgPool, user_ids: &[Uuid]) -> HashMap<Uuid, String> {
    if user_ids.is_empty() {
        return HashMap::new();
    }

    for table in EMAIL_SOURCES {
        let rows = sqlx::query_as::<_, UserEmail>(&format!(
            "SELECT id, email FROM {} WHERE id = ANY($1)",
            table
        ))
        .bind(user_ids)
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) if !rows.is_empty() => return collect_emails(rows),
            Ok(_) => tracing::debug!(table, "No emails found, trying next source"),
            Err(e) => tracing::debug!(table, "Email lookup failed, trying next source: {}", e),
        }
    }

    HashMap::new()
}

fn collect_emails(rows: Vec<UserEmail>) -> HashMap<Uuid, String> {
    rows.into_iter()
        .filter_map(|row| {
            row.email
                .filter(|email| !email.trim().is_empty())
                .map(|email| (row.id, email))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_sources_order() {
        assert_eq!(EMAIL_SOURCES, ["profiles", "academy_users", "users"]);
    }

    #[test]
    fn test_collect_emails_skips_blank() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let emails = collect_emails(vec![
            UserEmail { id: a, email: Some("a@example.com".into()) },
            UserEmail { id: b, email: Some("  ".into()) },
            UserEmail { id: c, email: None },
        ]);

        assert_eq!(emails.len(), 1);
        assert_eq!(emails[&a], "a@example.com");
    }
}
