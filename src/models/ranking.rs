// src/models/ranking.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A completed attempt as consumed by the ranking aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct RankingAttempt {
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub score: Option<i32>,
    pub total_questions: Option<i32>,
    #[sqlx(default)]
    pub quiz_title: Option<String>,
}

/// A user's best percentage on one quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizBestScore {
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRanking {
    pub user_id: Uuid,
    pub email: String,
    pub total_attempts: u32,
    pub average_score: i64,
    pub best_scores: Vec<QuizBestScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub email: String,
    pub best_score: i64,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizLeaderboard {
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rankings {
    pub user_rankings: Vec<UserRanking>,
    pub quiz_leaderboards: Vec<QuizLeaderboard>,
}

/// One email lookup row.
#[derive(Debug, FromRow)]
pub struct UserEmail {
    pub id: Uuid,
    pub email: Option<String>,
}
