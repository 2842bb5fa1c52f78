// src/services/ranking.rs

use std::collections::HashMap;
use std::hash::Hash;

use uuid::Uuid;

use crate::config::FALLBACK_QUIZ_TITLE;
use crate::models::ranking::{
    LeaderboardEntry, QuizBestScore, QuizLeaderboard, RankingAttempt, Rankings, UserRanking,
};
use crate::services::scoring::round_half_up;

/// Converts a raw attempt score into a percentage.
///
/// Scores above a positive denominator are taken to already be percentages.
pub fn score_to_percentage(score: Option<f64>, denominator: Option<i64>) -> i64 {
    let Some(score) = score else {
        return 0;
    };
    match denominator {
        Some(total) if total > 0 && score > total as f64 => round_half_up(score),
        Some(total) if total > 0 => round_half_up(score / total as f64 * 100.0),
        _ => round_half_up(score),
    }
}

/// Map that remembers first-insertion order.
#[derive(Debug)]
struct Ordered<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Ordered<K, V> {
    fn default() -> Self {
        Self { index: HashMap::new(), entries: Vec::new() }
    }
}

impl<K: Copy + Eq + Hash, V: Default> Ordered<K, V> {
    fn entry(&mut self, key: K) -> &mut V {
        let slot = *self.index.entry(key).or_insert_with(|| {
            self.entries.push((key, V::default()));
            self.entries.len() - 1
        });
        &mut self.entries[slot].1
    }

    fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Best {
    score: i64,
    attempts: u32,
}

impl Best {
    fn record(&mut self, percent: i64) {
        self.attempts += 1;
        self.score = self.score.max(percent);
    }
}

#[derive(Debug, Default)]
struct UserTotals {
    attempts: u32,
    percent_sum: i64,
    by_quiz: Ordered<Uuid, Best>,
}

/// Folds completed attempts into per-user rankings and per-quiz leaderboards.
///
/// Quiz titles fall back to a generic label and user display names fall back
/// to the raw user id. Output order is fully determined by the input order.
pub fn aggregate(
    attempts: &[RankingAttempt],
    quiz_titles: &HashMap<Uuid, String>,
    emails: &HashMap<Uuid, String>,
) -> Rankings {
    let mut users: Ordered<Uuid, UserTotals> = Ordered::default();
    let mut quizzes: Ordered<Uuid, Ordered<Uuid, Best>> = Ordered::default();

    for attempt in attempts {
        let percent = score_to_percentage(
            attempt.score.map(f64::from),
            attempt.total_questions.map(i64::from),
        );

        let user = users.entry(attempt.user_id);
        user.attempts += 1;
        user.percent_sum += percent;
        user.by_quiz.entry(attempt.quiz_id).record(percent);

        quizzes
            .entry(attempt.quiz_id)
            .entry(attempt.user_id)
            .record(percent);
    }

    let title_of = |quiz_id: &Uuid| {
        quiz_titles
            .get(quiz_id)
            .cloned()
            .unwrap_or_else(|| FALLBACK_QUIZ_TITLE.to_string())
    };
    let email_of = |user_id: &Uuid| {
        emails
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string())
    };

    let mut user_rankings: Vec<UserRanking> = users
        .into_entries()
        .into_iter()
        .map(|(user_id, totals)| {
            let mut best_scores: Vec<QuizBestScore> = totals
                .by_quiz
                .into_entries()
                .into_iter()
                .map(|(quiz_id, best)| QuizBestScore {
                    quiz_title: title_of(&quiz_id),
                    quiz_id,
                    score: best.score,
                })
                .collect();
            best_scores.sort_by(|a, b| b.score.cmp(&a.score));

            let average_score = if totals.attempts > 0 {
                round_half_up(totals.percent_sum as f64 / f64::from(totals.attempts))
            } else {
                0
            };

            UserRanking {
                email: email_of(&user_id),
                user_id,
                total_attempts: totals.attempts,
                average_score,
                best_scores,
            }
        })
        .collect();

    user_rankings.sort_by(|a, b| {
        b.average_score
            .cmp(&a.average_score)
            .then_with(|| b.total_attempts.cmp(&a.total_attempts))
    });

    let quiz_leaderboards = quizzes
        .into_entries()
        .into_iter()
        .map(|(quiz_id, per_user)| {
            let mut entries: Vec<LeaderboardEntry> = per_user
                .into_entries()
                .into_iter()
                .map(|(user_id, best)| LeaderboardEntry {
                    email: email_of(&user_id),
                    user_id,
                    best_score: best.score,
                    attempts: best.attempts,
                })
                .collect();
            entries.sort_by(|a, b| {
                b.best_score
                    .cmp(&a.best_score)
                    .then_with(|| b.attempts.cmp(&a.attempts))
            });

            QuizLeaderboard {
                quiz_title: title_of(&quiz_id),
                quiz_id,
                entries,
            }
        })
        .collect();

    Rankings {
        user_rankings,
        quiz_leaderboards,
    }
}

/// A learner's own progress on one quiz, in raw score units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizUserStats {
    pub best_score: i64,
    pub attempts: u32,
}

/// Best raw score and attempt count per quiz over `(quiz_id, score)` pairs.
/// The first score seen for a quiz seeds its best value.
pub fn user_quiz_stats(rows: &[(Uuid, i32)]) -> HashMap<Uuid, QuizUserStats> {
    let mut stats: HashMap<Uuid, QuizUserStats> = HashMap::new();
    for &(quiz_id, score) in rows {
        let entry = stats.entry(quiz_id).or_insert(QuizUserStats {
            best_score: i64::from(score),
            attempts: 0,
        });
        entry.attempts += 1;
        entry.best_score = entry.best_score.max(i64::from(score));
    }
    stats
}
