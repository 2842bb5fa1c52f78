// src/services/scoring.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{attempt::AnswerRecord, question::Question};

/// Outcome of scoring one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredAttempt {
    /// Number of correct answers. Question point values are not applied.
    pub score: u32,
    /// One record per question, in question order.
    pub records: Vec<AnswerRecord>,
}

/// Scores `answers` (question id -> selected option id) against `questions`.
///
/// A question is correct only when the selected id equals its correct
/// option id. Unanswered questions are incorrect.
pub fn score_attempt(questions: &[Question], answers: &HashMap<Uuid, String>) -> ScoredAttempt {
    let mut score = 0;

    let records = questions
        .iter()
        .map(|question| {
            let selected = answers
                .get(&question.id)
                .filter(|option| !option.is_empty())
                .cloned();
            let is_correct = selected.as_deref() == Some(question.correct_answer.as_str());
            if is_correct {
                score += 1;
            }

            AnswerRecord {
                question_id: question.id,
                selected_index: selected.as_deref().and_then(|s| s.parse().ok()),
                selected_option: selected,
                is_correct,
            }
        })
        .collect();

    ScoredAttempt { score, records }
}

/// Half-up rounding, so `x.5` always goes towards positive infinity.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Result percentage shown to the learner. Zero when `total` is zero.
pub fn percentage(score: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    round_half_up(score as f64 / total as f64 * 100.0)
}

pub fn passed(percentage: i64, threshold: i64) -> bool {
    percentage >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{QuestionOption, QuestionType};

    fn question(correct: i32, points: i32) -> Question {
        Question {
            id: Uuid::new_v4(),
            quiz_id: Uuid::nil(),
            question_text: "?".into(),
            question_type: QuestionType::MultipleChoice,
            options: (0..3)
                .map(|i| QuestionOption { id: i.to_string(), text: format!("opt {i}") })
                .collect(),
            correct_answer: correct.to_string(),
            correct_option_index: correct,
            explanation: None,
            points,
            display_order: 0,
            image_url: None,
            created_at: None,
        }
    }

    #[test]
    fn test_score_ignores_point_values() {
        let questions = vec![question(0, 1), question(1, 5), question(2, 1)];
        let mut answers = HashMap::new();
        answers.insert(questions[0].id, "0".to_string());
        answers.insert(questions[1].id, "2".to_string());
        answers.insert(questions[2].id, "0".to_string());

        let scored = score_attempt(&questions, &answers);

        assert_eq!(scored.score, 1);
        let flags: Vec<bool> = scored.records.iter().map(|r| r.is_correct).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_unanswered_counts_as_wrong() {
        let questions = vec![question(1, 1), question(1, 1)];
        let mut answers = HashMap::new();
        answers.insert(questions[1].id, "1".to_string());

        let scored = score_attempt(&questions, &answers);

        assert_eq!(scored.score, 1);
        assert_eq!(scored.records[0].selected_option, None);
        assert_eq!(scored.records[0].selected_index, None);
        assert!(!scored.records[0].is_correct);
        assert_eq!(scored.records[1].selected_index, Some(1));
    }

    #[test]
    fn test_blank_selection_is_unanswered() {
        let questions = vec![question(0, 1)];
        let mut answers = HashMap::new();
        answers.insert(questions[0].id, String::new());

        let scored = score_attempt(&questions, &answers);
        assert_eq!(scored.score, 0);
        assert_eq!(scored.records[0].selected_option, None);
    }

    #[test]
    fn test_records_follow_question_order() {
        let questions = vec![question(0, 1), question(1, 1), question(2, 1)];
        let scored = score_attempt(&questions, &HashMap::new());

        let ids: Vec<Uuid> = scored.records.iter().map(|r| r.question_id).collect();
        let expected: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(scored.score, 0);
    }

    #[test]
    fn test_answers_for_unknown_questions_are_ignored() {
        let questions = vec![question(0, 1)];
        let mut answers = HashMap::new();
        answers.insert(Uuid::new_v4(), "0".to_string());

        let scored = score_attempt(&questions, &answers);
        assert_eq!(scored.score, 0);
        assert_eq!(scored.records.len(), 1);
    }

    #[test]
    fn test_percentage_and_pass() {
        assert_eq!(percentage(3, 4), 75);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(5, 0), 0);

        assert!(passed(60, 60));
        assert!(!passed(59, 60));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(0.0), 0);
    }
}
