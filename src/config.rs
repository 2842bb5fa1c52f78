// src/config.rs

use std::collections::{HashMap, HashSet};
use std::env;

use dotenvy::dotenv;

/// Quizzes without an explicit passing score use this threshold (percentage).
pub const DEFAULT_PASSING_SCORE: i64 = 60;

/// Fallback label for quizzes whose title could not be resolved.
pub const FALLBACK_QUIZ_TITLE: &str = "Quiz";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub port: u16,
    pub upload_dir: String,
    pub public_base_url: String,
    pub capabilities: ColumnCapabilities,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let upload_dir = env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "uploads".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let capabilities = env::var("UNSUPPORTED_COLUMNS")
            .map(|v| ColumnCapabilities::parse(&v))
            .unwrap_or_default();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            port,
            upload_dir,
            public_base_url,
            capabilities,
        }
    }
}

/// Columns a deployed schema is known not to have, per table.
///
/// Write payloads drop these before reaching the database, so an older
/// schema without e.g. `image_url` keeps accepting question writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnCapabilities {
    unsupported: HashMap<String, HashSet<String>>,
}

impl ColumnCapabilities {
    /// Parses `table:col,col;table:col`. Blank segments are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut caps = Self::default();
        for entry in raw.split(';') {
            let Some((table, columns)) = entry.split_once(':') else {
                continue;
            };
            for column in columns.split(',') {
                caps = caps.with_unsupported(table, column);
            }
        }
        caps
    }

    pub fn with_unsupported(mut self, table: &str, column: &str) -> Self {
        let (table, column) = (table.trim(), column.trim());
        if !table.is_empty() && !column.is_empty() {
            self.unsupported
                .entry(table.to_string())
                .or_default()
                .insert(column.to_string());
        }
        self
    }

    pub fn is_supported(&self, table: &str, column: &str) -> bool {
        self.unsupported
            .get(table)
            .is_none_or(|columns| !columns.contains(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capabilities() {
        let caps = ColumnCapabilities::parse(
            "academy_quiz_questions:image_url, points;academy_quizzes:shuffle_questions",
        );

        assert!(!caps.is_supported("academy_quiz_questions", "image_url"));
        assert!(!caps.is_supported("academy_quiz_questions", "points"));
        assert!(!caps.is_supported("academy_quizzes", "shuffle_questions"));
        assert!(caps.is_supported("academy_quizzes", "title"));
        assert!(caps.is_supported("users", "email"));
    }

    #[test]
    fn test_parse_ignores_garbage() {
        let caps = ColumnCapabilities::parse(";;nocolon; :x;table: ,");
        assert_eq!(caps, ColumnCapabilities::default());
    }
}
