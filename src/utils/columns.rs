// src/utils/columns.rs

//! Column-level write payloads that adapt to what the deployed schema
//! actually supports.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::{Connection, FromRow, PgConnection, Postgres, QueryBuilder, postgres::PgRow};
use uuid::Uuid;

use crate::{config::ColumnCapabilities, error::AppError};

/// PostgreSQL `undefined_column`.
const UNDEFINED_COLUMN: &str = "42703";

static MISSING_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"column "([^"]+)"|'([^']+)' column"#).expect("valid regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Int(Option<i32>),
    Bool(Option<bool>),
    Json(serde_json::Value),
    Timestamp(Option<DateTime<Utc>>),
    Uuid(Uuid),
}

/// An ordered set of `column = value` assignments for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    table: &'static str,
    columns: Vec<(&'static str, ColumnValue)>,
}

impl Payload {
    pub fn new(table: &'static str) -> Self {
        Self { table, columns: Vec::new() }
    }

    pub fn set(mut self, column: &'static str, value: ColumnValue) -> Self {
        self.columns.retain(|(name, _)| *name != column);
        self.columns.push((column, value));
        self
    }

    /// Sets `column` only when `value` is present.
    pub fn set_some<T>(self, column: &'static str, value: Option<T>, wrap: fn(Option<T>) -> ColumnValue) -> Self {
        match value {
            Some(v) => self.set(column, wrap(Some(v))),
            None => self,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| *name == column)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(name, _)| *name).collect()
    }

    pub fn without(&self, column: &str) -> Self {
        let mut cleaned = self.clone();
        cleaned.columns.retain(|(name, _)| *name != column);
        cleaned
    }

    /// Drops every column the capabilities mark as unsupported for this table.
    pub fn strip_unsupported(mut self, caps: &ColumnCapabilities) -> Self {
        let table = self.table;
        self.columns.retain(|(name, _)| {
            let keep = caps.is_supported(table, name);
            if !keep {
                tracing::debug!(table, column = *name, "Skipping unsupported column");
            }
            keep
        });
        self
    }

    /// `INSERT INTO table (..) VALUES (..) RETURNING *`
    pub fn insert_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("INSERT INTO {} (", self.table));
        builder.push(self.column_names().join(", "));
        builder.push(") VALUES (");
        for (i, (_, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            bind_value(&mut builder, value);
        }
        builder.push(") RETURNING *");
        builder
    }

    /// `UPDATE table SET .. WHERE id = $n RETURNING *`
    pub fn update_query(&self, id: Uuid) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("UPDATE {} SET ", self.table));
        for (i, (name, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(format!("{} = ", name));
            bind_value(&mut builder, value);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING *");
        builder
    }
}

fn bind_value(builder: &mut QueryBuilder<'static, Postgres>, value: &ColumnValue) {
    match value.clone() {
        ColumnValue::Text(v) => builder.push_bind(v),
        ColumnValue::Int(v) => builder.push_bind(v),
        ColumnValue::Bool(v) => builder.push_bind(v),
        ColumnValue::Json(v) => builder.push_bind(v),
        ColumnValue::Timestamp(v) => builder.push_bind(v),
        ColumnValue::Uuid(v) => builder.push_bind(v),
    };
}

/// Extracts the column name from an "undefined column" error message.
pub fn missing_column_in_message(code: Option<&str>, message: &str) -> Option<String> {
    if code != Some(UNDEFINED_COLUMN) {
        return None;
    }
    let captures = MISSING_COLUMN.captures(message)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

fn missing_column(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => missing_column_in_message(db.code().as_deref(), db.message()),
        _ => None,
    }
}

/// Runs one write inside its own (nested) transaction, so a failed statement
/// leaves an enclosing transaction usable.
async fn try_write<T>(
    conn: &mut PgConnection,
    mut query: QueryBuilder<'static, Postgres>,
) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut attempt = conn.begin().await?;
    match query.build_query_as::<T>().fetch_optional(&mut *attempt).await {
        Ok(row) => {
            attempt.commit().await?;
            Ok(row)
        }
        Err(err) => {
            if let Err(e) = attempt.rollback().await {
                tracing::warn!("Rollback after failed write also failed: {}", e);
            }
            Err(err)
        }
    }
}

/// Runs a payload write, retrying once without a column the database
/// reports as undefined.
async fn write_with_retry<T, F>(
    conn: &mut PgConnection,
    payload: Payload,
    caps: &ColumnCapabilities,
    build: F,
) -> Result<Option<T>, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    F: Fn(&Payload) -> QueryBuilder<'static, Postgres> + Send,
{
    let payload = payload.strip_unsupported(caps);
    if payload.is_empty() {
        return Err(AppError::BadRequest("Nothing to write".to_string()));
    }

    let err = match try_write(conn, build(&payload)).await {
        Ok(row) => return Ok(row),
        Err(err) => err,
    };

    let Some(column) = missing_column(&err).filter(|c| payload.contains(c)) else {
        return Err(err.into());
    };

    tracing::warn!(
        table = payload.table(),
        column = %column,
        "Column missing from schema; retrying write without it"
    );
    let retried = payload.without(&column);
    if retried.is_empty() {
        return Err(err.into());
    }
    Ok(try_write(conn, build(&retried)).await?)
}

/// Works on a plain pooled connection or inside a caller's transaction.
pub async fn insert_returning<T>(
    conn: &mut PgConnection,
    payload: Payload,
    caps: &ColumnCapabilities,
) -> Result<T, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    write_with_retry(conn, payload, caps, Payload::insert_query)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Insert returned no row".to_string()))
}

/// Returns `None` when no row has the given id.
pub async fn update_returning<T>(
    conn: &mut PgConnection,
    payload: Payload,
    id: Uuid,
    caps: &ColumnCapabilities,
) -> Result<Option<T>, AppError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    write_with_retry(conn, payload, caps, move |p: &Payload| p.update_query(id)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Payload {
        Payload::new("academy_quiz_questions")
            .set("question_text", ColumnValue::Text(Some("Q".into())))
            .set("points", ColumnValue::Int(Some(2)))
            .set("image_url", ColumnValue::Text(None))
    }

    #[test]
    fn test_insert_sql_shape() {
        let sql = payload().insert_query().into_sql();
        assert_eq!(
            sql,
            "INSERT INTO academy_quiz_questions (question_text, points, image_url) VALUES ($1, $2, $3) RETURNING *"
        );
    }

    #[test]
    fn test_update_sql_shape() {
        let sql = payload().update_query(Uuid::nil()).into_sql();
        assert_eq!(
            sql,
            "UPDATE academy_quiz_questions SET question_text = $1, points = $2, image_url = $3 WHERE id = $4 RETURNING *"
        );
    }

    #[test]
    fn test_strip_unsupported_columns() {
        let caps = ColumnCapabilities::default().with_unsupported("academy_quiz_questions", "image_url");

        let stripped = payload().strip_unsupported(&caps);
        assert_eq!(stripped.column_names(), vec!["question_text", "points"]);

        // Capabilities for other tables leave the payload alone.
        let other = ColumnCapabilities::default().with_unsupported("academy_quizzes", "points");
        assert_eq!(payload().strip_unsupported(&other), payload());
    }

    #[test]
    fn test_set_replaces_and_set_some_skips_none() {
        let p = Payload::new("academy_quizzes")
            .set("title", ColumnValue::Text(Some("a".into())))
            .set("title", ColumnValue::Text(Some("b".into())))
            .set_some("passing_score", None::<i32>, ColumnValue::Int)
            .set_some("shuffle_questions", Some(true), ColumnValue::Bool);

        assert_eq!(p.column_names(), vec!["title", "shuffle_questions"]);
        assert_eq!(p.get("title"), Some(&ColumnValue::Text(Some("b".into()))));
        assert_eq!(p.get("passing_score"), None);
        assert!(p.without("title").contains("shuffle_questions"));
        assert!(!p.without("title").contains("title"));
    }

    #[test]
    fn test_missing_column_message_parsing() {
        assert_eq!(
            missing_column_in_message(
                Some("42703"),
                r#"column "image_url" of relation "academy_quiz_questions" does not exist"#
            ),
            Some("image_url".to_string())
        );
        assert_eq!(
            missing_column_in_message(
                Some("42703"),
                "Could not find the 'points' column of 'academy_quiz_questions' in the schema cache"
            ),
            Some("points".to_string())
        );
        assert_eq!(
            missing_column_in_message(Some("23505"), r#"column "email" duplicate"#),
            None
        );
        assert_eq!(missing_column_in_message(Some("42703"), "something else"), None);
    }
}
