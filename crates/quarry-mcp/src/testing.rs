//! In-memory [`Session`] used by unit tests.

use crate::session::{JsonRow, Session};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// What Postgres reports when `statement_timeout` cancels a statement.
#[derive(Debug)]
struct StatementTimeout;

impl fmt::Display for StatementTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("canceling statement due to statement timeout")
    }
}

impl StdError for StatementTimeout {}

impl sqlx::error::DatabaseError for StatementTimeout {
    fn message(&self) -> &str {
        "canceling statement due to statement timeout"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("57014"))
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::Other
    }
}

pub fn statement_timeout_error() -> sqlx::Error {
    sqlx::Error::Database(Box::new(StatementTimeout))
}

/// Answers catalog queries from a fixed table list and tool queries from a
/// lookup table. Unknown tool SQL fails like a syntax error.
#[derive(Default)]
pub struct FakeSession {
    tables: Vec<(String, Vec<(String, String)>)>,
    queries: HashMap<String, Vec<JsonRow>>,
    catalog_failure: Option<String>,
    rollback_failure: Option<String>,
    catalog_delay: Option<Duration>,
    query_delay: Option<Duration>,
    catalog_canceled: bool,
    canceled: HashSet<String>,
    statements: Vec<String>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect();
        self.tables.push((name.to_string(), columns));
        self
    }

    pub fn with_query(mut self, sql: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("fake rows must be objects, got {other}"),
            })
            .collect();
        self.queries.insert(sql.to_string(), rows);
        self
    }

    pub fn with_catalog_failure(mut self, message: &str) -> Self {
        self.catalog_failure = Some(message.to_string());
        self
    }

    pub fn with_rollback_failure(mut self, message: &str) -> Self {
        self.rollback_failure = Some(message.to_string());
        self
    }

    pub fn with_catalog_delay(mut self, delay: Duration) -> Self {
        self.catalog_delay = Some(delay);
        self
    }

    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Catalog queries fail as if `statement_timeout` fired.
    pub fn with_catalog_canceled(mut self) -> Self {
        self.catalog_canceled = true;
        self
    }

    /// `sql` fails as if `statement_timeout` fired.
    pub fn with_canceled_query(mut self, sql: &str) -> Self {
        self.canceled.insert(sql.to_string());
        self
    }

    /// Every statement issued so far, `ROLLBACK` included.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    fn object(value: Value) -> JsonRow {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("json! object literal"),
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn fetch_rows(&mut self, sql: &str, binds: &[&str]) -> Result<Vec<JsonRow>, sqlx::Error> {
        self.statements.push(sql.to_string());

        if sql.contains("information_schema") {
            if let Some(delay) = self.catalog_delay {
                tokio::time::sleep(delay).await;
            }
            if self.catalog_canceled {
                return Err(statement_timeout_error());
            }
            if let Some(message) = &self.catalog_failure {
                return Err(sqlx::Error::Protocol(message.clone()));
            }
            if sql.contains("information_schema.tables") {
                return Ok(self
                    .tables
                    .iter()
                    .map(|(name, _)| Self::object(json!({ "table_name": name })))
                    .collect());
            }
            let table = binds.first().copied().unwrap_or_default();
            return Ok(self
                .tables
                .iter()
                .filter(|(name, _)| name == table)
                .flat_map(|(_, columns)| columns.iter())
                .map(|(c, t)| Self::object(json!({ "column_name": c, "data_type": t })))
                .collect());
        }

        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        if self.canceled.contains(sql) {
            return Err(statement_timeout_error());
        }
        self.queries.get(sql).cloned().ok_or_else(|| {
            sqlx::Error::Protocol(format!("syntax error at or near \"{}\"", sql.split_whitespace().next().unwrap_or("")))
        })
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.statements.push("ROLLBACK".to_string());
        match &self.rollback_failure {
            Some(message) => Err(sqlx::Error::Protocol(message.clone())),
            None => Ok(()),
        }
    }
}
