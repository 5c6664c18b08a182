//! Execution of caller-supplied SQL.
//!
//! The statement runs verbatim on the shared session: no parsing, no
//! statement-type checks, no parameters. No transaction is opened first, so
//! the `ROLLBACK` issued after a failure only matters when the session was
//! already inside one (for example after the caller sent `BEGIN`).

use crate::error::QueryError;
use crate::session::{JsonRow, Session, is_statement_timeout, within};
use std::time::Duration;

/// Runs tool queries and compensates on failure.
#[derive(Debug, Clone, Default)]
pub struct QueryGate {
    timeout: Option<Duration>,
}

impl QueryGate {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Execute `sql` and return its rows.
    ///
    /// On failure a rollback is attempted before the original error is
    /// returned.
    pub async fn execute<S: Session>(&self, session: &mut S, sql: &str) -> Result<Vec<JsonRow>, QueryError> {
        tracing::debug!(sql, "Executing query");

        let result = match within(self.timeout, session.fetch_rows(sql, &[])).await {
            Some(Err(e)) if self.timeout.is_some() && is_statement_timeout(&e) => {
                Err(QueryError::Timeout(self.timeout.unwrap_or_default()))
            }
            Some(rows) => rows.map_err(QueryError::from),
            None => Err(QueryError::Timeout(self.timeout.unwrap_or_default())),
        };

        match &result {
            Ok(rows) => tracing::debug!(rows = rows.len(), "Query succeeded"),
            Err(e) => tracing::debug!(error = %e, "Query failed"),
        }

        or_rollback(result, session, self.timeout).await
    }
}

/// Pass `result` through, issuing a best-effort `ROLLBACK` first when it is
/// an error. A failing rollback is logged and never replaces `result`.
pub async fn or_rollback<T, S: Session>(
    result: Result<T, QueryError>,
    session: &mut S,
    timeout: Option<Duration>,
) -> Result<T, QueryError> {
    if result.is_ok() {
        return result;
    }

    match within(timeout, session.rollback()).await {
        Some(Ok(())) => tracing::debug!("Rolled back after failed query"),
        Some(Err(e)) => tracing::warn!(error = %e, "Could not roll back transaction"),
        None => tracing::warn!(?timeout, "Could not roll back transaction: timed out"),
    }
    result
}
