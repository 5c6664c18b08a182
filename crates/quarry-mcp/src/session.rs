//! The database session.
//!
//! The server owns exactly one long-lived connection. Handlers reach it
//! through the [`Session`] trait so the catalog and query paths can be
//! exercised without a live Postgres.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgValueFormat};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, TypeInfo, ValueRef};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// SQLSTATE `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// A result row keyed by column name, in column order.
pub type JsonRow = Map<String, Value>;

/// One database session. Callers hold it exclusively for a whole request.
#[async_trait]
pub trait Session: Send {
    /// Run `sql` and return every row.
    ///
    /// Without binds the text goes out as-is over the simple query protocol,
    /// so it may hold several statements; rows of all of them are returned
    /// in order. With binds it must be a single parameterized statement.
    async fn fetch_rows(&mut self, sql: &str, binds: &[&str]) -> Result<Vec<JsonRow>, sqlx::Error>;

    /// Issue a `ROLLBACK` on this session.
    async fn rollback(&mut self) -> Result<(), sqlx::Error>;
}

/// A [`Session`] backed by a single Postgres connection.
pub struct PgSession {
    conn: PgConnection,
}

impl PgSession {
    /// Open the connection. No statements are issued besides the handshake.
    ///
    /// A `statement_timeout` is passed as a startup parameter, so the server
    /// cancels runaway statements itself and the session stays usable.
    pub async fn connect(database_url: &str, statement_timeout: Option<Duration>) -> Result<Self, sqlx::Error> {
        let mut options = PgConnectOptions::from_str(database_url)?;
        if let Some(limit) = statement_timeout {
            options = options.options([("statement_timeout", limit.as_millis().max(1))]);
        }
        let conn = options.connect().await?;
        Ok(Self { conn })
    }

    /// Terminate the connection gracefully.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

#[async_trait]
impl Session for PgSession {
    async fn fetch_rows(&mut self, sql: &str, binds: &[&str]) -> Result<Vec<JsonRow>, sqlx::Error> {
        let rows = if binds.is_empty() {
            Executor::fetch_all(&mut self.conn, sql).await?
        } else {
            let mut query = sqlx::query(sql);
            for bind in binds {
                query = query.bind(*bind);
            }
            query.fetch_all(&mut self.conn).await?
        };
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        Executor::execute(&mut self.conn, "ROLLBACK").await?;
        Ok(())
    }
}

/// Whether `error` is the server cancelling a statement that ran too long.
pub(crate) fn is_statement_timeout(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(QUERY_CANCELED),
        _ => false,
    }
}

/// Run `fut`, giving up once `limit` has passed twice over. `None` means it
/// timed out.
///
/// The server enforces `limit` through `statement_timeout`; this only
/// catches a server or network that stops answering altogether.
pub(crate) async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit.saturating_mul(2), fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Convert a Postgres row to a JSON object.
fn row_to_json(row: &PgRow) -> JsonRow {
    let mut obj = Map::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let value = column_to_json(row, idx, col.type_info().name());
        obj.insert(col.name().to_string(), value);
    }
    obj
}

fn column_to_json(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::from),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "OID" => row.try_get::<sqlx::postgres::types::Oid, _>(idx).map(|oid| json!(oid.0)),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(Value::from),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from),
        "NUMERIC" => row
            .try_get::<bigdecimal::BigDecimal, _>(idx)
            .map(|v| numeric_to_json(v.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => {
            row.try_get::<String, _>(idx).map(Value::from)
        }
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "UUID" => row.try_get::<uuid::Uuid, _>(idx).map(|v| json!(v.to_string())),
        "DATE" => row.try_get::<chrono::NaiveDate, _>(idx).map(|v| json!(v.to_string())),
        "TIME" => row.try_get::<chrono::NaiveTime, _>(idx).map(|v| json!(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|v| json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|v| json!(v.to_rfc3339())),
        "BOOL[]" => row.try_get::<Vec<Option<bool>>, _>(idx).map(|v| json!(v)),
        "INT2[]" => row.try_get::<Vec<Option<i16>>, _>(idx).map(|v| json!(v)),
        "INT4[]" => row.try_get::<Vec<Option<i32>>, _>(idx).map(|v| json!(v)),
        "INT8[]" => row.try_get::<Vec<Option<i64>>, _>(idx).map(|v| json!(v)),
        "FLOAT4[]" => row.try_get::<Vec<Option<f32>>, _>(idx).map(|v| json!(v)),
        "FLOAT8[]" => row.try_get::<Vec<Option<f64>>, _>(idx).map(|v| json!(v)),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => row.try_get::<Vec<Option<String>>, _>(idx).map(|v| json!(v)),
        // Everything else keeps Postgres' own text rendering.
        _ => text_value(row, idx),
    };

    decoded.or_else(|_| text_value(row, idx)).unwrap_or_else(|e| {
        tracing::debug!(column = idx, type_name, error = %e, "Could not decode column, returning null");
        Value::Null
    })
}

/// The column as Postgres printed it. Only text-format results carry that;
/// a binary value of an unknown type cannot be rendered.
fn text_value(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    match raw.format() {
        PgValueFormat::Text => raw
            .as_str()
            .map(Value::from)
            .map_err(sqlx::Error::Decode),
        PgValueFormat::Binary => Err(sqlx::Error::Decode(
            format!("no binary decoding for {}", raw.type_info().name()).into(),
        )),
    }
}

/// Render a NUMERIC as a JSON number, keeping the text when it does not parse.
fn numeric_to_json(text: String) -> Value {
    match text.parse::<serde_json::Number>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::String(text),
    }
}
