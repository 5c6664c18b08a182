//! Catalog introspection.
//!
//! Tables and columns are read from `information_schema` on every call;
//! nothing is cached. Identifier columns are cast to `text` so they decode
//! as plain strings.

use crate::error::CatalogError;
use crate::session::{JsonRow, Session, is_statement_timeout, within};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const LIST_TABLES_SQL: &str =
    "SELECT table_name::text AS table_name FROM information_schema.tables WHERE table_schema = 'public'";

const LIST_COLUMNS_SQL: &str = "SELECT column_name::text AS column_name, data_type::text AS data_type \
     FROM information_schema.columns WHERE table_name::text = $1";

/// One column of a table, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Deserialize)]
struct TableRow {
    table_name: String,
}

/// Reads table and column metadata through a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    timeout: Option<Duration>,
}

impl Catalog {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Tables in the `public` schema, in whatever order the catalog yields them.
    pub async fn list_tables<S: Session>(&self, session: &mut S) -> Result<Vec<String>, CatalogError> {
        let rows = self.fetch(session, LIST_TABLES_SQL, &[]).await?;
        let tables = rows
            .into_iter()
            .map(|row| decode_row::<TableRow>(row).map(|r| r.table_name))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Columns of `table`. An unknown table yields an empty list.
    pub async fn list_columns<S: Session>(
        &self,
        session: &mut S,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, CatalogError> {
        let rows = self.fetch(session, LIST_COLUMNS_SQL, &[table]).await?;
        let columns = rows
            .into_iter()
            .map(decode_row::<ColumnDescriptor>)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(table, count = columns.len(), "Listed columns");
        Ok(columns)
    }

    async fn fetch<S: Session>(
        &self,
        session: &mut S,
        sql: &str,
        binds: &[&str],
    ) -> Result<Vec<JsonRow>, CatalogError> {
        match within(self.timeout, session.fetch_rows(sql, binds)).await {
            Some(Err(e)) if self.timeout.is_some() && is_statement_timeout(&e) => {
                Err(CatalogError::Timeout(self.timeout.unwrap_or_default()))
            }
            Some(rows) => rows.map_err(CatalogError::QueryFailed),
            None => Err(CatalogError::Timeout(self.timeout.unwrap_or_default())),
        }
    }
}

fn decode_row<T: DeserializeOwned>(row: JsonRow) -> Result<T, CatalogError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| CatalogError::UnexpectedRow(e.to_string()))
}
