//! Shared test infrastructure for Quarry MCP end-to-end tests.
//!
//! This module provides:
//! - Docker container management for PostgreSQL
//! - A server wired to a real `PgSession`
//! - Helpers for issuing JSON-RPC requests

use quarry_mcp::protocol::JsonRpcError;
use quarry_mcp::{JsonRpcRequest, McpServer, PgSession, ResourceBase};
use serde_json::{Value, json};
use sqlx::PgPool;
use std::process::Command;
use std::time::Duration;

// =============================================================================
// DOCKER CONTAINER CONFIGURATION
// =============================================================================

pub const CONTAINER_NAME: &str = "quarry_test_postgres";
pub const POSTGRES_PORT: u16 = 5434;
pub const POSTGRES_PASSWORD: &str = "quarry_test_password";
pub const DATABASE_NAME: &str = "quarry_test";

/// Statement timeout configured on the server under test.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Set to make an unavailable Docker fail the run instead of skipping it.
pub const REQUIRE_DOCKER_ENV: &str = "QUARRY_E2E_REQUIRED";

pub fn database_url() -> String {
    format!(
        "postgres://postgres:{}@localhost:{}/{}",
        POSTGRES_PASSWORD, POSTGRES_PORT, DATABASE_NAME
    )
}

// =============================================================================
// DOCKER CONTAINER MANAGEMENT
// =============================================================================

/// Start a PostgreSQL container for testing
pub fn start_postgres_container() -> Result<(), String> {
    let output = Command::new("docker")
        .args(["ps", "-a", "-q", "-f", &format!("name={}", CONTAINER_NAME)])
        .output()
        .map_err(|e| format!("Failed to check existing container: {}", e))?;

    if !String::from_utf8_lossy(&output.stdout).trim().is_empty() {
        let _ = Command::new("docker")
            .args(["rm", "-f", CONTAINER_NAME])
            .output();
    }

    let status = Command::new("docker")
        .args([
            "run",
            "-d",
            "--name",
            CONTAINER_NAME,
            "-e",
            &format!("POSTGRES_PASSWORD={}", POSTGRES_PASSWORD),
            "-e",
            &format!("POSTGRES_DB={}", DATABASE_NAME),
            "-p",
            &format!("{}:5432", POSTGRES_PORT),
            "postgres:16-alpine",
        ])
        .status()
        .map_err(|e| format!("Failed to start container: {}", e))?;

    if !status.success() {
        return Err("Failed to start PostgreSQL container".to_string());
    }

    Ok(())
}

/// Stop and remove the PostgreSQL container
pub fn stop_postgres_container() {
    let _ = Command::new("docker")
        .args(["rm", "-f", CONTAINER_NAME])
        .output();
}

/// Wait for PostgreSQL to be ready
pub async fn wait_for_postgres() -> Result<PgPool, String> {
    for attempt in 1..=30 {
        match PgPool::connect(&database_url()).await {
            Ok(pool) => {
                if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                    println!("✅ PostgreSQL ready after {} attempts", attempt);
                    return Ok(pool);
                }
            }
            Err(_) => {
                if attempt % 5 == 0 {
                    println!("⏳ Waiting for PostgreSQL... (attempt {})", attempt);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err("PostgreSQL did not become ready in time".to_string())
}

// =============================================================================
// DATABASE INITIALIZATION
// =============================================================================

const SCHEMA_SQL: &str = r#"
CREATE TABLE customers (
    customer_id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    email VARCHAR(255),
    lifetime_value NUMERIC(12, 2) NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE orders (
    order_id BIGSERIAL PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(customer_id),
    tags TEXT[] NOT NULL DEFAULT '{}',
    metadata JSONB
);

CREATE TABLE empty_table ();

INSERT INTO customers (name, email, lifetime_value) VALUES
    ('David Smith', 'david@example.com', 15000.00),
    ('Ana Lima', NULL, 42.50);

INSERT INTO orders (customer_id, tags, metadata) VALUES
    (1, '{rush,gift}', '{"channel": "web"}');
"#;

pub async fn initialize_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    println!("✅ Database initialized with schema and seed data");
    Ok(())
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

pub struct TestContext {
    pub pool: PgPool,
    pub server: McpServer<PgSession>,
}

impl TestContext {
    pub async fn setup() -> Result<Self, String> {
        start_postgres_container()?;
        let pool = wait_for_postgres().await?;
        initialize_database(&pool)
            .await
            .map_err(|e| format!("Failed to initialize database: {}", e))?;

        let session = PgSession::connect(&database_url(), Some(QUERY_TIMEOUT))
            .await
            .map_err(|e| format!("Failed to open session: {}", e))?;
        let base = ResourceBase::from_database_url(&database_url()).map_err(|e| e.to_string())?;
        let server = McpServer::new(session, base).with_timeout(Some(QUERY_TIMEOUT));

        Ok(Self { pool, server })
    }

    /// Send a request and return its result, failing the test on an error.
    pub async fn call(&self, method: &str, params: Value) -> Value {
        match self.request(method, params).await {
            Ok(result) => result,
            Err(error) => panic!("{} failed: {:?}", method, error),
        }
    }

    /// Send a request and return its result or JSON-RPC error.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        let response = self
            .server
            .handle_request(JsonRpcRequest::new(1, method, Some(params)))
            .await
            .expect("request with id gets a response");

        match (response.result, response.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => panic!("{} returned neither result nor error", method),
        }
    }

    /// Run the `query` tool and decode the returned rows.
    pub async fn query(&self, sql: &str) -> Result<Value, JsonRpcError> {
        let result = self
            .request("tools/call", json!({ "name": "query", "arguments": { "sql": sql } }))
            .await?;
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().expect("text content");
        Ok(serde_json::from_str(text).expect("rows are JSON"))
    }

    /// The resource URI for `table`.
    pub fn resource_uri(&self, table: &str) -> String {
        format!("postgres://postgres@localhost:{}/{}/schema", POSTGRES_PORT, table)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        stop_postgres_container();
        println!("🧹 Cleaned up PostgreSQL container");
    }
}
