//! Connectors: uniform interface to external services
//!
//! Retries and timeouts are connector-level concerns; every connector
//! carries its own settings so the agents above never re-implement backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use msr_common::{Error, Result};

/// Retry/timeout settings exposed by every connector
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_initial_ms: u64,
    pub backoff_factor: f64,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 2,
            backoff_initial_ms: 200,
            backoff_factor: 2.0,
        }
    }
}

/// Uniform connector interface
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;
    fn settings(&self) -> &ConnectorSettings;
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
}

/// HTTP connector over reqwest with connector-level retry
pub struct HttpConnector {
    name: String,
    base_url: String,
    client: reqwest::Client,
    settings: ConnectorSettings,
}

impl HttpConnector {
    pub fn new(name: &str, base_url: &str, settings: ConnectorSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            settings,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body, retrying transient failures per the settings.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.with_retry(|| async {
            let response = self
                .client
                .post(self.url(path))
                .json(body)
                .send()
                .await
                .map_err(classify_reqwest)?;
            decode_response(response).await
        })
        .await
    }

    /// GET a JSON document, retrying transient failures per the settings.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        self.with_retry(|| async {
            let response = self
                .client
                .get(self.url(path))
                .send()
                .await
                .map_err(classify_reqwest)?;
            decode_response(response).await
        })
        .await
    }

    async fn with_retry<F, Fut>(&self, op: F) -> Result<Value>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Value>>,
    {
        let mut backoff = Duration::from_millis(self.settings.backoff_initial_ms);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempts <= self.settings.max_retries => {
                    debug!(connector = %self.name, attempts, error = %e, "retrying connector call");
                    tokio::time::sleep(backoff).await;
                    backoff = Duration::from_millis(
                        (backoff.as_millis() as f64 * self.settings.backoff_factor) as u64,
                    );
                }
                Err(e) => {
                    warn!(connector = %self.name, attempts, error = %e, "connector call failed");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    async fn connect(&self) -> Result<()> {
        // HTTP is connectionless; nothing to establish
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

fn classify_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::UpstreamUnavailable(e.to_string())
    }
}

async fn decode_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::UpstreamUnavailable(format!(
            "upstream returned {}",
            status
        )));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| Error::UpstreamUnavailable(format!("invalid upstream JSON: {}", e)))
}

/// SQL connector over the embedded database
///
/// Exposes generic query/execute verbs; rows come back as JSON objects keyed
/// by column name so agents never touch sqlx types directly.
pub struct SqlConnector {
    name: String,
    db: sqlx::SqlitePool,
    settings: ConnectorSettings,
}

impl SqlConnector {
    pub fn new(name: &str, db: sqlx::SqlitePool) -> Self {
        Self {
            name: name.to_string(),
            db,
            settings: ConnectorSettings::default(),
        }
    }

    /// Run a read query; each row becomes a JSON object.
    pub async fn query(&self, sql: &str) -> Result<Vec<Value>> {
        use sqlx::{Column, Row, TypeInfo};

        let rows = sqlx::query(sql).fetch_all(&self.db).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut object = serde_json::Map::new();
            for column in row.columns() {
                let name = column.name().to_string();
                let value = match column.type_info().name() {
                    "INTEGER" => row
                        .try_get::<i64, _>(column.ordinal())
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                    "REAL" => row
                        .try_get::<f64, _>(column.ordinal())
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                    _ => row
                        .try_get::<String, _>(column.ordinal())
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                };
                object.insert(name, value);
            }
            out.push(Value::Object(object));
        }
        Ok(out)
    }

    /// Run a statement; returns the affected row count.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Connector for SqlConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    async fn connect(&self) -> Result<()> {
        // Pool is established at startup; verify liveness
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Named connector handles available to agents
#[derive(Clone, Default)]
pub struct ConnectorSet {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connector: Arc<dyn Connector>) {
        self.connectors
            .insert(connector.name().to_string(), connector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }

    /// Names from `required` that this set does not provide.
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| !self.connectors.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}
