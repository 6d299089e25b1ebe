//! # PostgreSQL Store
//!
//! Pooled sessions over `tokio-postgres`.
//!
//! Parameters are sent in text format so the server parses each value
//! against the type it inferred for the placeholder, exactly as it would a
//! quoted literal. Row cells come back as `jsonb` (the statement builder
//! wraps every projected column in `to_jsonb`) or as plain catalog scalars.

use std::error::Error;

use bytes::BytesMut;
use deadpool_postgres::{ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::NoTls;
use tracing::{debug, warn};

use super::errors::{StoreError, StoreResult};
use super::{Row, Session, Store};
use crate::sql::{SqlValue, Statement};

/// Connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_dbname")]
    pub dbname: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Maximum pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "postgres".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_pool_size() -> usize {
    16
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: None,
            pool_size: default_pool_size(),
        }
    }
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Pool-backed store
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Build the pool; no connection is opened until the first acquire
    pub fn new(config: &PostgresConfig) -> StoreResult<Self> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.dbname.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = config.password.clone();
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.pool_size.max(1)));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    fn acquire(&self) -> BoxFuture<'_, StoreResult<Box<dyn Session>>> {
        Box::pin(async move {
            let client = self
                .pool
                .get()
                .await
                .map_err(|e| StoreError::connection(e.to_string()))?;
            Ok(Box::new(PgSession::new(client)) as Box<dyn Session>)
        })
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

/// One pooled connection
struct PgSession {
    client: Option<Object>,
    in_transaction: bool,
}

impl PgSession {
    fn new(client: Object) -> Self {
        Self {
            client: Some(client),
            in_transaction: false,
        }
    }

    fn client(&self) -> StoreResult<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::connection("session already released"))
    }

    async fn control(&mut self, command: &str) -> StoreResult<()> {
        self.client()?.batch_execute(command).await?;
        Ok(())
    }
}

impl Session for PgSession {
    fn begin(&mut self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            // Set first: a future dropped mid-BEGIN must not return the connection to the pool
            self.in_transaction = true;
            self.control("BEGIN").await
        })
    }

    fn execute<'a>(&'a mut self, statement: &'a Statement) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let sql = statement.to_sql();
            let params = statement.params();
            debug!(statement = statement.name(), params = params.len(), "execute");

            let refs = param_refs(&params);
            Ok(self.client()?.execute(sql.as_str(), &refs).await?)
        })
    }

    fn query<'a>(&'a mut self, statement: &'a Statement) -> BoxFuture<'a, StoreResult<Vec<Row>>> {
        Box::pin(async move {
            let sql = statement.to_sql();
            let params = statement.params();
            debug!(statement = statement.name(), params = params.len(), "query");

            let refs = param_refs(&params);
            let rows = self.client()?.query(sql.as_str(), &refs).await?;
            rows.iter().map(decode_row).collect()
        })
    }

    fn commit(&mut self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.control("COMMIT").await?;
            self.in_transaction = false;
            Ok(())
        })
    }

    fn rollback(&mut self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            // On failure in_transaction stays set and Drop discards the connection
            self.control("ROLLBACK").await?;
            self.in_transaction = false;
            Ok(())
        })
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        if let Some(client) = self.client.take() {
            // Detach from the pool; closing the connection aborts the transaction server-side
            warn!("session released inside an open transaction, discarding connection");
            drop(Object::take(client));
        }
    }
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl ToSql for SqlValue {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.as_text() {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

fn decode_row(row: &tokio_postgres::Row) -> StoreResult<Row> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

fn decode_cell(row: &tokio_postgres::Row, idx: usize) -> StoreResult<Value> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .map(|v| v.map(Value::Bool).unwrap_or(Value::Null)),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .map(|v| v.map(Value::from).unwrap_or(Value::Null)),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)
            .map(|v| v.unwrap_or(Value::Null)),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map(Value::String).unwrap_or(Value::Null)),
    };
    value.map_err(|e| StoreError::decode(format!("column {} of type {}: {}", idx, ty, e)))
}
