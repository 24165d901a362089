//! DuckDB warehouse backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{BulkLoad, Row, Value, Warehouse};
use async_trait::async_trait;
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wf_core::sql_utils::{escape_sql_string, quote_ident, truncate_statement};
use wf_core::{ColumnMapping, Credentials, SourceFormat};

type SharedConnection = Arc<Mutex<Connection>>;

/// DuckDB warehouse backend.
///
/// Holds a small pool of connections to one database, handed out round-robin
/// so concurrently running tasks do not serialize on a single lock. Every call
/// runs on tokio's blocking pool.
pub struct DuckDbBackend {
    pool: Vec<SharedConnection>,
    next: AtomicUsize,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB database with a single connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_pool(conn, 1)
    }

    /// Open a DuckDB database file with a single connection
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_pool(conn, 1)
    }

    /// Open from a path string (handles `:memory:`) with `pool_size` connections
    pub fn new(path: &str, pool_size: usize) -> DbResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(path))
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_pool(conn, pool_size)
    }

    fn with_pool(conn: Connection, pool_size: usize) -> DbResult<Self> {
        let mut pool = Vec::with_capacity(pool_size.max(1));
        for _ in 1..pool_size.max(1) {
            let clone = conn
                .try_clone()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            pool.push(Arc::new(Mutex::new(clone)));
        }
        pool.push(Arc::new(Mutex::new(conn)));
        log::debug!("Opened DuckDB with {} connection(s)", pool.len());
        Ok(Self {
            pool,
            next: AtomicUsize::new(0),
        })
    }

    /// Number of pooled connections
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    fn checkout(&self) -> SharedConnection {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        Arc::clone(&self.pool[idx])
    }

    /// Run `f` against a pooled connection on the blocking pool
    async fn with_connection<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DbResult<T> + Send + 'static,
    {
        let shared = self.checkout();
        tokio::task::spawn_blocking(move || {
            let mut conn = shared
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| DbError::Internal(format!("blocking task failed: {}", e)))?
    }
}

/// Execute a batch inside one transaction
fn run_in_transaction(conn: &mut Connection, sql: &str) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.commit()?;
    Ok(())
}

fn query_sync(conn: &Connection, sql: &str) -> DbResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let width = row.as_ref().column_count();
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let value: DuckValue = row.get(i)?;
            values.push(convert_value(value));
        }
        result.push(values);
    }
    Ok(result)
}

fn convert_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(i) => match i64::try_from(i) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Float(i as f64),
        },
        DuckValue::HugeInt(i) => match i64::try_from(i) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Float(i as f64),
        },
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => {
            let text = d.to_string();
            match text.parse() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::Text(text),
            }
        }
        DuckValue::Text(s) => Value::Text(s),
        other => Value::Text(format!("{:?}", other)),
    }
}

/// Secret authorizing object-storage reads for a load, scoped to its bucket.
/// Created outside the load's transaction.
pub(crate) fn secret_statement(load: &BulkLoad) -> DbResult<Option<String>> {
    let (access_key_id, secret_access_key, session_token) = match &load.credentials {
        None => return Ok(None),
        Some(Credentials::KeyPair {
            access_key_id,
            secret_access_key,
            session_token,
        }) => (access_key_id, secret_access_key, session_token),
        Some(Credentials::ConnectionString(_)) => {
            return Err(DbError::LoadError(
                "connection string credentials cannot authorize object storage reads"
                    .to_string(),
            ))
        }
    };

    let secret_type = if load.uri.starts_with("gs://") {
        "GCS"
    } else if load.uri.starts_with("s3://") {
        "S3"
    } else {
        return Err(DbError::LoadError(format!(
            "credentials given for non object-storage source '{}'",
            load.uri
        )));
    };

    let mut options = vec![
        format!("TYPE {}", secret_type),
        format!("KEY_ID '{}'", escape_sql_string(access_key_id)),
        format!("SECRET '{}'", escape_sql_string(secret_access_key)),
    ];
    if let Some(token) = session_token {
        options.push(format!("SESSION_TOKEN '{}'", escape_sql_string(token)));
    }
    if let Some(region) = &load.region {
        options.push(format!("REGION '{}'", escape_sql_string(region)));
    }
    options.push(format!(
        "SCOPE '{}'",
        escape_sql_string(bucket_scope(&load.uri))
    ));

    Ok(Some(format!(
        "CREATE OR REPLACE SECRET {} ({})",
        quote_ident(&secret_name(load)),
        options.join(", ")
    )))
}

/// `s3://bucket/key/...` -> `s3://bucket/`
fn bucket_scope(uri: &str) -> &str {
    let Some(scheme_end) = uri.find("://").map(|i| i + 3) else {
        return uri;
    };
    match uri[scheme_end..].find('/') {
        Some(slash) => &uri[..scheme_end + slash + 1],
        None => uri,
    }
}

/// The transactional part of a load. `json_paths` holds the paths read from
/// the mapping file when the format uses one.
pub(crate) fn load_statement(load: &BulkLoad, json_paths: &[String]) -> DbResult<String> {
    let uri = escape_sql_string(&load.uri);
    let target = load.target.quoted();

    let read = match &load.format {
        SourceFormat::Json {
            mapping: ColumnMapping::Auto,
        } => format!("INSERT INTO {} BY NAME SELECT * FROM read_json_auto('{}')", target, uri),
        SourceFormat::Json {
            mapping: ColumnMapping::JsonPaths(file),
        } => {
            if json_paths.is_empty() {
                return Err(DbError::LoadError(format!(
                    "json_paths file '{}' lists no paths",
                    file
                )));
            }
            // Positional: the n-th path fills the n-th column of the target
            let columns = json_paths
                .iter()
                .map(|path| {
                    format!(
                        "json_extract_string(json, '{}')",
                        escape_sql_string(&duckdb_json_path(path))
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} SELECT {} FROM read_json_objects('{}')",
                target, columns, uri
            )
        }
        SourceFormat::Csv { delimiter, header } => {
            let by_name = if *header { " BY NAME" } else { "" };
            format!(
                "INSERT INTO {}{} SELECT * FROM read_csv('{}', delim = '{}', header = {})",
                target,
                by_name,
                uri,
                escape_sql_string(&delimiter.to_string()),
                header
            )
        }
    };

    Ok(if load.truncate {
        format!("{};\n{};", truncate_statement(&load.target), read)
    } else {
        format!("{};", read)
    })
}

/// Paths listed by a JSON-paths document (`{"jsonpaths": ["$['artist']", ...]}`)
pub(crate) fn parse_json_paths(content: &str) -> DbResult<Vec<String>> {
    let doc: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| DbError::LoadError(format!("invalid json_paths file: {}", e)))?;
    let Some(paths) = doc.get("jsonpaths").and_then(|v| v.as_array()) else {
        return Err(DbError::LoadError(
            "json_paths file has no 'jsonpaths' array".to_string(),
        ));
    };
    paths
        .iter()
        .map(|p| {
            p.as_str().map(str::to_string).ok_or_else(|| {
                DbError::LoadError(format!("json_paths entry {} is not a string", p))
            })
        })
        .collect()
}

/// Rewrite bracket notation into DuckDB's JSON path dialect:
/// `$['a']['b'][0]` becomes `$."a"."b"[0]`. Dot notation passes through.
pub(crate) fn duckdb_json_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 4);
    let mut rest = path.trim();
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.chars().next() {
            Some(quote @ ('\'' | '"')) => match after[1..].find(quote) {
                Some(len) => {
                    out.push_str(".\"");
                    out.push_str(&after[1..1 + len].replace('"', "\\\""));
                    out.push('"');
                    let tail = &after[2 + len..];
                    rest = tail.strip_prefix(']').unwrap_or(tail);
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            },
            _ => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn read_json_paths(conn: &Connection, file: &str) -> DbResult<Vec<String>> {
    let sql = format!("SELECT content FROM read_text('{}')", escape_sql_string(file));
    let rows = query_sync(conn, &sql).map_err(|e| match e {
        DbError::ExecutionError(msg) | DbError::TableNotFound(msg) => DbError::LoadError(
            format!("cannot read json_paths file '{}': {}", file, msg),
        ),
        other => other,
    })?;
    match rows.first().and_then(|row| row.first()) {
        Some(Value::Text(content)) => parse_json_paths(content),
        _ => Err(DbError::LoadError(format!(
            "json_paths file '{}' is empty",
            file
        ))),
    }
}

fn secret_name(load: &BulkLoad) -> String {
    let slug: String = load
        .target
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("wf_stage_{}", slug.to_lowercase())
}

#[async_trait]
impl Warehouse for DuckDbBackend {
    async fn run(&self, sql: &str) -> DbResult<()> {
        log::debug!("duckdb run: {}", sql);
        let sql = sql.to_string();
        self.with_connection(move |conn| run_in_transaction(conn, &sql))
            .await
    }

    async fn bulk_load(&self, load: &BulkLoad) -> DbResult<()> {
        let secret = secret_statement(load)?;
        log::debug!("duckdb bulk load into {} from {}", load.target, load.uri);
        let load = load.clone();
        self.with_connection(move |conn| {
            if let Some(secret) = secret {
                conn.execute_batch(&secret)?;
            }
            let json_paths = match &load.format {
                SourceFormat::Json {
                    mapping: ColumnMapping::JsonPaths(file),
                } => read_json_paths(conn, file)?,
                _ => Vec::new(),
            };
            let sql = load_statement(&load, &json_paths)?;
            run_in_transaction(conn, &sql).map_err(|e| match e {
                DbError::ExecutionError(msg) => DbError::LoadError(msg),
                other => other,
            })
        })
        .await
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        log::debug!("duckdb query: {}", sql);
        let sql = sql.to_string();
        self.with_connection(move |conn| query_sync(conn, &sql)).await
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
