//! # In-Memory Store
//!
//! An in-process catalog that interprets the statement set directly.
//!
//! It reports failures with the same SQLSTATE codes and message shapes as
//! PostgreSQL so the classifier sees identical input from both stores.
//! Transactions are serialized. `begin` takes the store's writer lock and
//! clones the committed catalog; `commit` publishes the clone and
//! `rollback` (or dropping the session) discards it, both releasing the
//! lock. Autocommit statements take the same lock, so no committed work is
//! ever overwritten by a stale snapshot. As in PostgreSQL, a failed
//! statement poisons the rest of its transaction.
//!
//! Supported column types: integer, bigint, smallint, text,
//! character varying(n), boolean, real, double precision, numeric, jsonb.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{Number, Value};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::errors::{StoreError, StoreResult};
use super::{Row, Session, Store};
use crate::sql::{Assignment, ColumnType, Identifier, SqlValue, Statement, DEFAULT_SCHEMA, ROW_ID_COLUMN};

// ==================
// Types
// ==================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemType {
    Integer,
    BigInt,
    SmallInt,
    Text,
    Varchar(Option<usize>),
    Boolean,
    Real,
    Double,
    Numeric,
    Jsonb,
}

impl MemType {
    fn parse(column_type: &ColumnType) -> StoreResult<Self> {
        let declared = column_type.as_str();
        if declared.ends_with("[]") {
            return Err(StoreError::database(
                "0A000",
                format!("array type {} is not supported by the memory store", declared),
            ));
        }

        let (name, modifier) = match declared.split_once('(') {
            Some((name, rest)) => (name.trim(), Some(rest.trim_end_matches(')').trim())),
            None => (declared, None),
        };

        let ty = match name {
            "integer" | "int" | "int4" | "serial" | "serial4" => Self::Integer,
            "bigint" | "int8" | "bigserial" | "serial8" => Self::BigInt,
            "smallint" | "int2" => Self::SmallInt,
            "text" => Self::Text,
            "varchar" | "character varying" => {
                let limit = modifier.and_then(|m| m.parse::<usize>().ok());
                Self::Varchar(limit)
            }
            "boolean" | "bool" => Self::Boolean,
            "real" | "float4" => Self::Real,
            "double precision" | "float8" | "float" => Self::Double,
            "numeric" | "decimal" => Self::Numeric,
            "jsonb" => Self::Jsonb,
            _ => {
                return Err(StoreError::database(
                    "42704",
                    format!("type \"{}\" does not exist", name),
                )
                .with_datatype(name))
            }
        };
        Ok(ty)
    }

    /// Name as reported by `information_schema.columns.data_type`
    fn data_type(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::SmallInt => "smallint",
            Self::Text => "text",
            Self::Varchar(_) => "character varying",
            Self::Boolean => "boolean",
            Self::Real => "real",
            Self::Double => "double precision",
            Self::Numeric => "numeric",
            Self::Jsonb => "jsonb",
        }
    }

    /// Parse text input the way the type's input function would
    fn input(&self, text: &str) -> StoreResult<Value> {
        let invalid = || {
            StoreError::database(
                "22P02",
                format!("invalid input syntax for type {}: \"{}\"", self.data_type(), text),
            )
        };
        let out_of_range = || {
            StoreError::database(
                "22003",
                format!("value \"{}\" is out of range for type {}", text, self.data_type()),
            )
        };

        match self {
            Self::Integer | Self::BigInt | Self::SmallInt => {
                let n: i64 = text.trim().parse().map_err(|_| invalid())?;
                let in_range = match self {
                    Self::Integer => i32::try_from(n).is_ok(),
                    Self::SmallInt => i16::try_from(n).is_ok(),
                    _ => true,
                };
                if !in_range {
                    return Err(out_of_range());
                }
                Ok(Value::from(n))
            }
            Self::Text => Ok(Value::String(text.to_string())),
            Self::Varchar(limit) => {
                if let Some(limit) = limit {
                    if text.chars().count() > *limit {
                        return Err(StoreError::database(
                            "22001",
                            format!("value too long for type character varying({})", limit),
                        ));
                    }
                }
                Ok(Value::String(text.to_string()))
            }
            Self::Boolean => match text.trim().to_lowercase().as_str() {
                "t" | "true" | "y" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "f" | "false" | "n" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Real | Self::Double | Self::Numeric => {
                let f: f64 = text.trim().parse().map_err(|_| invalid())?;
                Number::from_f64(f).map(Value::Number).ok_or_else(invalid)
            }
            Self::Jsonb => serde_json::from_str(text).map_err(|_| invalid()),
        }
    }

    /// Explicit cast of an already stored value
    fn cast(&self, from: MemType, value: &Value) -> StoreResult<Value> {
        match (from, self, value) {
            (_, _, Value::Null) => Ok(Value::Null),
            (MemType::Boolean, Self::Integer | Self::BigInt | Self::SmallInt, Value::Bool(b)) => {
                Ok(Value::from(i64::from(*b)))
            }
            (MemType::Integer | MemType::BigInt | MemType::SmallInt, Self::Boolean, Value::Number(n)) => {
                Ok(Value::Bool(n.as_i64() != Some(0)))
            }
            (MemType::Boolean, Self::Real | Self::Double | Self::Numeric | Self::Jsonb, _) => {
                Err(StoreError::database(
                    "42846",
                    format!("cannot cast type boolean to {}", self.data_type()),
                )
                .with_datatype(self.data_type()))
            }
            (MemType::Jsonb, Self::Text | Self::Varchar(_), v) => self.input(&v.to_string()),
            _ => self.input(&text_of(value).unwrap_or_default()),
        }
    }
}

/// `value::text`, or `None` for NULL
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    ty: MemType,
    ordinal: i32,
    serial: bool,
}

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<Column>,
    /// Cells aligned with `columns`
    rows: Vec<Vec<Value>>,
    next_ordinal: i32,
    next_serial: i64,
}

impl Table {
    fn new() -> Self {
        Self {
            columns: vec![Column {
                name: ROW_ID_COLUMN.to_string(),
                ty: MemType::Integer,
                ordinal: 1,
                serial: true,
            }],
            rows: Vec::new(),
            next_ordinal: 2,
            next_serial: 1,
        }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    tables: BTreeMap<String, Table>,
}

enum Outcome {
    Rows(Vec<Row>),
    Count(u64),
}

// ==================
// Error shapes
// ==================

fn relation_missing(table: &Identifier) -> StoreError {
    StoreError::database("42P01", format!("relation \"{}\" does not exist", table))
}

fn column_missing(column: &str, table: Option<&Identifier>) -> StoreError {
    let message = match table {
        Some(t) => format!("column \"{}\" of relation \"{}\" does not exist", column, t),
        None => format!("column \"{}\" does not exist", column),
    };
    StoreError::database("42703", message)
}

fn column_exists(column: &str, table: &Identifier) -> StoreError {
    StoreError::database(
        "42701",
        format!("column \"{}\" of relation \"{}\" already exists", column, table),
    )
}

fn aborted() -> StoreError {
    StoreError::database(
        "25P02",
        "current transaction is aborted, commands ignored until end of transaction block",
    )
}

// ==================
// Statement interpretation
// ==================

fn table_mut<'a>(catalog: &'a mut Catalog, table: &Identifier) -> StoreResult<&'a mut Table> {
    catalog
        .tables
        .get_mut(table.as_str())
        .ok_or_else(|| relation_missing(table))
}

fn apply(catalog: &mut Catalog, statement: &Statement) -> StoreResult<Outcome> {
    match statement {
        Statement::ListTables => Ok(Outcome::Rows(
            catalog
                .tables
                .keys()
                .map(|name| {
                    vec![
                        Value::from(DEFAULT_SCHEMA),
                        Value::from(name.as_str()),
                        Value::from("BASE TABLE"),
                    ]
                })
                .collect(),
        )),

        Statement::TableExists { table } => Ok(Outcome::Rows(vec![vec![Value::Bool(
            catalog.tables.contains_key(table.as_str()),
        )]])),

        Statement::CreateTable { table } => {
            if catalog.tables.contains_key(table.as_str()) {
                return Err(StoreError::database(
                    "42P07",
                    format!("relation \"{}\" already exists", table),
                ));
            }
            catalog.tables.insert(table.to_string(), Table::new());
            Ok(Outcome::Count(0))
        }

        Statement::DropTable { table } => {
            if catalog.tables.remove(table.as_str()).is_none() {
                return Err(StoreError::database(
                    "42P01",
                    format!("table \"{}\" does not exist", table),
                ));
            }
            Ok(Outcome::Count(0))
        }

        Statement::ListColumns { table } => {
            let rows = catalog
                .tables
                .get(table.as_str())
                .map(|t| {
                    t.columns
                        .iter()
                        .map(|c| {
                            vec![
                                Value::from(c.name.as_str()),
                                Value::from(c.ordinal),
                                Value::from(c.ty.data_type()),
                            ]
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Outcome::Rows(rows))
        }

        Statement::AddColumn {
            table,
            column,
            column_type,
        } => {
            let t = table_mut(catalog, table)?;
            if t.position(column.as_str()).is_some() {
                return Err(column_exists(column.as_str(), table));
            }
            let ty = MemType::parse(column_type)?;
            t.columns.push(Column {
                name: column.to_string(),
                ty,
                ordinal: t.next_ordinal,
                serial: false,
            });
            t.next_ordinal += 1;
            for row in &mut t.rows {
                row.push(Value::Null);
            }
            Ok(Outcome::Count(0))
        }

        Statement::DropColumn { table, column } => {
            let t = table_mut(catalog, table)?;
            let idx = t
                .position(column.as_str())
                .ok_or_else(|| column_missing(column.as_str(), Some(table)))?;
            t.columns.remove(idx);
            for row in &mut t.rows {
                row.remove(idx);
            }
            Ok(Outcome::Count(0))
        }

        Statement::RenameColumn {
            table,
            column,
            new_column,
        } => {
            let t = table_mut(catalog, table)?;
            let idx = t
                .position(column.as_str())
                .ok_or_else(|| column_missing(column.as_str(), None))?;
            if t.position(new_column.as_str()).is_some() {
                return Err(column_exists(new_column.as_str(), table));
            }
            t.columns[idx].name = new_column.to_string();
            Ok(Outcome::Count(0))
        }

        Statement::AlterColumnType {
            table,
            column,
            column_type,
        } => {
            let t = table_mut(catalog, table)?;
            let idx = t
                .position(column.as_str())
                .ok_or_else(|| column_missing(column.as_str(), Some(table)))?;
            let target = MemType::parse(column_type)?;
            let from = t.columns[idx].ty;

            let converted = t
                .rows
                .iter()
                .map(|row| target.cast(from, &row[idx]))
                .collect::<StoreResult<Vec<_>>>()?;
            for (row, value) in t.rows.iter_mut().zip(converted) {
                row[idx] = value;
            }
            t.columns[idx].ty = target;
            Ok(Outcome::Count(0))
        }

        Statement::SelectRows {
            table,
            columns,
            filter,
        } => {
            let t = catalog
                .tables
                .get(table.as_str())
                .ok_or_else(|| relation_missing(table))?;
            let projection = columns
                .iter()
                .map(|c| t.position(c.as_str()).ok_or_else(|| column_missing(c.as_str(), None)))
                .collect::<StoreResult<Vec<_>>>()?;
            let filter = match filter {
                Some(f) => {
                    let idx = t
                        .position(f.column.as_str())
                        .ok_or_else(|| column_missing(f.column.as_str(), None))?;
                    Some((idx, f.needle.as_text().map(str::to_string)))
                }
                None => None,
            };

            let rows = t
                .rows
                .iter()
                .filter(|row| match &filter {
                    None => true,
                    Some((_, None)) => false,
                    Some((idx, Some(needle))) => text_of(&row[*idx])
                        .map(|text| text.contains(needle.as_str()))
                        .unwrap_or(false),
                })
                .map(|row| projection.iter().map(|&i| row[i].clone()).collect())
                .collect();
            Ok(Outcome::Rows(rows))
        }

        Statement::InsertRow { table, values } => {
            let t = table_mut(catalog, table)?;
            let assigned = resolve_assignments(t, table, values)?;

            let mut row = Vec::with_capacity(t.columns.len());
            let mut used_serial = false;
            for (idx, column) in t.columns.iter().enumerate() {
                let value = match assigned.iter().find(|(i, _)| *i == idx) {
                    Some((_, v)) => v.clone(),
                    None if column.serial => {
                        used_serial = true;
                        Value::from(t.next_serial)
                    }
                    None => Value::Null,
                };
                row.push(value);
            }

            if let Some(pk) = t.columns.iter().position(|c| c.serial) {
                if t.rows.iter().any(|r| r[pk] == row[pk]) {
                    return Err(StoreError::database(
                        "23505",
                        format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
                    ));
                }
            }
            if used_serial {
                t.next_serial += 1;
            }
            t.rows.push(row);
            Ok(Outcome::Count(1))
        }

        Statement::UpdateRow {
            table,
            row_id,
            values,
        } => {
            let t = table_mut(catalog, table)?;
            let assigned = resolve_assignments(t, table, values)?;
            let matches = rows_with_id(t, row_id)?;
            for &r in &matches {
                for (idx, value) in &assigned {
                    t.rows[r][*idx] = value.clone();
                }
            }
            Ok(Outcome::Count(matches.len() as u64))
        }

        Statement::DeleteRow { table, row_id } => {
            let t = table_mut(catalog, table)?;
            let matches = rows_with_id(t, row_id)?;
            let mut idx = 0;
            t.rows.retain(|_| {
                let keep = !matches.contains(&idx);
                idx += 1;
                keep
            });
            Ok(Outcome::Count(matches.len() as u64))
        }
    }
}

/// Column positions and parsed values for an insert/update target list
fn resolve_assignments(
    t: &Table,
    table: &Identifier,
    values: &[Assignment],
) -> StoreResult<Vec<(usize, Value)>> {
    let mut resolved: Vec<(usize, Value)> = Vec::with_capacity(values.len());
    for assignment in values {
        let name = assignment.column.as_str();
        let idx = t.position(name).ok_or_else(|| column_missing(name, Some(table)))?;
        if resolved.iter().any(|(i, _)| *i == idx) {
            return Err(StoreError::database(
                "42701",
                format!("column \"{}\" specified more than once", name),
            ));
        }
        let value = match assignment.value.as_text() {
            Some(text) => t.columns[idx].ty.input(text)?,
            None => Value::Null,
        };
        resolved.push((idx, value));
    }
    Ok(resolved)
}

/// Row indices matching `id = $row_id`
fn rows_with_id(t: &Table, row_id: &SqlValue) -> StoreResult<Vec<usize>> {
    let pk = t
        .position(ROW_ID_COLUMN)
        .ok_or_else(|| column_missing(ROW_ID_COLUMN, None))?;
    let wanted = match row_id.as_text() {
        Some(text) => t.columns[pk].ty.input(text)?,
        None => return Ok(Vec::new()),
    };
    Ok(t.rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row[pk] == wanted)
        .map(|(i, _)| i)
        .collect())
}

// ==================
// Store
// ==================

#[derive(Default)]
struct Hooks {
    unavailable: bool,
    delay: Option<Duration>,
    failures: Vec<(&'static str, StoreError)>,
}

#[derive(Default)]
struct Counters {
    sessions: AtomicU64,
    statements: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

struct Shared {
    catalog: Mutex<Catalog>,
    /// Held by the open transaction, or by one autocommit statement
    writer: Arc<AsyncMutex<()>>,
    hooks: Mutex<Hooks>,
    counters: Counters,
}

impl Shared {
    fn catalog(&self) -> StoreResult<MutexGuard<'_, Catalog>> {
        self.catalog
            .lock()
            .map_err(|_| StoreError::connection("memory catalog lock poisoned"))
    }

    fn hooks(&self) -> StoreResult<MutexGuard<'_, Hooks>> {
        self.hooks
            .lock()
            .map_err(|_| StoreError::connection("memory hooks lock poisoned"))
    }
}

/// Counters observed by the store since creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    pub sessions: u64,
    pub statements: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

/// In-process store
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog: Mutex::new(Catalog::default()),
                writer: Arc::new(AsyncMutex::new(())),
                hooks: Mutex::new(Hooks::default()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let c = &self.shared.counters;
        MemoryStats {
            sessions: c.sessions.load(Ordering::SeqCst),
            statements: c.statements.load(Ordering::SeqCst),
            commits: c.commits.load(Ordering::SeqCst),
            rollbacks: c.rollbacks.load(Ordering::SeqCst),
        }
    }

    /// Make `acquire` fail until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut hooks) = self.shared.hooks.lock() {
            hooks.unavailable = unavailable;
        }
    }

    /// Sleep before every statement
    pub fn set_statement_delay(&self, delay: Option<Duration>) {
        if let Ok(mut hooks) = self.shared.hooks.lock() {
            hooks.delay = delay;
        }
    }

    /// Fail the next statement with the given name (see [`Statement::name`])
    pub fn fail_next(&self, statement: &'static str, err: StoreError) {
        if let Ok(mut hooks) = self.shared.hooks.lock() {
            hooks.failures.push((statement, err));
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn acquire(&self) -> BoxFuture<'_, StoreResult<Box<dyn Session>>> {
        Box::pin(async move {
            if self.shared.hooks()?.unavailable {
                return Err(StoreError::connection("memory store unavailable"));
            }
            self.shared.counters.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemorySession {
                shared: Arc::clone(&self.shared),
                txn: None,
                aborted: false,
            }) as Box<dyn Session>)
        })
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// An open transaction and the writer lock it holds
struct Transaction {
    working: Catalog,
    _writer: OwnedMutexGuard<()>,
}

struct MemorySession {
    shared: Arc<Shared>,
    txn: Option<Transaction>,
    aborted: bool,
}

impl MemorySession {
    async fn step(&mut self, statement: &Statement) -> StoreResult<Outcome> {
        let delay = self.shared.hooks()?.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.shared.counters.statements.fetch_add(1, Ordering::SeqCst);

        let injected = {
            let mut hooks = self.shared.hooks()?;
            hooks
                .failures
                .iter()
                .position(|(name, _)| *name == statement.name())
                .map(|i| hooks.failures.remove(i).1)
        };
        if let Some(err) = injected {
            self.aborted = self.txn.is_some();
            return Err(err);
        }

        if self.aborted {
            return Err(aborted());
        }

        match self.txn.as_mut() {
            Some(txn) => {
                let result = apply(&mut txn.working, statement);
                if result.is_err() {
                    self.aborted = true;
                }
                result
            }
            None => {
                // Autocommit: statements validate before mutating
                let _writer = self.shared.writer.lock().await;
                let mut catalog = self.shared.catalog()?;
                apply(&mut catalog, statement)
            }
        }
    }
}

impl Session for MemorySession {
    fn begin(&mut self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            if self.txn.is_some() {
                return Ok(());
            }
            let writer = Arc::clone(&self.shared.writer).lock_owned().await;
            let working = self.shared.catalog()?.clone();
            self.txn = Some(Transaction {
                working,
                _writer: writer,
            });
            self.aborted = false;
            Ok(())
        })
    }

    fn execute<'a>(&'a mut self, statement: &'a Statement) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            match self.step(statement).await? {
                Outcome::Count(n) => Ok(n),
                Outcome::Rows(rows) => Ok(rows.len() as u64),
            }
        })
    }

    fn query<'a>(&'a mut self, statement: &'a Statement) -> BoxFuture<'a, StoreResult<Vec<Row>>> {
        Box::pin(async move {
            match self.step(statement).await? {
                Outcome::Rows(rows) => Ok(rows),
                Outcome::Count(_) => Err(StoreError::decode(format!(
                    "{} does not return rows",
                    statement.name()
                ))),
            }
        })
    }

    fn commit(&mut self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let txn = self.txn.take();
            if self.aborted {
                // PostgreSQL turns COMMIT of an aborted transaction into ROLLBACK
                self.aborted = false;
                self.shared.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            if let Some(txn) = txn {
                *self.shared.catalog()? = txn.working;
            }
            self.shared.counters.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn rollback(&mut self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.txn = None;
            self.aborted = false;
            self.shared.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
