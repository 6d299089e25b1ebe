//! Statement Executor
//!
//! Final pipeline stage. Decodes the request, checks out one session,
//! runs the request's statements inside one transaction and commits.
//! Any failure after `begin` rolls back before it is classified.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, warn};

use super::classify::{classify, Targets};
use super::context::RequestContext;
use super::error::{EngineError, EngineResult};
use super::operation::{Operation, Request};
use super::pipeline::{OperationExecutor, OperationResult};
use super::response::{rows_to_objects, Envelope, Response};
use crate::sql::{Contains, Identifier, SqlValue, Statement};
use crate::store::{Session, Store, StoreError};

/// Default bound on one operation, session checkout included
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

const TABLE_HEADER: [&str; 3] = ["table_schema", "table_name", "table_type"];
const COLUMN_HEADER: [&str; 3] = ["column_name", "column_order", "column_type"];

/// Executes decoded requests against a [`Store`]
pub struct StatementExecutor {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl StatementExecutor {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn run(&self, request: &Request) -> OperationResult {
        let targets = request.targets();
        let mut session = self
            .store
            .acquire()
            .await
            .map_err(|e| classify(&e, &targets))?;
        session.begin().await.map_err(|e| classify(&e, &targets))?;

        match perform(session.as_mut(), request, &targets).await {
            Ok(response) => match session.commit().await {
                Ok(()) => Ok(response),
                Err(e) => {
                    rollback(session.as_mut()).await;
                    Err(classify(&e, &targets))
                }
            },
            Err(e) => {
                rollback(session.as_mut()).await;
                Err(e)
            }
        }
    }
}

impl OperationExecutor for StatementExecutor {
    fn execute<'a>(
        &'a self,
        op: &'a Operation,
        ctx: &'a RequestContext,
    ) -> Pin<Box<dyn Future<Output = OperationResult> + Send + 'a>> {
        Box::pin(async move {
            let request = Request::parse(op.kind()?, op.data.as_ref())?;

            match tokio::time::timeout(self.timeout, self.run(&request)).await {
                Ok(result) => result,
                Err(_) => {
                    // The dropped future took its session with it
                    warn!(
                        request_id = %ctx.request_id,
                        store = self.store.kind(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "operation timed out"
                    );
                    Err(EngineError::FailedTransaction)
                }
            }
        })
    }
}

async fn rollback(session: &mut dyn Session) {
    if let Err(e) = session.rollback().await {
        error!(error = %e, "rollback failed, discarding connection");
    }
}

fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Fails with `UndefinedTable` unless `table` exists
async fn ensure_table(session: &mut dyn Session, table: &Identifier, targets: &Targets) -> EngineResult<()> {
    let rows = session
        .query(&Statement::TableExists {
            table: table.clone(),
        })
        .await
        .map_err(|e| classify(&e, targets))?;

    let exists = rows.first().and_then(|r| r.first()) == Some(&Value::Bool(true));
    if exists {
        Ok(())
    } else {
        Err(EngineError::UndefinedTable(table.to_string()))
    }
}

/// Column names of `table` in ordinal order
async fn column_names(session: &mut dyn Session, table: &Identifier, targets: &Targets) -> EngineResult<Vec<String>> {
    let rows = session
        .query(&Statement::ListColumns {
            table: table.clone(),
        })
        .await
        .map_err(|e| classify(&e, targets))?;

    if rows.is_empty() {
        ensure_table(session, table, targets).await?;
    }

    rows.into_iter()
        .map(|row| match row.into_iter().next() {
            Some(Value::String(name)) => Ok(name),
            _ => Err(classify(
                &StoreError::decode("column listing without a name"),
                targets,
            )),
        })
        .collect()
}

async fn perform(session: &mut dyn Session, request: &Request, targets: &Targets) -> OperationResult {
    let fail = |e: StoreError| classify(&e, targets);

    let statement = match request {
        Request::ListTables => {
            let rows = session.query(&Statement::ListTables).await.map_err(fail)?;
            return Ok(Response::List(rows_to_objects(&header(&TABLE_HEADER), rows)));
        }

        Request::ListColumns { table } => {
            let rows = session
                .query(&Statement::ListColumns {
                    table: table.clone(),
                })
                .await
                .map_err(fail)?;
            if rows.is_empty() {
                ensure_table(session, table, targets).await?;
            }
            return Ok(Response::List(rows_to_objects(&header(&COLUMN_HEADER), rows)));
        }

        Request::ListRows { table } => {
            let names = column_names(session, table, targets).await?;
            if names.is_empty() {
                return Ok(Response::List(Vec::new()));
            }
            let rows = session
                .query(&Statement::SelectRows {
                    table: table.clone(),
                    columns: names.iter().cloned().map(Identifier::from_catalog).collect(),
                    filter: None,
                })
                .await
                .map_err(fail)?;
            return Ok(Response::List(rows_to_objects(&names, rows)));
        }

        Request::SelectRow {
            table,
            column,
            needle,
        } => {
            let names = column_names(session, table, targets).await?;
            if !names.iter().any(|n| n == column.as_str()) {
                return Err(EngineError::UndefinedColumn(column.to_string()));
            }
            let rows = session
                .query(&Statement::SelectRows {
                    table: table.clone(),
                    columns: names.iter().cloned().map(Identifier::from_catalog).collect(),
                    filter: Some(Contains {
                        column: column.clone(),
                        needle: needle.clone(),
                    }),
                })
                .await
                .map_err(fail)?;
            return Ok(Response::List(rows_to_objects(&names, rows)));
        }

        Request::CreateTable { table } => Statement::CreateTable {
            table: table.clone(),
        },
        Request::DeleteTable { table } => Statement::DropTable {
            table: table.clone(),
        },
        Request::CreateColumn {
            table,
            column,
            column_type,
        } => Statement::AddColumn {
            table: table.clone(),
            column: column.clone(),
            column_type: column_type.clone(),
        },
        Request::DeleteColumn { table, column } => Statement::DropColumn {
            table: table.clone(),
            column: column.clone(),
        },
        Request::RenameColumn {
            table,
            column,
            new_column,
        } => Statement::RenameColumn {
            table: table.clone(),
            column: column.clone(),
            new_column: new_column.clone(),
        },
        Request::RetypeColumn {
            table,
            column,
            column_type,
        } => Statement::AlterColumnType {
            table: table.clone(),
            column: column.clone(),
            column_type: column_type.clone(),
        },
        Request::InsertRow { table, values, .. } => Statement::InsertRow {
            table: table.clone(),
            values: values.clone(),
        },
        Request::UpdateRow {
            table,
            row_id,
            values,
            ..
        } => Statement::UpdateRow {
            table: table.clone(),
            row_id: SqlValue::from_json(row_id),
            values: values.clone(),
        },
        Request::DeleteRow { table, row_id } => Statement::DeleteRow {
            table: table.clone(),
            row_id: SqlValue::from_json(row_id),
        },
    };

    session.execute(&statement).await.map_err(fail)?;
    Ok(Response::Success(Envelope::for_request(request)))
}
