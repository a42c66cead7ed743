//! The pending operation log: enqueue with idempotency de-duplication,
//! eligibility queries, status transitions, dependency edges, cascading
//! withdrawal, and crash requeue.

use std::collections::{BTreeSet, VecDeque};
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use fieldsync_core::errors::FieldsyncResult;
use fieldsync_core::id::{BlobId, EntityId, OperationId};
use fieldsync_core::op::{OpKind, OpStatus, PendingOperation};

use super::parse_ts;
use crate::to_store_err;

/// Append an operation and its dependency edges in one transaction.
///
/// De-duplication: when an operation with the same idempotency key already
/// exists with non-terminal status, this is a no-op returning the existing
/// id. That is what absorbs a UI action retried before the first attempt
/// has synced.
pub fn enqueue(conn: &Connection, op: &PendingOperation) -> FieldsyncResult<OperationId> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT operation_id FROM pending_ops
             WHERE idempotency_key = ?1 AND status IN ('pending', 'in_flight')",
            params![op.idempotency_key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    if let Some(id) = existing {
        let id = OperationId::from_str(&id).map_err(|e| to_store_err(e.to_string()))?;
        tracing::debug!(operation_id = %id, "enqueue absorbed by idempotency key");
        return Ok(id);
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_store_err(format!("enqueue begin: {e}")))?;

    tx.execute(
        "INSERT INTO pending_ops (
            operation_id, kind, target, entity_type, service_id, payload,
            blob_id, status, priority, attempt_count, next_eligible_at,
            idempotency_key, last_error, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            op.operation_id.to_string(),
            op.kind.as_str(),
            op.target.to_string(),
            op.entity_type,
            op.service_id,
            op.payload.to_string(),
            op.blob_id.map(|b| b.to_string()),
            op.status.as_str(),
            op.priority,
            op.attempt_count,
            op.next_eligible_at.to_rfc3339(),
            op.idempotency_key,
            op.last_error,
            op.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    for dep in &op.dependencies {
        tx.execute(
            "INSERT OR IGNORE INTO op_deps (op_id, depends_on) VALUES (?1, ?2)",
            params![op.operation_id.to_string(), dep.to_string()],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    }

    tx.commit()
        .map_err(|e| to_store_err(format!("enqueue commit: {e}")))?;
    Ok(op.operation_id)
}

pub fn get_op(conn: &Connection, id: &OperationId) -> FieldsyncResult<Option<PendingOperation>> {
    let row = conn
        .query_row(
            &format!("{SELECT_OP} WHERE operation_id = ?1"),
            params![id.to_string()],
            row_to_parts,
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;
    match row {
        Some(parts) => {
            let mut op = parts_to_op(parts)?;
            op.dependencies = load_deps(conn, &op.operation_id)?;
            Ok(Some(op))
        }
        None => Ok(None),
    }
}

/// Eligible operations: pending, past their backoff window, with no
/// non-synced dependency. An edge onto a removed operation does not block
/// (removal cascades through dependents, so a dangling edge can only point
/// at something that was withdrawn together with its graph).
pub fn eligible(
    conn: &Connection,
    now: chrono::DateTime<chrono::Utc>,
    limit: usize,
) -> FieldsyncResult<Vec<PendingOperation>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_OP}
             WHERE status = 'pending'
               AND next_eligible_at <= ?1
               AND NOT EXISTS (
                   SELECT 1 FROM op_deps d
                   JOIN pending_ops p ON p.operation_id = d.depends_on
                   WHERE d.op_id = pending_ops.operation_id
                     AND p.status != 'synced'
               )
             ORDER BY priority DESC, seq ASC
             LIMIT ?2"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![now.to_rfc3339(), limit as i64], row_to_parts)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut ops = Vec::new();
    for row in rows {
        let parts = row.map_err(|e| to_store_err(e.to_string()))?;
        let mut op = parts_to_op(parts)?;
        op.dependencies = load_deps(conn, &op.operation_id)?;
        ops.push(op);
    }
    Ok(ops)
}

/// pending → in_flight, bumping the attempt counter. Returns the attempt
/// count including this attempt. Errors if the operation is not pending.
pub fn mark_in_flight(conn: &Connection, id: &OperationId) -> FieldsyncResult<u32> {
    let changed = conn
        .execute(
            "UPDATE pending_ops
             SET status = 'in_flight', attempt_count = attempt_count + 1
             WHERE operation_id = ?1 AND status = 'pending'",
            params![id.to_string()],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    if changed == 0 {
        return Err(to_store_err(format!(
            "operation {id} is not pending, cannot dispatch"
        )));
    }
    conn.query_row(
        "SELECT attempt_count FROM pending_ops WHERE operation_id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| to_store_err(e.to_string()))
}

pub fn mark_synced(conn: &Connection, id: &OperationId) -> FieldsyncResult<()> {
    conn.execute(
        "UPDATE pending_ops SET status = 'synced', last_error = NULL
         WHERE operation_id = ?1",
        params![id.to_string()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn mark_failed(
    conn: &Connection,
    id: &OperationId,
    error: &str,
    next_eligible_at: chrono::DateTime<chrono::Utc>,
    terminal: bool,
) -> FieldsyncResult<()> {
    let status = if terminal { "failed" } else { "pending" };
    conn.execute(
        "UPDATE pending_ops
         SET status = ?2, last_error = ?3, next_eligible_at = ?4
         WHERE operation_id = ?1",
        params![
            id.to_string(),
            status,
            error,
            next_eligible_at.to_rfc3339()
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn dependents_of(conn: &Connection, id: &OperationId) -> FieldsyncResult<Vec<OperationId>> {
    let mut stmt = conn
        .prepare("SELECT op_id FROM op_deps WHERE depends_on = ?1")
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![id.to_string()], |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut deps = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| to_store_err(e.to_string()))?;
        deps.push(OperationId::from_str(&raw).map_err(|e| to_store_err(e.to_string()))?);
    }
    Ok(deps)
}

/// Non-terminal operations targeting an entity, in creation order.
pub fn ops_for_target(
    conn: &Connection,
    target: &EntityId,
) -> FieldsyncResult<Vec<PendingOperation>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_OP}
             WHERE target = ?1 AND status IN ('pending', 'in_flight')
             ORDER BY seq ASC"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![target.to_string()], row_to_parts)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut ops = Vec::new();
    for row in rows {
        let parts = row.map_err(|e| to_store_err(e.to_string()))?;
        let mut op = parts_to_op(parts)?;
        op.dependencies = load_deps(conn, &op.operation_id)?;
        ops.push(op);
    }
    Ok(ops)
}

/// Withdraw an operation and every not-yet-dispatched transitive dependent.
/// Only `pending` operations are removed; anything already in flight is
/// left to complete and reconcile.
pub fn remove_with_dependents(conn: &Connection, id: &OperationId) -> FieldsyncResult<usize> {
    let mut to_visit = VecDeque::from([*id]);
    let mut doomed: BTreeSet<OperationId> = BTreeSet::new();

    while let Some(current) = to_visit.pop_front() {
        if !doomed.insert(current) {
            continue;
        }
        for dependent in dependents_of(conn, &current)? {
            to_visit.push_back(dependent);
        }
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_store_err(format!("withdraw begin: {e}")))?;
    let mut removed = 0usize;
    for op_id in &doomed {
        let changed = tx
            .execute(
                "DELETE FROM pending_ops WHERE operation_id = ?1 AND status = 'pending'",
                params![op_id.to_string()],
            )
            .map_err(|e| to_store_err(e.to_string()))?;
        if changed > 0 {
            removed += changed;
            tx.execute(
                "DELETE FROM op_deps WHERE op_id = ?1 OR depends_on = ?1",
                params![op_id.to_string()],
            )
            .map_err(|e| to_store_err(e.to_string()))?;
        }
    }
    tx.commit()
        .map_err(|e| to_store_err(format!("withdraw commit: {e}")))?;
    Ok(removed)
}

/// Crash resumption: anything left in_flight by a dead process goes back to
/// pending. Idempotency keys make the re-dispatch safe.
pub fn requeue_in_flight(conn: &Connection) -> FieldsyncResult<usize> {
    let changed = conn
        .execute(
            "UPDATE pending_ops SET status = 'pending' WHERE status = 'in_flight'",
            [],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    Ok(changed)
}

pub fn count_by_status(conn: &Connection, status: OpStatus) -> FieldsyncResult<usize> {
    conn.query_row(
        "SELECT COUNT(*) FROM pending_ops WHERE status = ?1",
        params![status.as_str()],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as usize)
    .map_err(|e| to_store_err(e.to_string()))
}

const SELECT_OP: &str = "SELECT operation_id, kind, target, entity_type, service_id, payload,
        blob_id, status, priority, attempt_count, next_eligible_at,
        idempotency_key, last_error, created_at, seq
 FROM pending_ops";

#[allow(clippy::type_complexity)]
type OpParts = (
    String,         // operation_id
    String,         // kind
    String,         // target
    String,         // entity_type
    String,         // service_id
    String,         // payload
    Option<String>, // blob_id
    String,         // status
    i64,            // priority
    u32,            // attempt_count
    String,         // next_eligible_at
    String,         // idempotency_key
    Option<String>, // last_error
    String,         // created_at
    i64,            // seq
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<OpParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
    ))
}

fn parts_to_op(parts: OpParts) -> FieldsyncResult<PendingOperation> {
    let (
        operation_id,
        kind,
        target,
        entity_type,
        service_id,
        payload,
        blob_id,
        status,
        priority,
        attempt_count,
        next_eligible_at,
        idempotency_key,
        last_error,
        created_at,
        seq,
    ) = parts;
    Ok(PendingOperation {
        operation_id: OperationId::from_str(&operation_id)
            .map_err(|e| to_store_err(e.to_string()))?,
        kind: OpKind::parse(&kind).ok_or_else(|| to_store_err(format!("unknown kind {kind:?}")))?,
        target: EntityId::parse(&target),
        entity_type,
        service_id,
        payload: serde_json::from_str(&payload).map_err(|e| to_store_err(e.to_string()))?,
        blob_id: blob_id
            .map(|b| BlobId::from_str(&b))
            .transpose()
            .map_err(|e| to_store_err(e.to_string()))?,
        dependencies: BTreeSet::new(),
        status: OpStatus::parse(&status)
            .ok_or_else(|| to_store_err(format!("unknown status {status:?}")))?,
        priority,
        attempt_count,
        next_eligible_at: parse_ts(&next_eligible_at)?,
        idempotency_key,
        last_error,
        created_at: parse_ts(&created_at)?,
        seq,
    })
}

fn load_deps(conn: &Connection, id: &OperationId) -> FieldsyncResult<BTreeSet<OperationId>> {
    let mut stmt = conn
        .prepare("SELECT depends_on FROM op_deps WHERE op_id = ?1")
        .map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![id.to_string()], |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut deps = BTreeSet::new();
    for row in rows {
        let raw = row.map_err(|e| to_store_err(e.to_string()))?;
        deps.insert(OperationId::from_str(&raw).map_err(|e| to_store_err(e.to_string()))?);
    }
    Ok(deps)
}
