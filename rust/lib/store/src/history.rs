//! Status history: one row per lifecycle transition, written in the same
//! transaction as the status change itself.

use serde::{Deserialize, Serialize};

use garment_core::{new_id, now_rfc3339, Lifecycle, Principal, ServiceError};
use garment_sql::{Executor, Value};

use crate::table;

const TABLE: &str = "status_history";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub entity: String,
    pub entity_id: String,
    /// `None` for the creating transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: String,
}

/// Record a lifecycle transition of `entity_id`.
pub fn record<E, S>(
    db: &E,
    entity_id: &str,
    from: Option<S>,
    to: S,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
    S: Lifecycle,
{
    let entry = HistoryEntry {
        id: new_id(),
        entity: S::ENTITY.to_string(),
        entity_id: entity_id.to_string(),
        from_status: from.map(|s| s.to_string()),
        to_status: to.to_string(),
        actor: actor.user_id.clone(),
        note: note.map(str::to_string),
        at: now_rfc3339(),
    };
    table::insert(
        db,
        TABLE,
        &entry.id,
        &entry,
        &[
            ("entity", Value::Text(entry.entity.clone())),
            ("entity_id", Value::Text(entry.entity_id.clone())),
        ],
    )
}

/// Move `status` to `next` if the lifecycle allows it and record the edge.
/// The caller saves the document afterwards, in the same transaction.
pub fn advance<E, S>(
    db: &E,
    entity_id: &str,
    label: &str,
    status: &mut S,
    next: S,
    actor: &Principal,
    note: Option<&str>,
) -> Result<S, ServiceError>
where
    E: Executor + ?Sized,
    S: Lifecycle,
{
    let from = *status;
    *status = from.transition(next, label).inspect_err(|e| {
        tracing::warn!(entity = S::ENTITY, id = entity_id, error = %e, "rejected status change");
    })?;
    record(db, entity_id, Some(from), next, actor, note)?;
    Ok(from)
}

/// History of one document, oldest first.
pub fn list<E>(db: &E, entity: &str, entity_id: &str) -> Result<Vec<HistoryEntry>, ServiceError>
where
    E: Executor + ?Sized,
{
    table::select(
        db,
        TABLE,
        &[
            ("entity", Value::Text(entity.to_string())),
            ("entity_id", Value::Text(entity_id.to_string())),
        ],
    )
}
