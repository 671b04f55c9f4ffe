use serde::de::DeserializeOwned;
use serde::Serialize;

use garment_core::{now_rfc3339, ListParams, ListResult, ServiceError};
use garment_sql::{Executor, Row, Value};

use crate::storage_err;

/// Insert a record as JSON into a table with indexed columns.
///
/// `created_at` and `updated_at` are always written.
pub fn insert<E, T>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))?;
    let now = now_rfc3339();

    let mut cols = vec!["id", "data", "created_at", "updated_at"];
    let mut params = vec![
        Value::Text(id.to_string()),
        Value::Text(json),
        Value::Text(now.clone()),
        Value::Text(now),
    ];
    for (col, val) in indexes {
        cols.push(*col);
        params.push(val.clone());
    }
    let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", "),
    );
    db.exec(&sql, &params).map_err(storage_err)?;
    Ok(())
}

/// Get a record by id, deserializing the JSON `data` column.
pub fn get<E, T>(db: &E, table: &str, id: &str) -> Result<T, ServiceError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    find(db, table, id)?.ok_or_else(|| ServiceError::NotFound(format!("{table}/{id}")))
}

/// Like [`get`], but `None` for a missing id.
pub fn find<E, T>(db: &E, table: &str, id: &str) -> Result<Option<T>, ServiceError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    let sql = format!("SELECT data FROM {table} WHERE id = ?1");
    let rows = db.query(&sql, &[Value::Text(id.to_string())]).map_err(storage_err)?;
    rows.first().map(decode).transpose()
}

/// Find the single record whose indexed `column` equals `value`.
pub fn find_by<E, T>(db: &E, table: &str, column: &str, value: Value) -> Result<Option<T>, ServiceError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    let sql = format!("SELECT data FROM {table} WHERE {column} = ?1 LIMIT 1");
    let rows = db.query(&sql, &[value]).map_err(storage_err)?;
    rows.first().map(decode).transpose()
}

/// Update a record's JSON data and indexed columns.
pub fn update<E, T>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut sets = vec!["data = ?1".to_string(), "updated_at = ?2".to_string()];
    let mut params: Vec<Value> = vec![Value::Text(json), Value::Text(now_rfc3339())];

    for (col, val) in indexes {
        params.push(val.clone());
        sets.push(format!("{} = ?{}", col, params.len()));
    }

    params.push(Value::Text(id.to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        sets.join(", "),
        params.len(),
    );

    let affected = db.exec(&sql, &params).map_err(storage_err)?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("{table}/{id}")));
    }
    Ok(())
}

/// Delete a record by id.
pub fn delete<E>(db: &E, table: &str, id: &str) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let sql = format!("DELETE FROM {table} WHERE id = ?1");
    let affected = db
        .exec(&sql, &[Value::Text(id.to_string())])
        .map_err(storage_err)?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("{table}/{id}")));
    }
    Ok(())
}

/// List records with equality filters, an optional `LIKE` search over
/// `search_columns` (driven by `params.q`), pagination and total count.
/// Newest first.
pub fn list<E, T>(
    db: &E,
    table: &str,
    filters: &[(&str, Value)],
    search_columns: &[&str],
    params: &ListParams,
) -> Result<ListResult<T>, ServiceError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned + Serialize,
{
    let (where_sql, mut sql_params) = where_clause(filters, search_columns, params.q.as_deref());

    let count_sql = format!("SELECT COUNT(*) AS cnt FROM {table}{where_sql}");
    let rows = db.query(&count_sql, &sql_params).map_err(storage_err)?;
    let total = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize;

    sql_params.push(Value::Integer(params.capped_limit() as i64));
    sql_params.push(Value::Integer(params.offset as i64));
    let sql = format!(
        "SELECT data FROM {}{} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
        table,
        where_sql,
        sql_params.len() - 1,
        sql_params.len(),
    );
    let rows = db.query(&sql, &sql_params).map_err(storage_err)?;
    let items = rows.iter().map(decode).collect::<Result<Vec<T>, _>>()?;

    Ok(ListResult { items, total })
}

/// Every record matching the filters, oldest first.
pub fn select<E, T>(db: &E, table: &str, filters: &[(&str, Value)]) -> Result<Vec<T>, ServiceError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    let (where_sql, params) = where_clause(filters, &[], None);
    let sql = format!("SELECT data FROM {table}{where_sql} ORDER BY created_at ASC, rowid ASC");
    let rows = db.query(&sql, &params).map_err(storage_err)?;
    rows.iter().map(decode).collect()
}

/// Count records with optional filters.
pub fn count<E>(db: &E, table: &str, filters: &[(&str, Value)]) -> Result<i64, ServiceError>
where
    E: Executor + ?Sized,
{
    let (where_sql, params) = where_clause(filters, &[], None);
    let sql = format!("SELECT COUNT(*) AS cnt FROM {table}{where_sql}");
    let rows = db.query(&sql, &params).map_err(storage_err)?;
    Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0))
}

/// Row counts grouped by an indexed column, e.g. documents per status.
pub fn count_by<E>(db: &E, table: &str, column: &str) -> Result<Vec<(String, i64)>, ServiceError>
where
    E: Executor + ?Sized,
{
    let sql = format!(
        "SELECT {column} AS k, COUNT(*) AS cnt FROM {table} GROUP BY {column} ORDER BY {column}"
    );
    let rows = db.query(&sql, &[]).map_err(storage_err)?;
    Ok(rows
        .iter()
        .map(|r| {
            (
                r.get_str("k").unwrap_or_default().to_string(),
                r.get_i64("cnt").unwrap_or(0),
            )
        })
        .collect())
}

/// Deserialize a record from a row's `data` JSON column.
pub fn decode<T: DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Storage("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Storage(format!("bad record json: {e}")))
}

fn where_clause(
    filters: &[(&str, Value)],
    search_columns: &[&str],
    q: Option<&str>,
) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for (col, val) in filters {
        params.push(val.clone());
        clauses.push(format!("{} = ?{}", col, params.len()));
    }

    if let Some(term) = q.map(str::trim).filter(|t| !t.is_empty()) {
        if !search_columns.is_empty() {
            params.push(Value::Text(format!("%{term}%")));
            let idx = params.len();
            let ors: Vec<String> = search_columns
                .iter()
                .map(|c| format!("{c} LIKE ?{idx}"))
                .collect();
            clauses.push(format!("({})", ors.join(" OR ")));
        }
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}
