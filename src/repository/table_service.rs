use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};

use crate::error::AppError;
use crate::repository::memory_store::MemoryStore;

pub mod collections {
    pub const CATEGORIES: &str = "categories";
    pub const COUNTERS: &str = "counters";
    pub const CUSTOMERS: &str = "customers";
    pub const VILLAS: &str = "villas";
    pub const RESERVATIONS: &str = "reservations";
    pub const RESERVATION_ABONOS: &str = "reservation_abonos";
    pub const EXPENSES: &str = "expenses";
    pub const EXPENSE_ABONOS: &str = "expense_abonos";
    pub const VILLA_OWNERS: &str = "villa_owners";
    pub const OWNER_PAYMENTS: &str = "owner_payments";
    pub const COMMISSIONS: &str = "commissions";
    pub const EXTRA_SERVICES: &str = "extra_services";
}

use collections::*;

const ALLOWED_COLLECTIONS: &[&str] = &[
    CATEGORIES,
    COUNTERS,
    CUSTOMERS,
    VILLAS,
    RESERVATIONS,
    RESERVATION_ABONOS,
    EXPENSES,
    EXPENSE_ABONOS,
    VILLA_OWNERS,
    OWNER_PAYMENTS,
    COMMISSIONS,
    EXTRA_SERVICES,
];

const SCAN_PAGE_SIZE: i64 = 500;

/// Collections sharing the invoice-number space.
pub const INVOICE_COLLECTIONS: &[&str] = &[RESERVATIONS, RESERVATION_ABONOS, EXPENSE_ABONOS];

/// Fields that must be unique across a group of collections. Postgres enforces
/// these with partial unique indexes, the memory store by scanning.
pub(crate) const UNIQUE_KEYS: &[(&[&str], &str)] =
    &[(INVOICE_COLLECTIONS, "invoice_number"), (&[VILLAS], "code")];

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS documents_invoice_number_key
        ON documents ((body->>'invoice_number'))
        WHERE collection IN ('reservations', 'reservation_abonos', 'expense_abonos')
          AND body ? 'invoice_number'",
    "CREATE UNIQUE INDEX IF NOT EXISTS documents_villa_code_key
        ON documents ((body->>'code'))
        WHERE collection = 'villas'",
    "CREATE INDEX IF NOT EXISTS documents_body_gin ON documents USING GIN (body jsonb_path_ops)",
];

#[derive(Debug, Clone)]
pub enum DocumentStore {
    Postgres(PgPool),
    Memory(MemoryStore),
}

impl DocumentStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(map_db_error)?;
    }
    Ok(())
}

pub async fn ping(store: &DocumentStore) -> Result<(), AppError> {
    match store {
        DocumentStore::Postgres(pool) => {
            sqlx::query("SELECT 1")
                .fetch_one(pool)
                .await
                .map_err(map_db_error)?;
            Ok(())
        }
        DocumentStore::Memory(_) => Ok(()),
    }
}

pub async fn list_rows(
    store: &DocumentStore,
    collection: &str,
    filters: Option<&Map<String, Value>>,
    limit: i64,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    list_page(store, collection, filters, limit.clamp(1, 5000), 0, order_by, ascending).await
}

/// Every matching document, read page by page until a short page comes back.
/// Used for sums and bulk updates that must not stop at the list cap.
pub async fn list_all_rows(
    store: &DocumentStore,
    collection: &str,
    filters: Option<&Map<String, Value>>,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    let mut rows = Vec::new();
    let mut offset = 0i64;
    loop {
        let page = list_page(
            store, collection, filters, SCAN_PAGE_SIZE, offset, order_by, ascending,
        )
        .await?;
        let fetched = page.len() as i64;
        rows.extend(page);
        if fetched < SCAN_PAGE_SIZE {
            return Ok(rows);
        }
        offset += fetched;
    }
}

async fn list_page(
    store: &DocumentStore,
    collection: &str,
    filters: Option<&Map<String, Value>>,
    limit: i64,
    offset: i64,
    order_by: &str,
    ascending: bool,
) -> Result<Vec<Value>, AppError> {
    let collection = validate_collection(collection)?;
    let order_name = if order_by.trim().is_empty() {
        "created_at"
    } else {
        validate_identifier(order_by)?
    };
    let filters = filters.map(normalize_timestamps);

    match store {
        DocumentStore::Memory(memory) => {
            memory
                .list(collection, filters.as_ref(), limit, offset, order_name, ascending)
                .await
        }
        DocumentStore::Postgres(pool) => {
            let direction = if ascending { " ASC" } else { " DESC" };
            let mut query = QueryBuilder::<Postgres>::new("SELECT t.body FROM documents t WHERE ");
            push_collection_clause(&mut query, collection);
            if let Some(filter_map) = &filters {
                for (key, value) in filter_map {
                    push_filter_clause(&mut query, key, value)?;
                }
            }
            query
                .push(" ORDER BY t.body ->> ")
                .push_bind(order_name.to_string());
            query.push(direction);
            query.push(", t.created_at").push(direction);
            query.push(", t.id").push(direction);
            query.push(" LIMIT ").push_bind(limit);
            query.push(" OFFSET ").push_bind(offset);

            let rows = query.build().fetch_all(pool).await.map_err(map_db_error)?;
            Ok(read_rows(rows))
        }
    }
}

pub async fn get_row(
    store: &DocumentStore,
    collection: &str,
    row_id: &str,
) -> Result<Value, AppError> {
    let collection = validate_collection(collection)?;
    let found = match store {
        DocumentStore::Memory(memory) => memory.get(collection, row_id).await,
        DocumentStore::Postgres(pool) => {
            let row = sqlx::query(
                "SELECT body FROM documents WHERE collection = $1 AND id = $2 LIMIT 1",
            )
            .bind(collection)
            .bind(row_id)
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)?;
            row.and_then(|value| value.try_get::<Value, _>("body").ok())
        }
    };

    found.ok_or_else(|| AppError::NotFound(format!("{} not found.", entity_label(collection))))
}

pub async fn find_row(
    store: &DocumentStore,
    collection: &str,
    filters: &Map<String, Value>,
) -> Result<Option<Value>, AppError> {
    let rows = list_rows(store, collection, Some(filters), 1, "created_at", true).await?;
    Ok(rows.into_iter().next())
}

pub async fn count_rows(
    store: &DocumentStore,
    collection: &str,
    filters: Option<&Map<String, Value>>,
) -> Result<i64, AppError> {
    let collection = validate_collection(collection)?;
    let filters = filters.map(normalize_timestamps);
    match store {
        DocumentStore::Memory(memory) => memory.count(collection, filters.as_ref()).await,
        DocumentStore::Postgres(pool) => {
            let mut query = QueryBuilder::<Postgres>::new(
                "SELECT COUNT(*)::bigint AS total FROM documents t WHERE ",
            );
            push_collection_clause(&mut query, collection);
            if let Some(filter_map) = &filters {
                for (key, value) in filter_map {
                    push_filter_clause(&mut query, key, value)?;
                }
            }
            let row = query.build().fetch_one(pool).await.map_err(map_db_error)?;
            Ok(row.try_get::<i64, _>("total").unwrap_or(0))
        }
    }
}

/// Inserts a document, assigning `id` and `created_at` when the caller did not.
pub async fn create_row(
    store: &DocumentStore,
    collection: &str,
    payload: &Map<String, Value>,
) -> Result<Value, AppError> {
    let collection = validate_collection(collection)?;
    if payload.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Could not create {} record.",
            entity_label(collection)
        )));
    }
    let document = prepare_document(payload)?;
    let row_id = document_id(&document);

    match store {
        DocumentStore::Memory(memory) => memory.insert(collection, document).await,
        DocumentStore::Postgres(pool) => {
            let row = sqlx::query(
                "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) RETURNING body",
            )
            .bind(collection)
            .bind(&row_id)
            .bind(Value::Object(document))
            .fetch_one(pool)
            .await
            .map_err(map_db_error)?;
            row.try_get::<Value, _>("body").map_err(map_db_error)
        }
    }
}

/// Inserts the document unless one with the same id exists. Returns the stored
/// document and whether this call created it.
pub async fn create_row_if_absent(
    store: &DocumentStore,
    collection: &str,
    payload: &Map<String, Value>,
) -> Result<(Value, bool), AppError> {
    let collection = validate_collection(collection)?;
    let document = prepare_document(payload)?;
    let row_id = document_id(&document);

    let inserted = match store {
        DocumentStore::Memory(memory) => memory.insert_if_absent(collection, document).await?,
        DocumentStore::Postgres(pool) => {
            let row = sqlx::query(
                "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)
                 ON CONFLICT (collection, id) DO NOTHING
                 RETURNING body",
            )
            .bind(collection)
            .bind(&row_id)
            .bind(Value::Object(document))
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)?;
            row.and_then(|value| value.try_get::<Value, _>("body").ok())
        }
    };

    match inserted {
        Some(created) => Ok((created, true)),
        None => Ok((get_row(store, collection, &row_id).await?, false)),
    }
}

/// Shallow-merges `payload` into the stored document in one atomic write.
pub async fn update_row(
    store: &DocumentStore,
    collection: &str,
    row_id: &str,
    payload: &Map<String, Value>,
) -> Result<Value, AppError> {
    let collection = validate_collection(collection)?;
    let patch = prepare_patch(payload)?;

    let updated = match store {
        DocumentStore::Memory(memory) => memory.update(collection, row_id, &patch, None).await?,
        DocumentStore::Postgres(pool) => {
            let row = sqlx::query(
                "UPDATE documents SET body = body || $3
                 WHERE collection = $1 AND id = $2
                 RETURNING body",
            )
            .bind(collection)
            .bind(row_id)
            .bind(Value::Object(patch))
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)?;
            row.and_then(|value| value.try_get::<Value, _>("body").ok())
        }
    };

    updated.ok_or_else(|| AppError::NotFound(format!("{} not found.", entity_label(collection))))
}

/// Applies `payload` only while `field` still holds `expected`. `Ok(None)` means
/// another writer got there first (or the document is gone).
pub async fn compare_and_set_row(
    store: &DocumentStore,
    collection: &str,
    row_id: &str,
    field: &str,
    expected: &Value,
    payload: &Map<String, Value>,
) -> Result<Option<Value>, AppError> {
    let collection = validate_collection(collection)?;
    let field = validate_identifier(field)?;
    let patch = prepare_patch(payload)?;
    let expected = normalize_timestamp(expected);

    match store {
        DocumentStore::Memory(memory) => {
            memory
                .update(collection, row_id, &patch, Some((field, &expected)))
                .await
        }
        DocumentStore::Postgres(pool) => {
            let row = sqlx::query(
                "UPDATE documents SET body = body || $3
                 WHERE collection = $1 AND id = $2 AND body -> $4 = $5
                 RETURNING body",
            )
            .bind(collection)
            .bind(row_id)
            .bind(Value::Object(patch))
            .bind(field)
            .bind(expected)
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)?;
            Ok(row.and_then(|value| value.try_get::<Value, _>("body").ok()))
        }
    }
}

pub async fn delete_row(
    store: &DocumentStore,
    collection: &str,
    row_id: &str,
) -> Result<Value, AppError> {
    let collection = validate_collection(collection)?;
    let deleted = match store {
        DocumentStore::Memory(memory) => memory.delete(collection, row_id).await,
        DocumentStore::Postgres(pool) => {
            let row = sqlx::query(
                "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING body",
            )
            .bind(collection)
            .bind(row_id)
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)?;
            row.and_then(|value| value.try_get::<Value, _>("body").ok())
        }
    };

    deleted.ok_or_else(|| AppError::NotFound(format!("{} not found.", entity_label(collection))))
}

pub async fn delete_rows(
    store: &DocumentStore,
    collection: &str,
    filters: &Map<String, Value>,
) -> Result<u64, AppError> {
    let collection = validate_collection(collection)?;
    if filters.is_empty() {
        return Err(AppError::BadRequest(
            "Refusing to delete without filters.".to_string(),
        ));
    }
    let filters = normalize_timestamps(filters);

    match store {
        DocumentStore::Memory(memory) => memory.delete_where(collection, &filters).await,
        DocumentStore::Postgres(pool) => {
            let mut query = QueryBuilder::<Postgres>::new("DELETE FROM documents t WHERE ");
            push_collection_clause(&mut query, collection);
            for (key, value) in &filters {
                push_filter_clause(&mut query, key, value)?;
            }
            let result = query.build().execute(pool).await.map_err(map_db_error)?;
            Ok(result.rows_affected())
        }
    }
}

pub fn json_map(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

fn prepare_document(payload: &Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    for key in payload.keys() {
        validate_identifier(key)?;
    }
    let mut document = normalize_timestamps(payload);
    let has_id = document
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        document.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    if !document.contains_key("created_at") {
        document.insert(
            "created_at".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
    }
    Ok(document)
}

fn prepare_patch(payload: &Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    let mut patch = normalize_timestamps(payload);
    patch.remove("id");
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    for key in patch.keys() {
        validate_identifier(key)?;
    }
    Ok(patch)
}

/// Rewrites RFC 3339 timestamps as UTC with fixed microsecond precision, so
/// stored text orders the same way as the instants it encodes.
pub(crate) fn normalize_timestamps(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), normalize_timestamp(value)))
        .collect()
}

pub(crate) fn normalize_timestamp(value: &Value) -> Value {
    match value {
        Value::String(text) if text.contains('T') => DateTime::parse_from_rfc3339(text)
            .map(|instant| {
                Value::String(
                    instant
                        .with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Micros, true),
                )
            })
            .unwrap_or_else(|_| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_timestamp).collect()),
        _ => value.clone(),
    }
}

fn document_id(document: &Map<String, Value>) -> String {
    document
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn read_rows(rows: Vec<PgRow>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.try_get::<Value, _>("body").ok())
        .collect()
}

fn entity_label(collection: &str) -> &'static str {
    match collection {
        CATEGORIES => "Category",
        COUNTERS => "Counter",
        CUSTOMERS => "Customer",
        VILLAS => "Villa",
        RESERVATIONS => "Reservation",
        RESERVATION_ABONOS | EXPENSE_ABONOS => "Abono",
        EXPENSES => "Expense",
        VILLA_OWNERS => "Owner",
        OWNER_PAYMENTS => "Owner payment",
        COMMISSIONS => "Commission",
        EXTRA_SERVICES => "Extra service",
        _ => "Record",
    }
}

fn validate_collection(collection: &str) -> Result<&str, AppError> {
    let normalized = validate_identifier(collection)?;
    if ALLOWED_COLLECTIONS.contains(&normalized) {
        return Ok(normalized);
    }
    Err(AppError::Forbidden(format!(
        "Collection '{normalized}' is not allowed."
    )))
}

pub(crate) fn validate_identifier(identifier: &str) -> Result<&str, AppError> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(
            "Identifier cannot be empty.".to_string(),
        ));
    }
    if !trimmed.chars().all(|character| {
        character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
    }) {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    if trimmed
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_digit())
    {
        return Err(AppError::BadRequest(format!(
            "Invalid identifier '{trimmed}'."
        )));
    }
    Ok(trimmed)
}

pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FilterOperator {
    Eq,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
}

pub(crate) fn parse_filter_key(filter_key: &str) -> Result<(&str, FilterOperator), AppError> {
    if let Some((column, suffix)) = filter_key.rsplit_once("__") {
        let operator = match suffix {
            "in" => Some(FilterOperator::In),
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            _ => None,
        };
        if let Some(operator) = operator {
            return Ok((validate_identifier(column)?, operator));
        }
    }
    Ok((validate_identifier(filter_key)?, FilterOperator::Eq))
}

/// Ordering used by range filters and sorting. Numbers compare numerically,
/// everything else by rendered text (ISO dates sort correctly as text).
pub(crate) fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&b.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => render_scalar(left).cmp(&render_scalar(right)),
    }
}

fn push_collection_clause(query: &mut QueryBuilder<Postgres>, collection: &str) {
    query
        .push("t.collection = ")
        .push_bind(collection.to_string());
}

fn push_filter_clause(
    query: &mut QueryBuilder<Postgres>,
    filter_key: &str,
    value: &Value,
) -> Result<(), AppError> {
    let (column, operator) = parse_filter_key(filter_key)?;

    match operator {
        FilterOperator::Eq => {
            query
                .push(" AND t.body -> ")
                .push_bind(column.to_string())
                .push(" = ")
                .push_bind(value.clone());
        }
        FilterOperator::In => {
            let Value::Array(items) = value else {
                return Err(AppError::BadRequest(format!(
                    "Filter '{filter_key}' expects an array."
                )));
            };
            if items.is_empty() {
                query.push(" AND FALSE");
                return Ok(());
            }
            query
                .push(" AND ")
                .push_bind(value.clone())
                .push(" @> jsonb_build_array(t.body -> ")
                .push_bind(column.to_string())
                .push(")");
        }
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            let sql_operator = match operator {
                FilterOperator::Gt => " > ",
                FilterOperator::Gte => " >= ",
                FilterOperator::Lt => " < ",
                _ => " <= ",
            };
            query
                .push(" AND t.body ->> ")
                .push_bind(column.to_string())
                .push(sql_operator)
                .push_bind(render_scalar(value));
        }
    }
    Ok(())
}

fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    if message.contains("23505")
        || message
            .to_ascii_lowercase()
            .contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};
    use sqlx::{Postgres, QueryBuilder};

    use super::{
        collections::{COMMISSIONS, RESERVATIONS},
        compare_values, create_row, json_map, list_all_rows, list_rows, normalize_timestamp,
        parse_filter_key, push_filter_clause, DocumentStore, FilterOperator, SCAN_PAGE_SIZE,
    };
    use crate::repository::memory_store::MemoryStore;

    #[test]
    fn filter_keys_split_operator_suffixes() {
        assert_eq!(
            parse_filter_key("reservation_date__gte").ok(),
            Some(("reservation_date", FilterOperator::Gte))
        );
        assert_eq!(
            parse_filter_key("invoice_number__in").ok(),
            Some(("invoice_number", FilterOperator::In))
        );
        assert_eq!(
            parse_filter_key("villa_id").ok(),
            Some(("villa_id", FilterOperator::Eq))
        );
        assert!(parse_filter_key("Bad-Column").is_err());
    }

    #[test]
    fn numbers_compare_numerically_and_dates_as_text() {
        assert!(compare_values(&json!(9), &json!(10)).is_lt());
        assert!(compare_values(&json!("2026-01-09"), &json!("2026-01-10")).is_lt());
        assert!(compare_values(&Value::Null, &json!("a")).is_lt());
    }

    #[test]
    fn filter_sql_compares_jsonb_fields() {
        let mut filters = Map::new();
        filters.insert("villa_id".to_string(), json!("v1"));
        filters.insert("status__in".to_string(), json!(["pending", "confirmed"]));
        filters.insert("reservation_date__lt".to_string(), json!("2026-02-01"));

        let mut query = QueryBuilder::<Postgres>::new("SELECT t.body FROM documents t WHERE TRUE");
        for (key, value) in &filters {
            push_filter_clause(&mut query, key, value).expect("valid filter");
        }
        let sql = query.sql();
        assert!(sql.contains("t.body -> $"), "unexpected SQL: {sql}");
        assert!(sql.contains("@> jsonb_build_array(t.body -> $"), "unexpected SQL: {sql}");
        assert!(sql.contains("t.body ->> $"), "unexpected SQL: {sql}");
    }

    #[test]
    fn empty_in_filter_matches_nothing() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 WHERE TRUE");
        push_filter_clause(&mut query, "id__in", &json!([])).expect("valid filter");
        assert!(query.sql().ends_with(" AND FALSE"));
    }

    #[test]
    fn timestamps_are_stored_with_fixed_precision() {
        assert_eq!(
            normalize_timestamp(&json!("2026-03-01T10:00:00.5+02:00")),
            json!("2026-03-01T08:00:00.500000Z")
        );
        assert_eq!(
            normalize_timestamp(&json!("2026-03-01T08:00:00Z")),
            json!("2026-03-01T08:00:00.000000Z")
        );
        assert_eq!(normalize_timestamp(&json!("2026-03-01")), json!("2026-03-01"));
        assert_eq!(normalize_timestamp(&json!("Tulum")), json!("Tulum"));
    }

    #[tokio::test]
    async fn created_at_orders_by_instant_within_a_second() {
        let store = DocumentStore::Memory(MemoryStore::new());
        // As raw text the whole-second stamp sorts last, since 'Z' > '.'.
        for (id, stamp) in [
            ("late", "2026-03-01T08:00:00.5Z"),
            ("early", "2026-03-01T08:00:00Z"),
            ("middle", "2026-03-01T08:00:00.25Z"),
        ] {
            create_row(
                &store,
                RESERVATIONS,
                &json_map(&[("id", json!(id)), ("created_at", json!(stamp))]),
            )
            .await
            .expect("insert");
        }

        let rows = list_rows(&store, RESERVATIONS, None, 10, "created_at", true)
            .await
            .expect("list");
        let ids: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .collect();
        assert_eq!(ids, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn list_all_rows_reads_past_the_list_cap() {
        let store = DocumentStore::Memory(MemoryStore::new());
        let total = SCAN_PAGE_SIZE * 2 + 1;
        for index in 0..total {
            create_row(
                &store,
                COMMISSIONS,
                &json_map(&[("paid", json!(false)), ("sequence", json!(index))]),
            )
            .await
            .expect("insert");
        }

        let capped = list_rows(&store, COMMISSIONS, None, SCAN_PAGE_SIZE, "sequence", true)
            .await
            .expect("list");
        assert_eq!(capped.len() as i64, SCAN_PAGE_SIZE);

        let filters = json_map(&[("paid", json!(false))]);
        let all = list_all_rows(&store, COMMISSIONS, Some(&filters), "sequence", true)
            .await
            .expect("scan");
        assert_eq!(all.len() as i64, total);
        assert_eq!(all.last().and_then(|row| row.get("sequence")), Some(&json!(total - 1)));
    }
}
