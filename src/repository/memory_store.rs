use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::repository::table_service::{
    compare_values, parse_filter_key, render_scalar, FilterOperator, UNIQUE_KEYS,
};

type Collections = HashMap<String, Vec<Map<String, Value>>>;

/// Process-local document store. Every operation holds the lock for its whole
/// read-modify-write, which gives the same single-document atomicity as the
/// Postgres back end.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(
        &self,
        collection: &str,
        filters: Option<&Map<String, Value>>,
        limit: i64,
        offset: i64,
        order_by: &str,
        ascending: bool,
    ) -> Result<Vec<Value>, AppError> {
        let guard = self.inner.read().await;
        let mut rows = Vec::new();
        for document in guard.get(collection).into_iter().flatten() {
            if matches_filters(document, filters)? {
                rows.push(document.clone());
            }
        }

        rows.sort_by(|left, right| {
            let ordering = compare_values(
                left.get(order_by).unwrap_or(&Value::Null),
                right.get(order_by).unwrap_or(&Value::Null),
            );
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        Ok(rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or_default())
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(Value::Object)
            .collect())
    }

    pub async fn get(&self, collection: &str, row_id: &str) -> Option<Value> {
        let guard = self.inner.read().await;
        guard
            .get(collection)
            .and_then(|rows| rows.iter().find(|row| has_id(row, row_id)))
            .cloned()
            .map(Value::Object)
    }

    pub async fn count(
        &self,
        collection: &str,
        filters: Option<&Map<String, Value>>,
    ) -> Result<i64, AppError> {
        let guard = self.inner.read().await;
        let mut total = 0i64;
        for document in guard.get(collection).into_iter().flatten() {
            if matches_filters(document, filters)? {
                total += 1;
            }
        }
        Ok(total)
    }

    pub async fn insert(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<Value, AppError> {
        let mut guard = self.inner.write().await;
        let row_id = render_scalar(document.get("id").unwrap_or(&Value::Null));
        let exists = guard
            .get(collection)
            .is_some_and(|rows| rows.iter().any(|row| has_id(row, &row_id)));
        if exists {
            return Err(duplicate_error());
        }
        check_unique_keys(&guard, collection, &document, None)?;

        guard
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(Value::Object(document))
    }

    pub async fn insert_if_absent(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let mut guard = self.inner.write().await;
        let row_id = render_scalar(document.get("id").unwrap_or(&Value::Null));
        let exists = guard
            .get(collection)
            .is_some_and(|rows| rows.iter().any(|row| has_id(row, &row_id)));
        if exists {
            return Ok(None);
        }
        check_unique_keys(&guard, collection, &document, None)?;

        guard
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());
        Ok(Some(Value::Object(document)))
    }

    /// Merges `patch` into the document. With `guard_field`, the write only
    /// happens while that field equals the expected value.
    pub async fn update(
        &self,
        collection: &str,
        row_id: &str,
        patch: &Map<String, Value>,
        guard_field: Option<(&str, &Value)>,
    ) -> Result<Option<Value>, AppError> {
        let mut guard = self.inner.write().await;
        let Some(position) = guard
            .get(collection)
            .and_then(|rows| rows.iter().position(|row| has_id(row, row_id)))
        else {
            return Ok(None);
        };

        let mut merged = guard[collection][position].clone();
        if let Some((field, expected)) = guard_field {
            if merged.get(field) != Some(expected) {
                return Ok(None);
            }
        }
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        check_unique_keys(&guard, collection, &merged, Some(row_id))?;

        if let Some(rows) = guard.get_mut(collection) {
            rows[position] = merged.clone();
        }
        Ok(Some(Value::Object(merged)))
    }

    pub async fn delete(&self, collection: &str, row_id: &str) -> Option<Value> {
        let mut guard = self.inner.write().await;
        let rows = guard.get_mut(collection)?;
        let position = rows.iter().position(|row| has_id(row, row_id))?;
        Some(Value::Object(rows.remove(position)))
    }

    pub async fn delete_where(
        &self,
        collection: &str,
        filters: &Map<String, Value>,
    ) -> Result<u64, AppError> {
        let mut guard = self.inner.write().await;
        let Some(rows) = guard.get_mut(collection) else {
            return Ok(0);
        };

        let mut kept = Vec::with_capacity(rows.len());
        let mut removed = 0u64;
        for row in rows.drain(..) {
            if matches_filters(&row, Some(filters))? {
                removed += 1;
            } else {
                kept.push(row);
            }
        }
        *rows = kept;
        Ok(removed)
    }
}

fn has_id(row: &Map<String, Value>, row_id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(row_id)
}

fn duplicate_error() -> AppError {
    AppError::Conflict("Duplicate value violates a unique constraint.".to_string())
}

fn check_unique_keys(
    collections: &Collections,
    collection: &str,
    document: &Map<String, Value>,
    skip_id: Option<&str>,
) -> Result<(), AppError> {
    for (group, field) in UNIQUE_KEYS {
        if !group.contains(&collection) {
            continue;
        }
        let Some(candidate) = document.get(*field).filter(|value| !value.is_null()) else {
            continue;
        };
        let candidate = render_scalar(candidate);
        for member in *group {
            let clash = collections.get(*member).into_iter().flatten().any(|row| {
                let same_row = *member == collection && skip_id.is_some_and(|id| has_id(row, id));
                !same_row
                    && row
                        .get(*field)
                        .is_some_and(|value| !value.is_null() && render_scalar(value) == candidate)
            });
            if clash {
                return Err(duplicate_error());
            }
        }
    }
    Ok(())
}

fn matches_filters(
    document: &Map<String, Value>,
    filters: Option<&Map<String, Value>>,
) -> Result<bool, AppError> {
    let Some(filters) = filters else {
        return Ok(true);
    };
    for (key, expected) in filters {
        let (column, operator) = parse_filter_key(key)?;
        let actual = document.get(column).unwrap_or(&Value::Null);
        let matched = match operator {
            FilterOperator::Eq => actual == expected,
            FilterOperator::In => match expected {
                Value::Array(items) => items.iter().any(|item| item == actual),
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "Filter '{key}' expects an array."
                    )))
                }
            },
            FilterOperator::Gt => !actual.is_null() && compare_values(actual, expected).is_gt(),
            FilterOperator::Gte => !actual.is_null() && compare_values(actual, expected).is_ge(),
            FilterOperator::Lt => !actual.is_null() && compare_values(actual, expected).is_lt(),
            FilterOperator::Lte => !actual.is_null() && compare_values(actual, expected).is_le(),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}
