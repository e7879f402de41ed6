use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{from_document, from_documents, Category},
    repository::table_service::{
        collections::{CATEGORIES, EXPENSES, VILLAS},
        delete_row, get_row, json_map, list_all_rows, update_row, DocumentStore,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryDeletion {
    pub villas_unassigned: u64,
    pub expenses_unassigned: u64,
}

/// Active categories, alphabetical regardless of case.
pub async fn list_active(store: &DocumentStore) -> AppResult<Vec<Category>> {
    let rows = list_all_rows(
        store,
        CATEGORIES,
        Some(&json_map(&[("is_active", json!(true))])),
        "name",
        true,
    )
    .await?;
    let mut categories: Vec<Category> = from_documents(rows)?;
    categories.sort_by_cached_key(|category| category.name.to_lowercase());
    Ok(categories)
}

/// Resolves a `category_id` supplied on a villa or expense.
pub async fn require_category(store: &DocumentStore, category_id: &str) -> AppResult<Category> {
    match get_row(store, CATEGORIES, category_id).await {
        Ok(row) => from_document(row),
        Err(AppError::NotFound(_)) => Err(AppError::NotFound(format!(
            "Category {category_id} not found."
        ))),
        Err(other) => Err(other),
    }
}

/// Deletes the category after clearing it from every villa and expense that
/// points at it.
pub async fn delete_category(store: &DocumentStore, category_id: &str) -> AppResult<CategoryDeletion> {
    get_row(store, CATEGORIES, category_id).await?;

    let deletion = CategoryDeletion {
        villas_unassigned: unassign(store, VILLAS, category_id).await?,
        expenses_unassigned: unassign(store, EXPENSES, category_id).await?,
    };
    delete_row(store, CATEGORIES, category_id).await?;

    info!(
        category_id,
        villas_unassigned = deletion.villas_unassigned,
        expenses_unassigned = deletion.expenses_unassigned,
        "Deleted category"
    );
    Ok(deletion)
}

async fn unassign(store: &DocumentStore, collection: &str, category_id: &str) -> AppResult<u64> {
    let filters = json_map(&[("category_id", json!(category_id))]);
    let clear = json_map(&[("category_id", Value::Null)]);
    let mut cleared = 0;
    for row in list_all_rows(store, collection, Some(&filters), "created_at", true).await? {
        if let Some(row_id) = row.get("id").and_then(Value::as_str) {
            update_row(store, collection, row_id, &clear).await?;
            cleared += 1;
        }
    }
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::{delete_category, list_active, require_category};
    use crate::{
        error::AppError,
        models::{to_document, Category},
        repository::table_service::{
            collections::{CATEGORIES, EXPENSES, VILLAS},
            create_row, get_row, json_map,
        },
        state::AppState,
    };

    async fn seed_category(state: &AppState, id: &str, name: &str, active: bool) {
        let category = Category {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            is_active: active,
            created_by: None,
            created_at: Utc::now(),
        };
        create_row(&state.store, CATEGORIES, &to_document(&category).expect("doc"))
            .await
            .expect("category");
    }

    #[tokio::test]
    async fn active_categories_sort_case_insensitively() {
        let state = AppState::in_memory();
        seed_category(&state, "c1", "playa", true).await;
        seed_category(&state, "c2", "Montaña", true).await;
        seed_category(&state, "c3", "Archivada", false).await;
        seed_category(&state, "c4", "Campo", true).await;

        let names: Vec<String> = list_active(&state.store)
            .await
            .expect("list")
            .into_iter()
            .map(|category| category.name)
            .collect();
        assert_eq!(names, vec!["Campo", "Montaña", "playa"]);
    }

    #[tokio::test]
    async fn deleting_a_category_unassigns_villas_and_expenses() {
        let state = AppState::in_memory();
        seed_category(&state, "c1", "Playa", true).await;
        for (id, category) in [("v1", json!("c1")), ("v2", json!("c1")), ("v3", json!("c9"))] {
            create_row(
                &state.store,
                VILLAS,
                &json_map(&[("id", json!(id)), ("code", json!(id)), ("category_id", category)]),
            )
            .await
            .expect("villa");
        }
        create_row(
            &state.store,
            EXPENSES,
            &json_map(&[("id", json!("e1")), ("category_id", json!("c1"))]),
        )
        .await
        .expect("expense");

        let deletion = delete_category(&state.store, "c1").await.expect("delete");
        assert_eq!(deletion.villas_unassigned, 2);
        assert_eq!(deletion.expenses_unassigned, 1);

        let villa = get_row(&state.store, VILLAS, "v1").await.expect("villa");
        assert!(villa["category_id"].is_null());
        let untouched = get_row(&state.store, VILLAS, "v3").await.expect("villa");
        assert_eq!(untouched["category_id"], json!("c9"));

        assert!(matches!(
            require_category(&state.store, "c1").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_category(&state.store, "c1").await,
            Err(AppError::NotFound(_))
        ));
    }
}
