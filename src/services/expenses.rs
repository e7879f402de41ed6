use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    auth::AuthUser,
    error::AppResult,
    models::{
        from_document, from_documents, to_document, Expense, PaymentStatus, Reservation, Villa,
        OWNER_PAYOUT_CATEGORY,
    },
    repository::table_service::{
        collections::{EXPENSES, EXPENSE_ABONOS},
        count_rows, create_row, delete_row, get_row, json_map, list_rows, update_row,
        DocumentStore,
    },
    schemas::{non_empty_opt, remove_nulls, serialize_to_map, CreateExpenseInput, UpdateExpenseInput},
    services::{
        abonos::{delete_all_for_parent, recompute_expense_status, AbonoParent},
        categories::require_category,
    },
};

pub async fn list_expenses(
    store: &DocumentStore,
    filters: &Map<String, Value>,
    limit: i64,
) -> AppResult<Vec<Expense>> {
    let rows = list_rows(store, EXPENSES, Some(filters), limit, "expense_date", false).await?;
    from_documents(rows)
}

pub async fn create_expense(
    store: &DocumentStore,
    input: CreateExpenseInput,
    caller: &AuthUser,
) -> AppResult<Expense> {
    let category_id = non_empty_opt(input.category_id.as_deref());
    if let Some(category_id) = category_id.as_deref() {
        require_category(store, category_id).await?;
    }
    let expense = Expense {
        id: uuid::Uuid::new_v4().to_string(),
        category: input.category,
        category_id,
        description: input.description,
        amount: input.amount,
        currency: input.currency,
        expense_date: input.expense_date,
        payment_status: input.payment_status,
        notes: input.notes,
        related_reservation_id: None,
        created_by: Some(caller.id.clone()),
        created_at: Utc::now(),
    };
    from_document(create_row(store, EXPENSES, &to_document(&expense)?).await?)
}

/// The pending expense that pays the villa owner their share of a booking.
pub async fn create_owner_payout(
    store: &DocumentStore,
    reservation: &Reservation,
    villa: &Villa,
    created_by: Option<&str>,
) -> AppResult<Expense> {
    let expense = Expense {
        id: uuid::Uuid::new_v4().to_string(),
        category: OWNER_PAYOUT_CATEGORY.to_string(),
        category_id: None,
        description: format!(
            "Pago propietario villa {} - Factura #{}",
            villa.code, reservation.invoice_number
        ),
        amount: reservation.owner_price,
        currency: reservation.currency,
        expense_date: reservation.reservation_date,
        payment_status: PaymentStatus::Pending,
        notes: Some(format!(
            "Auto-generado por reservación. Cliente: {}",
            reservation.customer_name
        )),
        related_reservation_id: Some(reservation.id.clone()),
        created_by: created_by.map(ToOwned::to_owned),
        created_at: Utc::now(),
    };
    from_document(create_row(store, EXPENSES, &to_document(&expense)?).await?)
}

/// Partial update. Once abonos exist, `payment_status` follows them rather than
/// the request body.
pub async fn update_expense(
    store: &DocumentStore,
    expense_id: &str,
    input: UpdateExpenseInput,
) -> AppResult<Expense> {
    get_row(store, EXPENSES, expense_id).await?;
    if let Some(category_id) = non_empty_opt(input.category_id.as_deref()) {
        require_category(store, &category_id).await?;
    }
    let patch = remove_nulls(serialize_to_map(&input));
    let updated: Expense = if patch.is_empty() {
        from_document(get_row(store, EXPENSES, expense_id).await?)?
    } else {
        from_document(update_row(store, EXPENSES, expense_id, &patch).await?)?
    };

    let has_abonos = count_rows(
        store,
        EXPENSE_ABONOS,
        Some(&json_map(&[("expense_id", json!(expense_id))])),
    )
    .await?
        > 0;
    if has_abonos && (input.amount.is_some() || input.payment_status.is_some()) {
        return recompute_expense_status(store, expense_id).await;
    }
    Ok(updated)
}

/// Deletes the expense together with its abonos.
pub async fn delete_expense(store: &DocumentStore, expense_id: &str) -> AppResult<u64> {
    get_row(store, EXPENSES, expense_id).await?;
    let abonos_removed = delete_all_for_parent(store, AbonoParent::Expense, expense_id).await?;
    delete_row(store, EXPENSES, expense_id).await?;
    info!(expense_id, abonos_removed, "Deleted expense");
    Ok(abonos_removed)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::{create_expense, delete_expense, update_expense};
    use crate::{
        auth::{AuthUser, Role},
        error::AppError,
        models::{Currency, PaymentStatus},
        repository::table_service::{collections::EXPENSE_ABONOS, count_rows},
        schemas::{CreateAbonoInput, CreateExpenseInput, UpdateExpenseInput},
        services::abonos::{add_abono, AbonoParent},
        state::AppState,
    };

    fn caller() -> AuthUser {
        AuthUser {
            id: "emp-1".to_string(),
            username: "carla".to_string(),
            role: Role::Employee,
        }
    }

    fn new_expense(amount: rust_decimal::Decimal) -> CreateExpenseInput {
        CreateExpenseInput {
            category: "local".to_string(),
            category_id: None,
            description: "Electricity".to_string(),
            amount,
            currency: Currency::Dop,
            expense_date: NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
            payment_status: PaymentStatus::Pending,
            notes: None,
        }
    }

    fn abono(amount: rust_decimal::Decimal) -> CreateAbonoInput {
        CreateAbonoInput {
            amount,
            payment_date: NaiveDate::from_ymd_opt(2026, 6, 2).expect("date"),
            payment_method: "cash".to_string(),
            notes: None,
            invoice_number: None,
        }
    }

    #[tokio::test]
    async fn raising_amount_reopens_a_paid_expense() {
        let state = AppState::in_memory();
        let expense = create_expense(&state.store, new_expense(dec!(500)), &caller())
            .await
            .expect("expense");
        add_abono(&state, AbonoParent::Expense, &expense.id, abono(dec!(500)), &caller())
            .await
            .expect("abono");

        let raised = update_expense(
            &state.store,
            &expense.id,
            UpdateExpenseInput {
                amount: Some(dec!(800)),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(raised.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn manual_status_sticks_without_abonos() {
        let state = AppState::in_memory();
        let expense = create_expense(&state.store, new_expense(dec!(500)), &caller())
            .await
            .expect("expense");
        let updated = update_expense(
            &state.store,
            &expense.id,
            UpdateExpenseInput {
                payment_status: Some(PaymentStatus::Paid),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn delete_cascades_abonos() {
        let state = AppState::in_memory();
        let expense = create_expense(&state.store, new_expense(dec!(500)), &caller())
            .await
            .expect("expense");
        for _ in 0..2 {
            add_abono(&state, AbonoParent::Expense, &expense.id, abono(dec!(100)), &caller())
                .await
                .expect("abono");
        }

        assert_eq!(delete_expense(&state.store, &expense.id).await.expect("delete"), 2);
        assert_eq!(count_rows(&state.store, EXPENSE_ABONOS, None).await.expect("count"), 0);
        assert!(matches!(
            delete_expense(&state.store, &expense.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_category_id_is_rejected() {
        let state = AppState::in_memory();
        let mut input = new_expense(dec!(120));
        input.category_id = Some("cat-missing".to_string());
        let result = create_expense(&state.store, input, &caller()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
