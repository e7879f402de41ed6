use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{from_document, from_documents, to_document, Abono, Expense, Reservation},
    repository::table_service::{
        collections::{EXPENSES, EXPENSE_ABONOS, RESERVATIONS, RESERVATION_ABONOS},
        create_row, delete_row, delete_rows, get_row, json_map, list_all_rows, update_row,
        DocumentStore,
    },
    schemas::{non_empty_opt, CreateAbonoInput},
    services::balance::{balance, expense_status, sum_amounts},
    state::AppState,
};

/// Documents that can carry partial payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbonoParent {
    Reservation,
    Expense,
}

impl AbonoParent {
    pub fn collection(self) -> &'static str {
        match self {
            Self::Reservation => RESERVATIONS,
            Self::Expense => EXPENSES,
        }
    }

    pub fn abono_collection(self) -> &'static str {
        match self {
            Self::Reservation => RESERVATION_ABONOS,
            Self::Expense => EXPENSE_ABONOS,
        }
    }

    pub fn parent_field(self) -> &'static str {
        match self {
            Self::Reservation => "reservation_id",
            Self::Expense => "expense_id",
        }
    }
}

/// Newest payment first.
pub async fn list_abonos(
    store: &DocumentStore,
    parent: AbonoParent,
    parent_id: &str,
) -> AppResult<Vec<Abono>> {
    get_row(store, parent.collection(), parent_id).await?;
    let rows = abono_rows(store, parent, parent_id, false).await?;
    from_documents(rows)
}

pub async fn add_abono(
    state: &AppState,
    parent: AbonoParent,
    parent_id: &str,
    input: CreateAbonoInput,
    caller: &AuthUser,
) -> AppResult<Abono> {
    let store = &state.store;
    get_row(store, parent.collection(), parent_id).await?;

    let sequence = state.invoice_sequence();
    let invoice_number = match non_empty_opt(input.invoice_number.as_deref()) {
        Some(manual) => {
            if !caller.is_admin() {
                return Err(AppError::Forbidden(
                    "Only administrators can assign invoice numbers manually.".to_string(),
                ));
            }
            sequence.ensure_available(&manual).await?
        }
        None => sequence.allocate_next().await?.to_string(),
    };

    let (reservation_id, expense_id) = match parent {
        AbonoParent::Reservation => (Some(parent_id.to_string()), None),
        AbonoParent::Expense => (None, Some(parent_id.to_string())),
    };
    let abono = Abono {
        id: uuid::Uuid::new_v4().to_string(),
        invoice_number,
        amount: input.amount,
        payment_method: input.payment_method,
        payment_date: input.payment_date,
        notes: input.notes,
        reservation_id,
        expense_id,
        created_by: Some(caller.id.clone()),
        created_at: Utc::now(),
    };
    let created: Abono =
        from_document(create_row(store, parent.abono_collection(), &to_document(&abono)?).await?)?;

    resync_parent(store, parent, parent_id).await?;
    info!(
        parent = parent.collection(),
        parent_id,
        invoice_number = %created.invoice_number,
        amount = %created.amount,
        "Recorded abono"
    );
    Ok(created)
}

/// Removes an abono and re-derives the parent's payment state from what remains.
pub async fn delete_abono(
    store: &DocumentStore,
    parent: AbonoParent,
    parent_id: &str,
    abono_id: &str,
) -> AppResult<()> {
    get_row(store, parent.collection(), parent_id).await?;

    let abono = get_row(store, parent.abono_collection(), abono_id).await?;
    let belongs = abono
        .get(parent.parent_field())
        .and_then(Value::as_str)
        .is_some_and(|id| id == parent_id);
    if !belongs {
        return Err(AppError::NotFound("Abono not found.".to_string()));
    }

    delete_row(store, parent.abono_collection(), abono_id).await?;
    resync_parent(store, parent, parent_id).await?;
    info!(parent = parent.collection(), parent_id, abono_id, "Deleted abono");
    Ok(())
}

/// Cascade helper for parent deletion.
pub async fn delete_all_for_parent(
    store: &DocumentStore,
    parent: AbonoParent,
    parent_id: &str,
) -> AppResult<u64> {
    delete_rows(
        store,
        parent.abono_collection(),
        &json_map(&[(parent.parent_field(), json!(parent_id))]),
    )
    .await
}

pub async fn abono_total(
    store: &DocumentStore,
    parent: AbonoParent,
    parent_id: &str,
) -> AppResult<Decimal> {
    let abonos: Vec<Abono> = from_documents(abono_rows(store, parent, parent_id, true).await?)?;
    Ok(sum_amounts(abonos.into_iter().map(|abono| abono.amount)))
}

/// `amount_paid` is always the reservation's own baseline plus its remaining
/// abonos, so adding and reversing use the same rule.
pub async fn recompute_reservation_payments(
    store: &DocumentStore,
    reservation_id: &str,
) -> AppResult<Reservation> {
    let reservation: Reservation = from_document(get_row(store, RESERVATIONS, reservation_id).await?)?;
    let paid_by_abonos = abono_total(store, AbonoParent::Reservation, reservation_id).await?;

    let amount_paid = reservation.base_amount_paid + paid_by_abonos;
    let balance_due = balance(reservation.total_amount, amount_paid, reservation.deposit);
    let patch = json_map(&[
        ("amount_paid", json!(amount_paid)),
        ("balance_due", json!(balance_due)),
        ("updated_at", json!(Utc::now())),
    ]);
    from_document(update_row(store, RESERVATIONS, reservation_id, &patch).await?)
}

pub async fn recompute_expense_status(store: &DocumentStore, expense_id: &str) -> AppResult<Expense> {
    let expense: Expense = from_document(get_row(store, EXPENSES, expense_id).await?)?;
    let paid_by_abonos = abono_total(store, AbonoParent::Expense, expense_id).await?;

    let status = expense_status(expense.amount, paid_by_abonos);
    let patch = json_map(&[("payment_status", json!(status.as_str()))]);
    from_document(update_row(store, EXPENSES, expense_id, &patch).await?)
}

async fn resync_parent(store: &DocumentStore, parent: AbonoParent, parent_id: &str) -> AppResult<()> {
    match parent {
        AbonoParent::Reservation => {
            recompute_reservation_payments(store, parent_id).await?;
        }
        AbonoParent::Expense => {
            recompute_expense_status(store, parent_id).await?;
        }
    }
    Ok(())
}

async fn abono_rows(
    store: &DocumentStore,
    parent: AbonoParent,
    parent_id: &str,
    ascending: bool,
) -> AppResult<Vec<Value>> {
    list_all_rows(
        store,
        parent.abono_collection(),
        Some(&json_map(&[(parent.parent_field(), json!(parent_id))])),
        "payment_date",
        ascending,
    )
    .await
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::{add_abono, delete_abono, list_abonos, AbonoParent};
    use crate::{
        auth::{AuthUser, Role},
        error::AppError,
        models::{from_document, to_document, Expense, PaymentStatus, Reservation},
        repository::table_service::{
            collections::{EXPENSES, EXPENSE_ABONOS, RESERVATIONS},
            create_row, get_row, json_map,
        },
        schemas::CreateAbonoInput,
        state::AppState,
    };

    fn admin() -> AuthUser {
        AuthUser {
            id: "admin-1".to_string(),
            username: "admin".to_string(),
            role: Role::Admin,
        }
    }

    fn employee() -> AuthUser {
        AuthUser {
            id: "emp-1".to_string(),
            username: "carla".to_string(),
            role: Role::Employee,
        }
    }

    fn payment(amount: Decimal, day: u32, invoice_number: Option<&str>) -> CreateAbonoInput {
        CreateAbonoInput {
            amount,
            payment_date: NaiveDate::from_ymd_opt(2026, 5, day).expect("date"),
            payment_method: "transfer".to_string(),
            notes: None,
            invoice_number: invoice_number.map(ToOwned::to_owned),
        }
    }

    async fn seed_expense(state: &AppState, amount: Decimal) -> String {
        let expense = Expense {
            id: "exp-1".to_string(),
            category: "otros".to_string(),
            category_id: None,
            description: "Pool pump".to_string(),
            amount,
            currency: Default::default(),
            expense_date: NaiveDate::from_ymd_opt(2026, 5, 1).expect("date"),
            payment_status: PaymentStatus::Pending,
            notes: None,
            related_reservation_id: None,
            created_by: None,
            created_at: Utc::now(),
        };
        create_row(&state.store, EXPENSES, &to_document(&expense).expect("doc"))
            .await
            .expect("insert expense");
        expense.id
    }

    async fn seed_reservation(state: &AppState) -> String {
        let now = Utc::now();
        let reservation = Reservation {
            id: "res-1".to_string(),
            invoice_number: "900".to_string(),
            customer_id: "c1".to_string(),
            customer_name: "Ana".to_string(),
            villa_id: None,
            villa_code: None,
            villa_name: None,
            reservation_date: NaiveDate::from_ymd_opt(2026, 5, 1).expect("date"),
            check_in_time: None,
            check_out_time: None,
            guests: 2,
            total_amount: dec!(15000),
            deposit: dec!(2000),
            base_amount_paid: dec!(10000),
            amount_paid: dec!(10000),
            balance_due: dec!(7000),
            currency: Default::default(),
            status: Default::default(),
            owner_price: Decimal::ZERO,
            notes: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        create_row(&state.store, RESERVATIONS, &to_document(&reservation).expect("doc"))
            .await
            .expect("insert reservation");
        reservation.id
    }

    async fn expense_status(state: &AppState, id: &str) -> PaymentStatus {
        let expense: Expense =
            from_document(get_row(&state.store, EXPENSES, id).await.expect("expense")).expect("typed");
        expense.payment_status
    }

    #[tokio::test]
    async fn expense_flips_to_paid_and_back() {
        let state = AppState::in_memory();
        let expense_id = seed_expense(&state, dec!(500)).await;

        add_abono(&state, AbonoParent::Expense, &expense_id, payment(dec!(300), 2, None), &employee())
            .await
            .expect("first abono");
        assert_eq!(expense_status(&state, &expense_id).await, PaymentStatus::Pending);

        let second = add_abono(&state, AbonoParent::Expense, &expense_id, payment(dec!(200), 3, None), &employee())
            .await
            .expect("second abono");
        assert_eq!(expense_status(&state, &expense_id).await, PaymentStatus::Paid);

        delete_abono(&state.store, AbonoParent::Expense, &expense_id, &second.id)
            .await
            .expect("delete");
        assert_eq!(expense_status(&state, &expense_id).await, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn reservation_abono_adds_and_reverses() {
        let state = AppState::in_memory();
        let reservation_id = seed_reservation(&state).await;

        let abono = add_abono(&state, AbonoParent::Reservation, &reservation_id, payment(dec!(7000), 4, None), &employee())
            .await
            .expect("abono");
        let reservation: Reservation =
            from_document(get_row(&state.store, RESERVATIONS, &reservation_id).await.expect("row")).expect("typed");
        assert_eq!(reservation.amount_paid, dec!(17000));
        assert_eq!(reservation.balance_due, Decimal::ZERO);

        delete_abono(&state.store, AbonoParent::Reservation, &reservation_id, &abono.id)
            .await
            .expect("delete");
        let reservation: Reservation =
            from_document(get_row(&state.store, RESERVATIONS, &reservation_id).await.expect("row")).expect("typed");
        assert_eq!(reservation.amount_paid, dec!(10000));
        assert_eq!(reservation.balance_due, dec!(7000));
    }

    #[tokio::test]
    async fn employees_cannot_pick_invoice_numbers() {
        let state = AppState::in_memory();
        let expense_id = seed_expense(&state, dec!(500)).await;

        let result = add_abono(&state, AbonoParent::Expense, &expense_id, payment(dec!(50), 2, Some("7777")), &employee()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn admin_manual_number_must_be_unused() {
        let state = AppState::in_memory();
        let expense_id = seed_expense(&state, dec!(500)).await;
        seed_reservation(&state).await;

        let taken = add_abono(&state, AbonoParent::Expense, &expense_id, payment(dec!(50), 2, Some("900")), &admin()).await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));

        let manual = add_abono(&state, AbonoParent::Expense, &expense_id, payment(dec!(50), 2, Some("M-1")), &admin())
            .await
            .expect("manual number");
        assert_eq!(manual.invoice_number, "M-1");
    }

    #[tokio::test]
    async fn lists_newest_payment_first() {
        let state = AppState::in_memory();
        let expense_id = seed_expense(&state, dec!(500)).await;
        for day in [3, 9, 5] {
            add_abono(&state, AbonoParent::Expense, &expense_id, payment(dec!(10), day, None), &employee())
                .await
                .expect("abono");
        }
        let dates: Vec<u32> = list_abonos(&state.store, AbonoParent::Expense, &expense_id)
            .await
            .expect("list")
            .iter()
            .map(|abono| chrono::Datelike::day(&abono.payment_date))
            .collect();
        assert_eq!(dates, vec![9, 5, 3]);
    }

    #[tokio::test]
    async fn delete_requires_matching_parent() {
        let state = AppState::in_memory();
        let expense_id = seed_expense(&state, dec!(500)).await;
        create_row(
            &state.store,
            EXPENSE_ABONOS,
            &json_map(&[("id", json!("ab-x")), ("expense_id", json!("other"))]),
        )
        .await
        .expect("foreign abono");

        let result = delete_abono(&state.store, AbonoParent::Expense, &expense_id, "ab-x").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let missing = delete_abono(&state.store, AbonoParent::Expense, "nope", "ab-x").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
