use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{from_document, from_documents, to_document, Expense, Reservation, Villa},
    repository::table_service::{
        collections::{COMMISSIONS, EXPENSES, RESERVATIONS, VILLAS},
        count_rows, create_row, delete_row, get_row, json_map, list_all_rows, list_rows, update_row,
        DocumentStore,
    },
    schemas::{
        non_empty_opt, remove_nulls, serialize_to_map, CreateReservationInput,
        UpdateReservationInput,
    },
    services::{
        abonos::{abono_total, delete_all_for_parent, AbonoParent},
        balance::balance,
        commissions, expenses, owner_ledger,
    },
    state::AppState,
};

/// A created reservation plus any follow-up step that did not complete.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationOutcome {
    #[serde(flatten)]
    pub reservation: Reservation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReservationDeletion {
    pub expenses_removed: u64,
    pub abonos_removed: u64,
}

pub async fn list_reservations(
    store: &DocumentStore,
    filters: &Map<String, Value>,
    limit: i64,
) -> AppResult<Vec<Reservation>> {
    let rows = list_rows(store, RESERVATIONS, Some(filters), limit, "created_at", false).await?;
    from_documents(rows)
}

pub async fn get_reservation(store: &DocumentStore, reservation_id: &str) -> AppResult<Reservation> {
    from_document(get_row(store, RESERVATIONS, reservation_id).await?)
}

pub async fn create_reservation(
    state: &AppState,
    input: CreateReservationInput,
    caller: &AuthUser,
) -> AppResult<ReservationOutcome> {
    let store = &state.store;
    let sequence = state.invoice_sequence();

    let invoice_number = match non_empty_opt(input.invoice_number.as_deref()) {
        Some(manual) if caller.is_admin() => sequence.ensure_available(&manual).await?,
        Some(_) => {
            debug!(user_id = %caller.id, "Ignoring invoice number from non-admin caller");
            sequence.allocate_next().await?.to_string()
        }
        None => sequence.allocate_next().await?.to_string(),
    };

    let mut warnings = Vec::new();
    let villa = match non_empty_opt(input.villa_id.as_deref()) {
        Some(villa_id) => lookup_villa(store, &villa_id, &mut warnings).await,
        None => None,
    };

    let now = Utc::now();
    let reservation = Reservation {
        id: uuid::Uuid::new_v4().to_string(),
        invoice_number,
        customer_id: input.customer_id,
        customer_name: input.customer_name,
        villa_id: non_empty_opt(input.villa_id.as_deref()),
        villa_code: villa.as_ref().map(|villa| villa.code.clone()),
        villa_name: villa.as_ref().map(|villa| villa.name.clone()),
        reservation_date: input.reservation_date,
        check_in_time: input.check_in_time,
        check_out_time: input.check_out_time,
        guests: input.guests,
        total_amount: input.total_amount,
        deposit: input.deposit,
        base_amount_paid: input.amount_paid,
        amount_paid: input.amount_paid,
        balance_due: balance(input.total_amount, input.amount_paid, input.deposit),
        currency: input.currency,
        status: input.status,
        owner_price: input.owner_price,
        notes: input.notes,
        created_by: Some(caller.id.clone()),
        created_at: now,
        updated_at: now,
    };
    let reservation: Reservation =
        from_document(create_row(store, RESERVATIONS, &to_document(&reservation)?).await?)?;
    info!(
        reservation_id = %reservation.id,
        invoice_number = %reservation.invoice_number,
        balance_due = %reservation.balance_due,
        "Created reservation"
    );

    if reservation.owner_price > Decimal::ZERO {
        if let Some(villa) = villa.as_ref() {
            if let Err(error) =
                expenses::create_owner_payout(store, &reservation, villa, Some(&caller.id)).await
            {
                warnings.push(side_effect_failed(&reservation, "owner payout expense", &error));
            }
            if let Err(error) =
                owner_ledger::accrue(store, villa, reservation.owner_price, Some(&caller.id)).await
            {
                warnings.push(side_effect_failed(&reservation, "owner debt accrual", &error));
            }
        }
    }

    if let Err(error) = commissions::create_for_reservation(
        store,
        &reservation,
        caller,
        state.config.reservation_commission_amount,
    )
    .await
    {
        warnings.push(side_effect_failed(&reservation, "commission", &error));
    }

    Ok(ReservationOutcome {
        reservation,
        warnings,
    })
}

/// Merges the provided fields and recomputes the balance from the merged values.
/// A new `amount_paid` is taken as the grand total; the part not covered by
/// abonos becomes the reservation's own baseline.
pub async fn update_reservation(
    store: &DocumentStore,
    reservation_id: &str,
    input: UpdateReservationInput,
) -> AppResult<Reservation> {
    let existing = get_reservation(store, reservation_id).await?;
    let mut patch = remove_nulls(serialize_to_map(&input));

    let mut amount_paid = existing.amount_paid;
    if let Some(new_paid) = input.amount_paid {
        let paid_by_abonos = abono_total(store, AbonoParent::Reservation, reservation_id).await?;
        if new_paid < paid_by_abonos {
            return Err(AppError::BadRequest(format!(
                "amount_paid cannot be lower than the {paid_by_abonos} already recorded as abonos."
            )));
        }
        patch.insert("base_amount_paid".to_string(), json!(new_paid - paid_by_abonos));
        amount_paid = new_paid;
    }

    if let Some(villa_id) = input.villa_id.as_deref() {
        if existing.villa_id.as_deref() != Some(villa_id) {
            // Moving a booking to an unknown villa is rejected outright.
            let villa: Villa = from_document(get_row(store, VILLAS, villa_id).await?)?;
            patch.insert("villa_code".to_string(), json!(villa.code));
            patch.insert("villa_name".to_string(), json!(villa.name));
        }
    }

    let total_amount = input.total_amount.unwrap_or(existing.total_amount);
    let deposit = input.deposit.unwrap_or(existing.deposit);
    patch.insert(
        "balance_due".to_string(),
        json!(balance(total_amount, amount_paid, deposit)),
    );
    patch.insert("updated_at".to_string(), json!(Utc::now()));

    let updated: Reservation = from_document(update_row(store, RESERVATIONS, reservation_id, &patch).await?)?;
    info!(reservation_id, balance_due = %updated.balance_due, "Updated reservation");
    Ok(updated)
}

/// Removes the reservation, its abonos and its owner payout expenses.
/// Commissions and owner debt already accrued are left in place.
pub async fn delete_reservation(store: &DocumentStore, reservation_id: &str) -> AppResult<ReservationDeletion> {
    get_row(store, RESERVATIONS, reservation_id).await?;

    let payouts: Vec<Expense> = from_documents(
        list_all_rows(
            store,
            EXPENSES,
            Some(&json_map(&[("related_reservation_id", json!(reservation_id))])),
            "created_at",
            true,
        )
        .await?,
    )?;
    let mut abonos_removed = 0;
    for payout in &payouts {
        abonos_removed += delete_all_for_parent(store, AbonoParent::Expense, &payout.id).await?;
        delete_row(store, EXPENSES, &payout.id).await?;
    }
    abonos_removed += delete_all_for_parent(store, AbonoParent::Reservation, reservation_id).await?;
    delete_row(store, RESERVATIONS, reservation_id).await?;

    let kept_commissions = count_rows(
        store,
        COMMISSIONS,
        Some(&json_map(&[("reservation_id", json!(reservation_id))])),
    )
    .await?;
    info!(
        reservation_id,
        expenses_removed = payouts.len(),
        abonos_removed,
        kept_commissions,
        "Deleted reservation"
    );
    Ok(ReservationDeletion {
        expenses_removed: payouts.len() as u64,
        abonos_removed,
    })
}

async fn lookup_villa(store: &DocumentStore, villa_id: &str, warnings: &mut Vec<String>) -> Option<Villa> {
    match get_row(store, VILLAS, villa_id).await.and_then(from_document) {
        Ok(villa) => Some(villa),
        Err(error) => {
            warn!(villa_id, error = %error, "Villa lookup failed; skipping owner payout");
            warnings.push(format!("Villa {villa_id} not found; owner payout was not recorded."));
            None
        }
    }
}

fn side_effect_failed(reservation: &Reservation, step: &str, error: &AppError) -> String {
    warn!(
        reservation_id = %reservation.id,
        step,
        error = %error,
        "Reservation side effect failed"
    );
    format!("Reservation saved but the {step} could not be recorded: {error}")
}
