use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{from_document, from_documents, to_document, OwnerPayment, Villa, VillaOwner},
    repository::table_service::{
        collections::{OWNER_PAYMENTS, VILLA_OWNERS},
        compare_and_set_row, create_row, create_row_if_absent, find_row, get_row, json_map,
        list_rows, DocumentStore,
    },
    schemas::OwnerPaymentInput,
    services::balance::owner_balance,
};

const MAX_LEDGER_RACES: u32 = 5;

/// Name given to owners created automatically from a villa's first booking.
pub fn owner_name_for(villa_code: &str) -> String {
    format!("Propietario {villa_code}")
}

fn auto_owner_id(villa_code: &str) -> String {
    format!("owner-{}", villa_code.trim().to_ascii_lowercase())
}

/// Adds `amount` to what is owed for `villa`, creating the owner on first use.
pub async fn accrue(
    store: &DocumentStore,
    villa: &Villa,
    amount: Decimal,
    created_by: Option<&str>,
) -> AppResult<VillaOwner> {
    let name = owner_name_for(&villa.code);
    if let Some(existing) = find_row(store, VILLA_OWNERS, &json_map(&[("name", json!(name))])).await? {
        let owner: VillaOwner = from_document(existing)?;
        return adjust_amounts(store, &owner.id, |owner| (owner.total_owed + amount, owner.amount_paid)).await;
    }

    let now = Utc::now();
    let fresh = VillaOwner {
        id: auto_owner_id(&villa.code),
        name,
        phone: villa.phone.clone().unwrap_or_default(),
        email: None,
        villas: vec![villa.code.clone()],
        commission_percentage: Decimal::ZERO,
        total_owed: amount,
        amount_paid: Decimal::ZERO,
        balance_due: amount,
        notes: Some(format!("Auto-generado para {}", villa.code)),
        created_by: created_by.map(ToOwned::to_owned),
        created_at: now,
        updated_at: now,
    };
    let (row, created) = create_row_if_absent(store, VILLA_OWNERS, &to_document(&fresh)?).await?;
    if created {
        info!(owner_id = %fresh.id, villa_code = %villa.code, total_owed = %amount, "Created villa owner");
        return from_document(row);
    }

    // Another request created the owner between our lookup and insert.
    adjust_amounts(store, &fresh.id, |owner| (owner.total_owed + amount, owner.amount_paid)).await
}

pub async fn record_payment(
    store: &DocumentStore,
    owner_id: &str,
    input: OwnerPaymentInput,
    caller: &AuthUser,
) -> AppResult<(OwnerPayment, VillaOwner)> {
    get_row(store, VILLA_OWNERS, owner_id).await?;

    let now = Utc::now();
    let payment = OwnerPayment {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        amount: input.amount,
        currency: input.currency,
        payment_method: input.payment_method,
        notes: input.notes,
        payment_date: input.payment_date.unwrap_or(now),
        created_by: Some(caller.id.clone()),
        created_at: now,
    };
    let payment: OwnerPayment =
        from_document(create_row(store, OWNER_PAYMENTS, &to_document(&payment)?).await?)?;

    let amount = payment.amount;
    let owner = adjust_amounts(store, owner_id, |owner| (owner.total_owed, owner.amount_paid + amount)).await?;
    info!(owner_id, amount = %amount, balance_due = %owner.balance_due, "Recorded owner payment");
    Ok((payment, owner))
}

/// Administrative override of the owed total; payments already made stand.
pub async fn set_total_owed(store: &DocumentStore, owner_id: &str, total_owed: Decimal) -> AppResult<VillaOwner> {
    adjust_amounts(store, owner_id, |owner| (total_owed, owner.amount_paid)).await
}

pub async fn list_payments(store: &DocumentStore, owner_id: &str, limit: i64) -> AppResult<Vec<OwnerPayment>> {
    get_row(store, VILLA_OWNERS, owner_id).await?;
    let rows = list_rows(
        store,
        OWNER_PAYMENTS,
        Some(&json_map(&[("owner_id", json!(owner_id))])),
        limit,
        "payment_date",
        false,
    )
    .await?;
    from_documents(rows)
}

/// Read-modify-write of the two ledger totals, guarded on `updated_at` so a
/// concurrent accrual or payment is never overwritten.
async fn adjust_amounts<F>(store: &DocumentStore, owner_id: &str, next: F) -> AppResult<VillaOwner>
where
    F: Fn(&VillaOwner) -> (Decimal, Decimal),
{
    for _ in 0..MAX_LEDGER_RACES {
        let current = get_row(store, VILLA_OWNERS, owner_id).await?;
        let stamp = current.get("updated_at").cloned().unwrap_or(Value::Null);
        let owner: VillaOwner = from_document(current)?;

        let (total_owed, amount_paid) = next(&owner);
        let patch = json_map(&[
            ("total_owed", json!(total_owed)),
            ("amount_paid", json!(amount_paid)),
            ("balance_due", json!(owner_balance(total_owed, amount_paid))),
            ("updated_at", json!(Utc::now())),
        ]);
        if let Some(updated) = compare_and_set_row(store, VILLA_OWNERS, owner_id, "updated_at", &stamp, &patch).await? {
            return from_document(updated);
        }
        warn!(owner_id, "Owner ledger changed concurrently, retrying");
    }

    Err(AppError::Internal(
        "Owner ledger is under heavy contention; try again.".to_string(),
    ))
}
