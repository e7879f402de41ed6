use std::collections::BTreeMap;

use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{from_document, from_documents, to_document, Commission, Reservation},
    repository::table_service::{
        collections::COMMISSIONS, create_row, delete_row, get_row, json_map, list_all_rows,
        list_rows, update_row, DocumentStore,
    },
    schemas::{PayFortnightInput, UpdateCommissionInput},
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserCommissionStats {
    pub user_id: String,
    pub user_name: String,
    pub count: u64,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub unpaid_amount: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommissionStats {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub unpaid_amount: Decimal,
    pub users: Vec<UserCommissionStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FortnightPayout {
    pub updated: u64,
    pub total_amount: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

pub async fn create_for_reservation(
    store: &DocumentStore,
    reservation: &Reservation,
    caller: &AuthUser,
    amount: Decimal,
) -> AppResult<Commission> {
    let commission = Commission {
        id: uuid::Uuid::new_v4().to_string(),
        reservation_id: reservation.id.clone(),
        user_id: caller.id.clone(),
        user_name: caller.username.clone(),
        invoice_number: Some(reservation.invoice_number.clone()),
        villa_code: reservation.villa_code.clone(),
        villa_name: reservation.villa_name.clone(),
        customer_name: reservation.customer_name.clone(),
        reservation_date: reservation.reservation_date,
        amount,
        notes: None,
        paid: false,
        paid_date: None,
        created_at: Utc::now(),
    };
    from_document(create_row(store, COMMISSIONS, &to_document(&commission)?).await?)
}

pub async fn list_commissions(
    store: &DocumentStore,
    user_id: Option<String>,
    paid: Option<bool>,
    limit: i64,
) -> AppResult<Vec<Commission>> {
    let mut filters = Map::new();
    if let Some(user_id) = user_id {
        filters.insert("user_id".to_string(), Value::String(user_id));
    }
    if let Some(paid) = paid {
        filters.insert("paid".to_string(), Value::Bool(paid));
    }
    let rows = list_rows(store, COMMISSIONS, Some(&filters), limit, "reservation_date", false).await?;
    from_documents(rows)
}

pub async fn commission_stats(store: &DocumentStore) -> AppResult<CommissionStats> {
    let commissions: Vec<Commission> =
        from_documents(list_all_rows(store, COMMISSIONS, None, "reservation_date", false).await?)?;
    Ok(summarize(&commissions))
}

fn summarize(commissions: &[Commission]) -> CommissionStats {
    let mut per_user: BTreeMap<&str, UserCommissionStats> = BTreeMap::new();
    let mut stats = CommissionStats::default();

    for commission in commissions {
        let entry = per_user
            .entry(commission.user_id.as_str())
            .or_insert_with(|| UserCommissionStats {
                user_id: commission.user_id.clone(),
                user_name: commission.user_name.clone(),
                ..Default::default()
            });
        entry.count += 1;
        entry.total_amount += commission.amount;
        stats.total_amount += commission.amount;
        if commission.paid {
            entry.paid_amount += commission.amount;
            stats.paid_amount += commission.amount;
        } else {
            entry.unpaid_amount += commission.amount;
            stats.unpaid_amount += commission.amount;
        }
    }

    stats.users = per_user.into_values().collect();
    stats
}

pub async fn update_commission(
    store: &DocumentStore,
    commission_id: &str,
    input: UpdateCommissionInput,
) -> AppResult<Commission> {
    let mut patch = Map::new();
    if let Some(amount) = input.amount {
        patch.insert("amount".to_string(), json!(amount));
    }
    if let Some(notes) = input.notes {
        patch.insert("notes".to_string(), Value::String(notes));
    }
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }
    get_row(store, COMMISSIONS, commission_id).await?;
    from_document(update_row(store, COMMISSIONS, commission_id, &patch).await?)
}

pub async fn set_paid(store: &DocumentStore, commission_id: &str, paid: bool) -> AppResult<Commission> {
    let paid_date = paid.then(|| Utc::now().date_naive());
    let patch = json_map(&[("paid", json!(paid)), ("paid_date", json!(paid_date))]);
    from_document(update_row(store, COMMISSIONS, commission_id, &patch).await?)
}

pub async fn delete_commission(store: &DocumentStore, commission_id: &str) -> AppResult<()> {
    delete_row(store, COMMISSIONS, commission_id).await?;
    Ok(())
}

/// Half-open date range of a fortnight: days 1-15 for `half == 1`, 16 to month
/// end for `half == 2`.
pub fn fortnight_range(year: i32, month: u32, half: u8) -> AppResult<(NaiveDate, NaiveDate)> {
    let invalid = || AppError::BadRequest(format!("Invalid fortnight {year}-{month:02} half {half}."));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let sixteenth = NaiveDate::from_ymd_opt(year, month, 16).ok_or_else(invalid)?;
    match half {
        1 => Ok((first, sixteenth)),
        2 => {
            let next_month = first.checked_add_months(Months::new(1)).ok_or_else(invalid)?;
            Ok((sixteenth, next_month))
        }
        _ => Err(invalid()),
    }
}

pub async fn pay_fortnight(store: &DocumentStore, input: PayFortnightInput) -> AppResult<FortnightPayout> {
    let (start, end) = fortnight_range(input.year, input.month, input.half)?;

    let mut filters = json_map(&[
        ("paid", json!(false)),
        ("reservation_date__gte", json!(start)),
        ("reservation_date__lt", json!(end)),
    ]);
    if let Some(user_id) = input.user_id {
        filters.insert("user_id".to_string(), Value::String(user_id));
    }
    let pending: Vec<Commission> = from_documents(
        list_all_rows(store, COMMISSIONS, Some(&filters), "reservation_date", true).await?,
    )?;

    let mut total_amount = Decimal::ZERO;
    for commission in &pending {
        set_paid(store, &commission.id, true).await?;
        total_amount += commission.amount;
    }

    info!(
        period_start = %start,
        period_end = %end,
        updated = pending.len(),
        total_amount = %total_amount,
        "Paid fortnight commissions"
    );
    Ok(FortnightPayout {
        updated: pending.len() as u64,
        total_amount,
        period_start: start,
        period_end: end,
    })
}
