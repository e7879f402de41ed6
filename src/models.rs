use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Category stamped on expenses generated for villa owner payouts.
pub const OWNER_PAYOUT_CATEGORY: &str = "pago_propietario";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Dop,
    Usd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    #[default]
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

fn default_guests() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_payment_method() -> String {
    "cash".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCounter {
    pub id: String,
    pub current_number: i64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub identification: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Add-on sold with a booking (decoration, chef, transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraService {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Villa {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub villa_id: Option<String>,
    #[serde(default)]
    pub villa_code: Option<String>,
    #[serde(default)]
    pub villa_name: Option<String>,
    pub reservation_date: NaiveDate,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default = "default_guests")]
    pub guests: i32,
    pub total_amount: Decimal,
    #[serde(default)]
    pub deposit: Decimal,
    /// Paid directly on the reservation, outside the abono ledger.
    #[serde(default)]
    pub base_amount_paid: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub balance_due: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default)]
    pub owner_price: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Abono {
    pub id: String,
    pub invoice_number: String,
    pub amount: Decimal,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    pub expense_date: NaiveDate,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub related_reservation_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillaOwner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub villas: Vec<String>,
    #[serde(default)]
    pub commission_percentage: Decimal,
    #[serde(default)]
    pub total_owed: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub balance_due: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Guard value for ledger writes.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerPayment {
    pub id: String,
    pub owner_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: String,
    pub reservation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub villa_code: Option<String>,
    #[serde(default)]
    pub villa_name: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    pub reservation_date: NaiveDate,
    pub amount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

pub fn to_document<T: Serialize>(value: &T) -> AppResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(
            "Documents must serialize to JSON objects.".to_string(),
        )),
    }
}

pub fn from_document<T: DeserializeOwned>(value: Value) -> AppResult<T> {
    Ok(serde_json::from_value(value)?)
}

pub fn from_documents<T: DeserializeOwned>(values: Vec<Value>) -> AppResult<Vec<T>> {
    values.into_iter().map(from_document).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{from_document, Currency, Expense, PaymentStatus, ReservationStatus};

    #[test]
    fn enums_use_wire_spelling() {
        assert_eq!(json!(Currency::Usd), json!("USD"));
        assert_eq!(json!(ReservationStatus::Cancelled), json!("cancelled"));
        assert_eq!(PaymentStatus::Paid.as_str(), "paid");
    }

    #[test]
    fn expense_defaults_fill_missing_fields() {
        let expense: Expense = from_document(json!({
            "id": "e1",
            "category": "otros",
            "description": "Pool cleaning",
            "amount": 500,
            "expense_date": "2026-04-01",
            "created_at": "2026-04-01T10:00:00Z"
        }))
        .expect("valid expense");
        assert_eq!(expense.currency, Currency::Dop);
        assert_eq!(expense.payment_status, PaymentStatus::Pending);
        assert!(expense.related_reservation_id.is_none());
    }
}
