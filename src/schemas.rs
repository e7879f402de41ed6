use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::models::{Currency, PaymentStatus, ReservationStatus};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("positive"));
    }
    Ok(())
}

fn default_guests() -> i32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_payment_method_cash() -> String {
    "cash".to_string()
}
fn default_limit_200() -> i64 {
    200
}
fn default_limit_1000() -> i64 {
    1000
}

pub fn clamp_limit_in_range(limit: i64, minimum: i64, maximum: i64) -> i64 {
    limit.clamp(minimum, maximum)
}

pub fn serialize_to_map<T>(value: &T) -> serde_json::Map<String, serde_json::Value>
where
    T: serde::Serialize,
{
    let json = serde_json::to_value(value)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));
    json.as_object().cloned().unwrap_or_default()
}

pub fn remove_nulls(
    mut map: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    map.retain(|_, value| !value.is_null());
    map
}

pub fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
}

// Paths

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CustomerPath {
    pub customer_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CategoryPath {
    pub category_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ExtraServicePath {
    pub service_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct VillaPath {
    pub villa_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ReservationPath {
    pub reservation_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ReservationAbonoPath {
    pub reservation_id: String,
    pub abono_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ExpensePath {
    pub expense_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ExpenseAbonoPath {
    pub expense_id: String,
    pub abono_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct OwnerPath {
    pub owner_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CommissionPath {
    pub commission_id: String,
}

// Queries

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ListQuery {
    #[serde(default = "default_limit_200")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ReservationsQuery {
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub villa_id: Option<String>,
    #[serde(default = "default_limit_1000")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct VillasQuery {
    /// Case-insensitive match on code or name.
    pub search: Option<String>,
    pub category_id: Option<String>,
    #[serde(default = "default_limit_200")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ExpensesQuery {
    pub category: Option<String>,
    pub category_id: Option<String>,
    pub payment_status: Option<String>,
    pub related_reservation_id: Option<String>,
    #[serde(default = "default_limit_1000")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct CommissionsQuery {
    pub user_id: Option<String>,
    pub paid: Option<bool>,
    #[serde(default = "default_limit_1000")]
    pub limit: i64,
}

// Customers & villas

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub identification: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateVillaInput {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category_id: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UpdateVillaInput {
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub category_id: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

// Categories & extra services

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateExtraServiceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom(function = "non_negative"))]
    pub price: Decimal,
    #[serde(default)]
    pub currency: Currency,
    pub description: Option<String>,
    pub supplier_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize, Validate)]
pub struct UpdateExtraServiceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub price: Option<Decimal>,
    pub currency: Option<Currency>,
    pub description: Option<String>,
    pub supplier_name: Option<String>,
    pub is_active: Option<bool>,
}

// Reservations

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateReservationInput {
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[validate(length(min = 1, max = 255))]
    pub customer_name: String,
    pub villa_id: Option<String>,
    pub reservation_date: NaiveDate,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    #[serde(default = "default_guests")]
    #[validate(range(min = 1))]
    pub guests: i32,
    #[validate(custom(function = "non_negative"))]
    pub total_amount: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub deposit: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub owner_price: Decimal,
    pub notes: Option<String>,
    /// Admin-only manual override.
    pub invoice_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize, Validate)]
pub struct UpdateReservationInput {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub villa_id: Option<String>,
    pub reservation_date: Option<NaiveDate>,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    #[validate(range(min = 1))]
    pub guests: Option<i32>,
    #[validate(custom(function = "non_negative"))]
    pub total_amount: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub deposit: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub amount_paid: Option<Decimal>,
    pub currency: Option<Currency>,
    pub status: Option<ReservationStatus>,
    #[validate(custom(function = "non_negative"))]
    pub owner_price: Option<Decimal>,
    pub notes: Option<String>,
}

// Abonos

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateAbonoInput {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    #[serde(default = "default_payment_method_cash")]
    #[validate(length(min = 1, max = 64))]
    pub payment_method: String,
    pub notes: Option<String>,
    /// Admin-only manual override.
    pub invoice_number: Option<String>,
}

// Expenses

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateExpenseInput {
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    pub category_id: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = "non_negative"))]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    pub expense_date: NaiveDate,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize, Validate)]
pub struct UpdateExpenseInput {
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
    pub category_id: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub description: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub expense_date: Option<NaiveDate>,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
}

// Owners

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateOwnerInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub villas: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub commission_percentage: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UpdateOwnerInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub villas: Option<Vec<String>>,
    #[validate(custom(function = "non_negative"))]
    pub commission_percentage: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct OwnerPaymentInput {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "default_payment_method_cash")]
    #[validate(length(min = 1, max = 64))]
    pub payment_method: String,
    pub notes: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct OwnerAmountsInput {
    #[validate(custom(function = "non_negative"))]
    pub total_owed: Decimal,
}

// Commissions

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct UpdateCommissionInput {
    #[validate(custom(function = "non_negative"))]
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct PayFortnightInput {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 1, max = 2))]
    pub half: u8,
    pub user_id: Option<String>,
}

// Invoice counter

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct InvoiceCounterInput {
    #[validate(range(min = 1))]
    pub new_start: i64,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct ResetInvoiceCounterInput {
    #[validate(range(min = 1))]
    pub start_number: i64,
    #[serde(default = "default_false")]
    pub confirm: bool,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::{
        non_empty_opt, remove_nulls, serialize_to_map, validate_input, CreateAbonoInput,
        CreateReservationInput, PayFortnightInput, UpdateReservationInput,
    };
    use crate::error::AppError;

    #[test]
    fn reservation_defaults_apply() {
        let input: CreateReservationInput = serde_json::from_value(json!({
            "customer_id": "c1",
            "customer_name": "Ana",
            "reservation_date": "2026-05-01",
            "total_amount": 15000
        }))
        .expect("valid payload");
        assert_eq!(input.guests, 1);
        assert_eq!(input.deposit, dec!(0));
        assert!(input.invoice_number.is_none());
        assert!(validate_input(&input).is_ok());
    }

    #[test]
    fn negative_money_is_rejected() {
        let input: CreateReservationInput = serde_json::from_value(json!({
            "customer_id": "c1",
            "customer_name": "Ana",
            "reservation_date": "2026-05-01",
            "total_amount": 100,
            "deposit": -5
        }))
        .expect("parses");
        assert!(matches!(
            validate_input(&input),
            Err(AppError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn abono_amount_must_be_positive() {
        let input: CreateAbonoInput = serde_json::from_value(json!({
            "amount": 0,
            "payment_date": "2026-05-02"
        }))
        .expect("parses");
        assert_eq!(input.payment_method, "cash");
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn fortnight_half_is_bounded() {
        let input: PayFortnightInput = serde_json::from_value(json!({
            "year": 2026, "month": 3, "half": 3
        }))
        .expect("parses");
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn partial_updates_drop_unset_fields() {
        let input = UpdateReservationInput {
            total_amount: Some(dec!(900)),
            ..Default::default()
        };
        let patch = remove_nulls(serialize_to_map(&input));
        assert_eq!(patch.len(), 1);
        assert!(patch.contains_key("total_amount"));
    }

    #[test]
    fn blank_strings_are_treated_as_missing() {
        assert_eq!(non_empty_opt(Some("  ")), None);
        assert_eq!(non_empty_opt(Some(" v1 ")), Some("v1".to_string()));
    }
}
