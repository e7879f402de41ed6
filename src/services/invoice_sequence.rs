use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult},
    models::{from_document, InvoiceCounter},
    repository::table_service::{
        collections::{COUNTERS, RESERVATIONS},
        compare_and_set_row, count_rows, create_row_if_absent, json_map, update_row,
        DocumentStore, INVOICE_COLLECTIONS,
    },
};

pub const INVOICE_COUNTER_ID: &str = "main_counter";
/// Consecutive taken numbers tolerated before allocation gives up.
pub const MAX_PROBES: i64 = 100;
/// Times a lost counter race is re-run before surfacing an error.
const MAX_COUNTER_RACES: u32 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct CounterView {
    pub current_number: i64,
    pub next_invoice: String,
    pub reservations_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutcome {
    pub current_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Sole owner of the shared invoice counter document.
pub struct InvoiceSequence<'a> {
    store: &'a DocumentStore,
    seed: i64,
}

impl<'a> InvoiceSequence<'a> {
    pub fn new(store: &'a DocumentStore, seed: i64) -> Self {
        Self { store, seed }
    }

    /// Hands out the first number at or after the counter that no reservation or
    /// abono holds, then moves the counter past it with a compare-and-set so two
    /// concurrent callers cannot both claim the same start value.
    pub async fn allocate_next(&self) -> AppResult<i64> {
        for _ in 0..MAX_COUNTER_RACES {
            let start = self.current_number().await?;
            let found = self.first_available(start).await?;

            let mut patch = json_map(&[("current_number", json!(found + 1))]);
            patch.insert("updated_at".to_string(), json!(Utc::now()));
            let claimed = compare_and_set_row(
                self.store,
                COUNTERS,
                INVOICE_COUNTER_ID,
                "current_number",
                &json!(start),
                &patch,
            )
            .await?;

            if claimed.is_some() {
                info!(invoice_number = found, "Allocated invoice number");
                return Ok(found);
            }
            warn!(start, "Invoice counter moved during allocation, retrying");
        }

        Err(AppError::Internal(
            "Invoice counter is under heavy contention; try again.".to_string(),
        ))
    }

    /// True when no reservation, reservation abono or expense abono uses `candidate`.
    pub async fn is_available(&self, candidate: &str) -> AppResult<bool> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(false);
        }
        let filters = json_map(&[("invoice_number", Value::String(candidate.to_string()))]);
        for collection in INVOICE_COLLECTIONS {
            if count_rows(self.store, collection, Some(&filters)).await? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks an admin-supplied number and returns it trimmed.
    pub async fn ensure_available(&self, candidate: &str) -> AppResult<String> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(AppError::BadRequest(
                "invoice_number cannot be empty.".to_string(),
            ));
        }
        if !self.is_available(candidate).await? {
            return Err(AppError::Conflict(format!(
                "Invoice number {candidate} is already in use."
            )));
        }
        Ok(candidate.to_string())
    }

    pub async fn view(&self) -> AppResult<CounterView> {
        let current_number = self.current_number().await?;
        let next_invoice = self.first_available(current_number).await?;
        Ok(CounterView {
            current_number,
            next_invoice: next_invoice.to_string(),
            reservations_count: count_rows(self.store, RESERVATIONS, None).await?,
        })
    }

    /// Moves the counter to `start` unconditionally. Existing reservations only
    /// produce a warning.
    pub async fn advance_to(&self, start: i64) -> AppResult<AdvanceOutcome> {
        ensure_positive(start)?;
        let existing = count_rows(self.store, RESERVATIONS, None).await?;
        self.write_counter(start).await?;

        let warning = (existing > 0).then(|| {
            warn!(
                start,
                existing_reservations = existing,
                "Invoice counter advanced while reservations exist"
            );
            format!(
                "{existing} reservations already exist; new invoices start at {start} and skip numbers in use."
            )
        });
        Ok(AdvanceOutcome {
            current_number: start,
            warning,
        })
    }

    /// Resets the counter. Refused while any reservation exists.
    pub async fn reset_to(&self, start: i64, confirm: bool) -> AppResult<i64> {
        ensure_positive(start)?;
        if !confirm {
            return Err(AppError::BadRequest(
                "Resetting the invoice counter requires confirm=true.".to_string(),
            ));
        }
        let existing = count_rows(self.store, RESERVATIONS, None).await?;
        if existing > 0 {
            return Err(AppError::PreconditionFailed {
                message: format!(
                    "Cannot reset the invoice counter while {existing} reservations exist."
                ),
                blocking: existing,
            });
        }
        self.write_counter(start).await?;
        info!(start, "Invoice counter reset");
        Ok(start)
    }

    async fn current_number(&self) -> AppResult<i64> {
        let seed = json_map(&[
            ("id", json!(INVOICE_COUNTER_ID)),
            ("current_number", json!(self.seed)),
            ("updated_at", json!(Utc::now())),
        ]);
        let (row, created) = create_row_if_absent(self.store, COUNTERS, &seed).await?;
        if created {
            info!(seed = self.seed, "Initialized invoice counter");
        }
        let counter: InvoiceCounter = from_document(row)?;
        Ok(counter.current_number)
    }

    async fn write_counter(&self, value: i64) -> AppResult<()> {
        self.current_number().await?;
        let patch = json_map(&[
            ("current_number", json!(value)),
            ("updated_at", json!(Utc::now())),
        ]);
        update_row(self.store, COUNTERS, INVOICE_COUNTER_ID, &patch).await?;
        Ok(())
    }

    async fn first_available(&self, start: i64) -> AppResult<i64> {
        for offset in 0..MAX_PROBES {
            let candidate = start + offset;
            if self.is_available(&candidate.to_string()).await? {
                return Ok(candidate);
            }
        }
        error!(
            start,
            probes = MAX_PROBES,
            "Invoice sequence exhausted; operator intervention required"
        );
        Err(AppError::SequenceExhausted(format!(
            "No free invoice number within {MAX_PROBES} numbers of {start}."
        )))
    }
}

fn ensure_positive(start: i64) -> AppResult<()> {
    if start < 1 {
        return Err(AppError::BadRequest(
            "Invoice numbers must be greater than 0.".to_string(),
        ));
    }
    Ok(())
}
