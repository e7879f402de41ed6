pub mod abonos;
pub mod balance;
pub mod categories;
pub mod commissions;
pub mod expenses;
pub mod invoice_sequence;
pub mod owner_ledger;
pub mod reservations;
