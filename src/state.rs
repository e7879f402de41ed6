use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::build_store,
    error::AppError,
    repository::table_service::DocumentStore,
    services::invoice_sequence::InvoiceSequence,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DocumentStore,
}

impl AppState {
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let store = build_store(&config).await?;
        Ok(Self {
            config: Arc::new(config),
            store,
        })
    }

    pub fn invoice_sequence(&self) -> InvoiceSequence<'_> {
        InvoiceSequence::new(&self.store, self.config.invoice_counter_seed)
    }
}

#[cfg(test)]
impl AppState {
    pub fn in_memory() -> Self {
        use crate::repository::memory_store::MemoryStore;

        Self {
            config: Arc::new(AppConfig::for_tests()),
            store: DocumentStore::Memory(MemoryStore::new()),
        }
    }
}
