use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{error::AssistantError, types::ChequeTransaction};

use super::{AiAssistant, UNSUPPORTED_REPORT};

/// Deterministic stand-in used when no vendor API key is configured, and by
/// session and HTTP tests. Honors the same initialization gate and the
/// unsupported-report contract as the real backends.
#[derive(Debug, Default)]
pub struct MockAssistant {
    ready: AtomicBool,
}

impl MockAssistant {
    fn ensure_ready(&self) -> Result<(), AssistantError> {
        if self.ready.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(AssistantError::Uninitialized)
        }
    }

    fn canned_transaction(source: &str) -> ChequeTransaction {
        let mut transaction =
            ChequeTransaction::new(Utc::now().date_naive(), 1, "VND1".to_owned());
        transaction.cheque_number = format!("MOCK-{source}");
        transaction.cheque_amount = Decimal::new(25000, 2);
        transaction
    }
}

#[async_trait]
impl AiAssistant for MockAssistant {
    async fn initialize(&self, _api_key: &str, _model: &str) -> bool {
        self.ready.store(true, Ordering::Relaxed);
        true
    }

    async fn process_query(&self, user_query: &str) -> Result<String, AssistantError> {
        self.ensure_ready()?;
        Ok(format!("Mock reply to: {user_query}"))
    }

    async fn create_transaction_from_text(
        &self,
        _description: &str,
    ) -> Result<ChequeTransaction, AssistantError> {
        self.ensure_ready()?;
        Ok(Self::canned_transaction("TEXT"))
    }

    async fn extract_data_from_image(
        &self,
        _image: &[u8],
    ) -> Result<ChequeTransaction, AssistantError> {
        self.ensure_ready()?;
        Ok(Self::canned_transaction("IMAGE"))
    }

    async fn analyze_transactions(&self, query: &str) -> Result<String, AssistantError> {
        self.ensure_ready()?;
        Ok(format!("Mock analysis for: {query}"))
    }

    async fn generate_report(
        &self,
        report_type: &str,
        _parameters: &str,
    ) -> Result<String, AssistantError> {
        self.ensure_ready()?;
        match report_type.to_lowercase().as_str() {
            "customer" | "transaction" | "profit" => {
                Ok(format!("Mock {} report.", report_type.to_lowercase()))
            }
            _ => Ok(UNSUPPORTED_REPORT.to_owned()),
        }
    }
}
