mod anthropic;
mod mock;
mod openai;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    db::Database,
    error::AssistantError,
    types::{ChequeTransaction, TransactionDraft},
};

pub use anthropic::AnthropicAssistant;
pub use mock::MockAssistant;
pub use openai::OpenAiAssistant;

/// Capability interface for the ledger's AI assistant, satisfied by two
/// substitutable vendor backends. Vendor and transport failures never cross
/// this boundary: free-text operations come back as displayable text and
/// extraction operations come back as a marked placeholder record. The only
/// hard error is calling anything before `initialize` has succeeded.
#[async_trait]
pub trait AiAssistant: Send + Sync {
    /// Stores credentials and model, then probes the vendor with a minimal
    /// chat request. `false` on any failure; never an error.
    async fn initialize(&self, api_key: &str, model: &str) -> bool;

    /// Single-turn exchange under the fixed financial-assistant prompt.
    async fn process_query(&self, user_query: &str) -> Result<String, AssistantError>;

    /// Extracts transaction fields from a natural-language description.
    async fn create_transaction_from_text(
        &self,
        description: &str,
    ) -> Result<ChequeTransaction, AssistantError>;

    /// Extracts transaction fields from a cheque photo. The bytes are sent
    /// as-is; no pre-validation happens on this side.
    async fn extract_data_from_image(
        &self,
        image: &[u8],
    ) -> Result<ChequeTransaction, AssistantError>;

    /// Narrates recent transaction data against the user's question.
    async fn analyze_transactions(&self, query: &str) -> Result<String, AssistantError>;

    /// `report_type` is one of customer/transaction/profit, case-insensitive;
    /// anything else returns the unsupported-type message without a call.
    async fn generate_report(
        &self,
        report_type: &str,
        parameters: &str,
    ) -> Result<String, AssistantError>;
}

pub const QUERY_SYSTEM_PROMPT: &str = "You are a financial assistant for a cheque cashing business. \
     You help answer questions about transactions, customers, and vendors. \
     Be concise and direct in your responses. If you don't know something, say so.";

pub const TEXT_EXTRACTION_PROMPT: &str = "You are an AI assistant for a cheque cashing business. \
     Extract transaction details from the user's description and return them in a structured JSON format \
     with the following fields (where available): customerId, vendorId, chequeNumber, chequeAmount, date. \
     Format the response as valid JSON only, with no additional text.";

pub const IMAGE_EXTRACTION_PROMPT: &str = "You are an AI assistant for a cheque cashing business. \
     Extract the following information from the cheque image: \
     cheque number, amount, date, and payee name. \
     Return the data in JSON format with the following fields: \
     customerId (default to 1 if not visible), vendorId (default to 'VND1' if not visible), \
     chequeNumber, chequeAmount, date (in yyyy-MM-dd format). \
     Format the response as valid JSON only, with no additional text.";

pub const IMAGE_INSTRUCTION: &str = "Extract data from this cheque image:";

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a financial analyst for a cheque cashing business. \
     Analyze the transaction data provided and answer the user's query. \
     Be data-driven and provide insights where possible.";

pub const REPORT_PREAMBLE: &str = "You are a report generator for a cheque cashing business.";

pub const UNSUPPORTED_REPORT: &str =
    "Unsupported report type. Available types: customer, transaction, profit";
pub const NO_REPLY: &str = "No response content received from the AI assistant.";
pub const NO_ANALYSIS: &str = "No analysis could be generated.";
pub const NO_REPORT: &str = "No report could be generated.";

/// Cheque-number markers on placeholder records, so the operator can tell at
/// a glance why the form was pre-filled with defaults.
pub const PLACEHOLDER_TRANSPORT: &str = "ERROR";
pub const PLACEHOLDER_UNPARSED: &str = "AUTO";
pub const PLACEHOLDER_IMAGE: &str = "IMAGE";

/// Prompt-size caps, counted in transactions serialized into the prompt.
pub const ANALYSIS_TRANSACTION_LIMIT: usize = 20;
pub const REPORT_ROW_LIMIT: usize = 50;

/// Models often wrap their "JSON only" answer in a markdown fence anyway.
pub fn strip_code_fences(reply: &str) -> String {
    reply.replace("```json", "").replace("```", "").trim().to_owned()
}

/// Best-effort parse of an extraction reply into a transaction record.
pub fn parse_transaction_reply(reply: &str) -> Option<ChequeTransaction> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str::<TransactionDraft>(&cleaned)
        .ok()
        .map(TransactionDraft::into_transaction)
}

/// The degrade policy for extraction: instead of failing, hand the operator
/// an editable default record whose cheque number carries a marker prefix.
pub fn placeholder_transaction(prefix: &str) -> ChequeTransaction {
    let mut transaction =
        ChequeTransaction::new(Utc::now().date_naive(), 1, "VND1".to_owned());
    let suffix = Utc::now().timestamp_millis() % 100_000_000;
    transaction.cheque_number = format!("{prefix}{suffix}");
    transaction.cheque_amount = Decimal::new(25000, 2);
    transaction
}

pub(crate) fn build_analysis_prompt(transactions: &[ChequeTransaction], query: &str) -> String {
    let sample: Vec<_> = transactions.iter().take(ANALYSIS_TRANSACTION_LIMIT).collect();
    let data = serde_json::to_string(&sample).unwrap_or_default();
    format!("Transaction data: {data}\n\nQuery: {query}")
}

pub(crate) fn build_report_prompt(data: &str, parameters: &str) -> String {
    format!("Data: {data}\n\nParameters: {parameters}\n\nGenerate the report in a readable format.")
}

/// Picks the dataset and branch prompt for a report type. `None` means the
/// type is unsupported and no model call may happen.
pub(crate) async fn load_report_data(
    db: &dyn Database,
    report_type: &str,
) -> Option<(&'static str, String)> {
    match report_type.to_lowercase().as_str() {
        "customer" => {
            let customers = db.get_customers().await;
            let data = serde_json::to_string(&customers).unwrap_or_default();
            Some(("Generate a customer report with the given data.", data))
        }
        "transaction" => {
            let transactions: Vec<_> = db
                .get_transactions()
                .await
                .into_iter()
                .take(REPORT_ROW_LIMIT)
                .collect();
            let data = serde_json::to_string(&transactions).unwrap_or_default();
            Some((
                "Generate a transaction summary report with the given data.",
                data,
            ))
        }
        "profit" => {
            let transactions: Vec<_> = db
                .get_transactions()
                .await
                .into_iter()
                .take(REPORT_ROW_LIMIT)
                .collect();
            let data = serde_json::to_string(&transactions).unwrap_or_default();
            Some(("Generate a profit analysis report with the given data.", data))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::db::InMemoryDb;

    use super::*;

    #[test]
    fn strips_markdown_fences() {
        let fenced = "```json\n{\"chequeNumber\":\"42\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"chequeNumber\":\"42\"}");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn parses_fenced_transaction_reply() {
        let reply = "```json\n{\"chequeNumber\":\"9913\",\"chequeAmount\":512.75}\n```";
        let transaction = parse_transaction_reply(reply).unwrap();
        assert_eq!(transaction.cheque_number, "9913");
        assert_eq!(transaction.cheque_amount, dec!(512.75));
    }

    #[test]
    fn rejects_non_json_reply() {
        assert!(parse_transaction_reply("I could not read the cheque, sorry.").is_none());
    }

    #[test]
    fn placeholder_carries_marker_prefix() {
        let transaction = placeholder_transaction(PLACEHOLDER_TRANSPORT);
        assert!(transaction.cheque_number.starts_with("ERROR"));
        assert_eq!(transaction.customer_id, 1);
        assert_eq!(transaction.vendor_id, "VND1");
        assert_eq!(transaction.cheque_amount, dec!(250.00));
    }

    #[test]
    fn analysis_prompt_caps_transactions() {
        let transactions: Vec<_> = (1..=30)
            .map(|n| {
                let mut transaction = crate::types::ChequeTransaction::blank();
                transaction.transaction_id = n;
                transaction.cheque_number = format!("CHQ-{n}");
                transaction
            })
            .collect();

        let prompt = build_analysis_prompt(&transactions, "how is volume trending?");
        assert_eq!(prompt.matches("cheque_number").count(), 20);
        assert!(prompt.ends_with("Query: how is volume trending?"));
    }

    #[tokio::test]
    async fn report_type_matching_is_case_insensitive() {
        let db = InMemoryDb::default();
        assert!(load_report_data(&db, "Customer").await.is_some());
        assert!(load_report_data(&db, "PROFIT").await.is_some());
        assert!(load_report_data(&db, "payroll").await.is_none());
    }
}
