use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    assistant::AiAssistant,
    db::Database,
    types::{ChequeTransaction, Customer, Vendor},
};

/// Transaction-entry workflow: a draft record the operator edits, customer
/// and vendor pick-lists, and extraction commands that pre-fill the draft
/// from text or a cheque photo. Mirrors the chat session's advisory busy
/// flag and status-text error handling.
pub struct TransactionEntry {
    assistant: Arc<dyn AiAssistant>,
    db: Arc<dyn Database>,
    pub transaction: ChequeTransaction,
    customers: Vec<Customer>,
    vendors: Vec<Vendor>,
    selected_customer: Option<i32>,
    selected_vendor: Option<String>,
    status: String,
    success: bool,
    busy: bool,
}

impl TransactionEntry {
    pub fn new(assistant: Arc<dyn AiAssistant>, db: Arc<dyn Database>) -> Self {
        Self {
            assistant,
            db,
            transaction: ChequeTransaction::blank(),
            customers: Vec::new(),
            vendors: Vec::new(),
            selected_customer: None,
            selected_vendor: None,
            status: String::new(),
            success: false,
            busy: false,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn vendors(&self) -> &[Vendor] {
        &self.vendors
    }

    /// Loads the customer and vendor pick-lists. List failures already
    /// degrade to empty inside the database capability, so this never fails.
    pub async fn load(&mut self) {
        self.busy = true;
        self.customers = self.db.get_customers().await;
        self.vendors = self.db.get_vendors().await;
        self.busy = false;
    }

    pub fn select_customer(&mut self, customer_id: i32) {
        if let Some(customer) = self
            .customers
            .iter()
            .find(|customer| customer.customer_id == customer_id)
        {
            self.selected_customer = Some(customer.customer_id);
            self.transaction.customer_id = customer.customer_id;
            self.recompute_fees();
        }
    }

    pub fn select_vendor(&mut self, vendor_id: &str) {
        if let Some(vendor) = self
            .vendors
            .iter()
            .find(|vendor| vendor.vendor_id == vendor_id)
        {
            self.selected_vendor = Some(vendor.vendor_id.clone());
            self.transaction.vendor_id = vendor.vendor_id.clone();
            self.recompute_fees();
        }
    }

    fn recompute_fees(&mut self) {
        let customer_pct = self
            .selected_customer
            .and_then(|id| {
                self.customers
                    .iter()
                    .find(|customer| customer.customer_id == id)
            })
            .map(|customer| customer.fee_percentage);
        let vendor_pct = self
            .selected_vendor
            .as_deref()
            .and_then(|id| self.vendors.iter().find(|vendor| vendor.vendor_id == id))
            .map(|vendor| vendor.fee_percentage);

        if let (Some(customer_pct), Some(vendor_pct)) = (customer_pct, vendor_pct) {
            self.transaction.compute_fees(customer_pct, vendor_pct);
        }
    }

    /// Merges an extracted record into the draft, preserving the operator's
    /// existing customer/vendor selection over the model's guesses.
    fn apply_extracted(&mut self, extracted: ChequeTransaction) {
        let customer_id = self.selected_customer.unwrap_or(extracted.customer_id);
        let vendor_id = self
            .selected_vendor
            .clone()
            .unwrap_or_else(|| extracted.vendor_id.clone());

        self.transaction.cheque_number = extracted.cheque_number;
        self.transaction.cheque_amount = extracted.cheque_amount;
        self.transaction.date = extracted.date;
        self.transaction.customer_id = customer_id;
        self.transaction.vendor_id = vendor_id;
        self.recompute_fees();
    }

    pub async fn extract_from_text(&mut self, description: &str) {
        if self.busy {
            return;
        }
        self.busy = true;
        self.status = "Extracting data from description...".to_owned();

        match self.assistant.create_transaction_from_text(description).await {
            Ok(extracted) => {
                self.apply_extracted(extracted);
                self.status = "Data extracted successfully!".to_owned();
                self.success = true;
            }
            Err(error) => {
                self.status = format!("Error extracting data: {error}");
                self.success = false;
            }
        }
        self.busy = false;
    }

    pub async fn extract_from_image(&mut self, image: &[u8]) {
        if self.busy {
            return;
        }
        self.busy = true;
        self.status = "Extracting data from image...".to_owned();

        match self.assistant.extract_data_from_image(image).await {
            Ok(extracted) => {
                self.apply_extracted(extracted);
                self.status = "Data extracted successfully!".to_owned();
                self.success = true;
            }
            Err(error) => {
                self.status = format!("Error extracting data: {error}");
                self.success = false;
            }
        }
        self.busy = false;
    }

    pub fn can_save(&self) -> bool {
        !self.transaction.cheque_number.is_empty()
            && self.transaction.cheque_amount > Decimal::ZERO
            && self.transaction.customer_id > 0
            && !self.transaction.vendor_id.is_empty()
    }

    /// Persists the draft and clears the form. `false` with status text on
    /// any failure; the insert error never propagates.
    pub async fn save(&mut self) -> bool {
        if self.busy || !self.can_save() {
            return false;
        }
        self.busy = true;
        self.status = "Saving transaction...".to_owned();

        let saved = self.db.add_transaction(self.transaction.clone()).await;
        let ok = match saved {
            Ok(_) => {
                self.status = "Transaction saved successfully!".to_owned();
                self.success = true;
                self.clear();
                true
            }
            Err(error) => {
                self.status = format!("Error saving transaction: {error}");
                self.success = false;
                false
            }
        };
        self.busy = false;
        ok
    }

    pub fn clear(&mut self) {
        self.transaction = ChequeTransaction::blank();
        self.selected_customer = None;
        self.selected_vendor = None;
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::{assistant::MockAssistant, db::InMemoryDb};

    use super::*;

    async fn seeded_entry() -> TransactionEntry {
        let assistant = Arc::new(MockAssistant::default());
        assistant.initialize("key", "model").await;

        let db = Arc::new(InMemoryDb::default());
        db.add_customer(Customer {
            customer_id: 0,
            customer_name: "Alice".to_owned(),
            contact_info: None,
            fee_percentage: dec!(2.0),
            created_at: None,
            updated_at: None,
        })
        .await
        .unwrap();
        db.add_vendor(Vendor {
            vendor_id: "VND1".to_owned(),
            vendor_name: "Acme Cheques".to_owned(),
            fee_percentage: dec!(1.0),
            contact_info: None,
            created_at: None,
            updated_at: None,
        })
        .await
        .unwrap();

        let mut entry = TransactionEntry::new(assistant, db);
        entry.load().await;
        entry
    }

    #[tokio::test]
    async fn cannot_save_incomplete_draft() {
        let entry = seeded_entry().await;
        assert!(!entry.can_save());
    }

    #[tokio::test]
    async fn extraction_fills_draft_and_selection_computes_fees() {
        let mut entry = seeded_entry().await;
        entry.extract_from_text("cheque 9913 for $250 from Acme").await;

        assert!(entry.is_success());
        assert!(entry.transaction.cheque_number.starts_with("MOCK-"));
        assert_eq!(entry.transaction.cheque_amount, dec!(250.00));

        let customer_id = entry.customers()[0].customer_id;
        entry.select_customer(customer_id);
        entry.select_vendor("VND1");
        assert_eq!(entry.transaction.customer_fee, Some(dec!(5.00)));
        assert_eq!(entry.transaction.vendor_fee, Some(dec!(2.50)));
        assert_eq!(entry.transaction.profit, Some(dec!(2.50)));

        assert!(entry.can_save());
        assert!(entry.save().await);
        assert_eq!(entry.status(), "Transaction saved successfully!");
        // Form resets after a successful save.
        assert!(entry.transaction.cheque_number.is_empty());
    }

    #[tokio::test]
    async fn operator_selection_survives_extraction() {
        let mut entry = seeded_entry().await;
        let customer_id = entry.customers()[0].customer_id;
        entry.select_customer(customer_id);

        entry.extract_from_image(&[0xFF, 0xD8]).await;
        assert_eq!(entry.transaction.customer_id, customer_id);
    }

    #[tokio::test]
    async fn uninitialized_assistant_becomes_status_text() {
        let assistant = Arc::new(MockAssistant::default());
        let db = Arc::new(InMemoryDb::default());
        let mut entry = TransactionEntry::new(assistant, db);

        entry.extract_from_text("anything").await;
        assert!(!entry.is_success());
        assert!(entry.status().contains("not initialized"));
    }
}
