use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::{
    error::DbError,
    types::{
        ChequeTransaction, Customer, CustomerDeposit, CustomerDepositAllocation, ProfitWithdrawal,
        ProfitWithdrawalAllocation, Vendor, VendorPayment, VendorPaymentAllocation,
        allocation_fits,
    },
};

use super::Database;

#[derive(Debug, Clone)]
struct Creds {
    rest_url: String,
    api_key: String,
}

/// Ledger store on Supabase, spoken to through the PostgREST interface:
/// per-table endpoints with `{column}=eq.{value}` filters, inserts and
/// mutations asking for `return=representation` so the affected rows come
/// back in the response.
#[derive(Debug, Default)]
pub struct SupabaseDb {
    client: Client,
    creds: RwLock<Option<Creds>>,
}

#[derive(Debug, serde::Deserialize)]
struct AmountRow {
    amount: Decimal,
}

impl SupabaseDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn creds(&self) -> Result<Creds, DbError> {
        self.creds
            .read()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or(DbError::Uninitialized)
    }

    fn request(&self, creds: &Creds, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", creds.rest_url, table))
            .header("apikey", &creds.api_key)
            .bearer_auth(&creds.api_key)
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Vec<T>, DbError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DbError::Backend { status, body });
        }
        Ok(response.json().await?)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, DbError> {
        let creds = self.creds()?;
        let builder = self.request(&creds, Method::GET, table).query(query);
        self.rows(builder).await
    }

    /// Swallowing variant for the list accessors: log and come back empty.
    async fn select_or_empty<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Vec<T> {
        match self.select(table, query).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(table, %error, "list query failed");
                Vec::new()
            }
        }
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filter: (&str, &str),
    ) -> Option<T> {
        let query = format!("eq.{}", filter.1);
        match self
            .select::<T>(table, &[(filter.0, query.as_str()), ("limit", "1")])
            .await
        {
            Ok(mut rows) => rows.pop(),
            Err(error) => {
                warn!(table, key = filter.0, %error, "single-row query failed");
                None
            }
        }
    }

    /// Insert one row and return the persisted representation. `serial_pk`
    /// names a backend-assigned primary key to drop from the payload.
    async fn insert<T: Serialize + DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
        serial_pk: Option<&str>,
    ) -> Result<T, DbError> {
        let creds = self.creds()?;
        let mut payload = serde_json::to_value(row)?;
        if let (Some(pk), Some(map)) = (serial_pk, payload.as_object_mut()) {
            map.remove(pk);
        }

        let builder = self
            .request(&creds, Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&payload);
        let mut rows: Vec<T> = self.rows(builder).await?;
        rows.pop().ok_or(DbError::EmptyInsert)
    }

    /// Update rows matching the filter; true only when something matched.
    async fn update(&self, table: &str, filter: (&str, &str), row: &impl Serialize) -> bool {
        let result = async {
            let creds = self.creds()?;
            let query = format!("eq.{}", filter.1);
            let builder = self
                .request(&creds, Method::PATCH, table)
                .query(&[(filter.0, query.as_str())])
                .header("Prefer", "return=representation")
                .json(row);
            self.rows::<serde_json::Value>(builder).await
        }
        .await;

        match result {
            Ok(rows) => !rows.is_empty(),
            Err(error) => {
                warn!(table, key = filter.0, %error, "update failed");
                false
            }
        }
    }

    /// Delete rows matching the filter. Asking for the deleted representation
    /// lets us report false when nothing matched instead of a blind true.
    async fn delete(&self, table: &str, filter: (&str, &str)) -> bool {
        let result = async {
            let creds = self.creds()?;
            let query = format!("eq.{}", filter.1);
            let builder = self
                .request(&creds, Method::DELETE, table)
                .query(&[(filter.0, query.as_str())])
                .header("Prefer", "return=representation");
            self.rows::<serde_json::Value>(builder).await
        }
        .await;

        match result {
            Ok(rows) => !rows.is_empty(),
            Err(error) => {
                warn!(table, key = filter.0, %error, "delete failed");
                false
            }
        }
    }

    async fn parent_amount(&self, table: &str, pk: &str, id: i32) -> Result<Decimal, DbError> {
        let id = id.to_string();
        let query = format!("eq.{id}");
        let mut rows: Vec<AmountRow> = self
            .select(table, &[("select", "amount"), (pk, query.as_str())])
            .await?;
        rows.pop()
            .map(|row| row.amount)
            .ok_or(DbError::NotFound {
                key: format!("{pk}={id}"),
            })
    }
}

#[async_trait]
impl Database for SupabaseDb {
    async fn initialize(&self, api_url: &str, api_key: &str) -> bool {
        let creds = Creds {
            rest_url: format!("{}/rest/v1", api_url.trim_end_matches('/')),
            api_key: api_key.to_owned(),
        };

        let probe = self
            .request(&creds, Method::GET, "customers")
            .query(&[("select", "customer_id"), ("limit", "1")])
            .send()
            .await;
        match probe {
            Ok(response) if response.status().is_success() => {
                if let Ok(mut guard) = self.creds.write() {
                    *guard = Some(creds);
                }
                info!("connected to Supabase backend");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "Supabase probe rejected");
                false
            }
            Err(error) => {
                warn!(%error, "Supabase probe failed");
                false
            }
        }
    }

    async fn get_customers(&self) -> Vec<Customer> {
        self.select_or_empty("customers", &[("select", "*"), ("order", "customer_id")])
            .await
    }

    async fn get_customer_by_id(&self, customer_id: i32) -> Option<Customer> {
        self.select_one("customers", ("customer_id", &customer_id.to_string()))
            .await
    }

    async fn add_customer(&self, customer: Customer) -> Result<Customer, DbError> {
        self.insert("customers", &customer, Some("customer_id")).await
    }

    async fn update_customer(&self, customer: &Customer) -> bool {
        self.update(
            "customers",
            ("customer_id", &customer.customer_id.to_string()),
            customer,
        )
        .await
    }

    async fn delete_customer(&self, customer_id: i32) -> bool {
        self.delete("customers", ("customer_id", &customer_id.to_string()))
            .await
    }

    async fn get_vendors(&self) -> Vec<Vendor> {
        self.select_or_empty("vendors", &[("select", "*"), ("order", "vendor_id")])
            .await
    }

    async fn get_vendor_by_id(&self, vendor_id: &str) -> Option<Vendor> {
        self.select_one("vendors", ("vendor_id", vendor_id)).await
    }

    async fn add_vendor(&self, vendor: Vendor) -> Result<Vendor, DbError> {
        // Vendor ids are operator-assigned, so the key stays in the payload.
        self.insert("vendors", &vendor, None).await
    }

    async fn update_vendor(&self, vendor: &Vendor) -> bool {
        self.update("vendors", ("vendor_id", &vendor.vendor_id), vendor)
            .await
    }

    async fn delete_vendor(&self, vendor_id: &str) -> bool {
        self.delete("vendors", ("vendor_id", vendor_id)).await
    }

    async fn get_transactions(&self) -> Vec<ChequeTransaction> {
        self.select_or_empty(
            "cheque_transactions",
            &[("select", "*"), ("order", "transaction_id.desc")],
        )
        .await
    }

    async fn get_transaction_by_id(&self, transaction_id: i32) -> Option<ChequeTransaction> {
        self.select_one(
            "cheque_transactions",
            ("transaction_id", &transaction_id.to_string()),
        )
        .await
    }

    async fn get_transactions_by_customer(&self, customer_id: i32) -> Vec<ChequeTransaction> {
        let filter = format!("eq.{customer_id}");
        self.select_or_empty(
            "cheque_transactions",
            &[
                ("select", "*"),
                ("customer_id", filter.as_str()),
                ("order", "transaction_id.desc"),
            ],
        )
        .await
    }

    async fn get_transactions_by_vendor(&self, vendor_id: &str) -> Vec<ChequeTransaction> {
        let filter = format!("eq.{vendor_id}");
        self.select_or_empty(
            "cheque_transactions",
            &[
                ("select", "*"),
                ("vendor_id", filter.as_str()),
                ("order", "transaction_id.desc"),
            ],
        )
        .await
    }

    async fn add_transaction(
        &self,
        transaction: ChequeTransaction,
    ) -> Result<ChequeTransaction, DbError> {
        self.insert("cheque_transactions", &transaction, Some("transaction_id"))
            .await
    }

    async fn update_transaction(&self, transaction: &ChequeTransaction) -> bool {
        self.update(
            "cheque_transactions",
            ("transaction_id", &transaction.transaction_id.to_string()),
            transaction,
        )
        .await
    }

    async fn delete_transaction(&self, transaction_id: i32) -> bool {
        self.delete(
            "cheque_transactions",
            ("transaction_id", &transaction_id.to_string()),
        )
        .await
    }

    async fn get_customer_deposits(&self, customer_id: i32) -> Vec<CustomerDeposit> {
        let filter = format!("eq.{customer_id}");
        self.select_or_empty(
            "customer_deposits",
            &[
                ("select", "*"),
                ("customer_id", filter.as_str()),
                ("order", "deposit_id"),
            ],
        )
        .await
    }

    async fn add_customer_deposit(
        &self,
        deposit: CustomerDeposit,
    ) -> Result<CustomerDeposit, DbError> {
        self.insert("customer_deposits", &deposit, Some("deposit_id"))
            .await
    }

    async fn get_vendor_payments(&self, vendor_id: &str) -> Vec<VendorPayment> {
        let filter = format!("eq.{vendor_id}");
        self.select_or_empty(
            "vendor_payments",
            &[
                ("select", "*"),
                ("vendor_id", filter.as_str()),
                ("order", "payment_id"),
            ],
        )
        .await
    }

    async fn add_vendor_payment(&self, payment: VendorPayment) -> Result<VendorPayment, DbError> {
        self.insert("vendor_payments", &payment, Some("payment_id"))
            .await
    }

    async fn get_profit_withdrawals(&self) -> Vec<ProfitWithdrawal> {
        self.select_or_empty(
            "profit_withdrawals",
            &[("select", "*"), ("order", "withdrawal_id")],
        )
        .await
    }

    async fn add_profit_withdrawal(
        &self,
        withdrawal: ProfitWithdrawal,
    ) -> Result<ProfitWithdrawal, DbError> {
        self.insert("profit_withdrawals", &withdrawal, Some("withdrawal_id"))
            .await
    }

    async fn get_deposit_allocations(&self, deposit_id: i32) -> Vec<CustomerDepositAllocation> {
        let filter = format!("eq.{deposit_id}");
        self.select_or_empty(
            "customer_deposit_allocations",
            &[("select", "*"), ("deposit_id", filter.as_str())],
        )
        .await
    }

    async fn add_deposit_allocation(
        &self,
        allocation: CustomerDepositAllocation,
    ) -> Result<CustomerDepositAllocation, DbError> {
        let parent = self
            .parent_amount("customer_deposits", "deposit_id", allocation.deposit_id)
            .await?;
        let existing = self
            .get_deposit_allocations(allocation.deposit_id)
            .await
            .into_iter()
            .map(|allocation| allocation.amount);
        if !allocation_fits(parent, existing, allocation.amount) {
            return Err(DbError::OverAllocated);
        }
        self.insert(
            "customer_deposit_allocations",
            &allocation,
            Some("allocation_id"),
        )
        .await
    }

    async fn get_payment_allocations(&self, payment_id: i32) -> Vec<VendorPaymentAllocation> {
        let filter = format!("eq.{payment_id}");
        self.select_or_empty(
            "vendor_payment_allocations",
            &[("select", "*"), ("payment_id", filter.as_str())],
        )
        .await
    }

    async fn add_payment_allocation(
        &self,
        allocation: VendorPaymentAllocation,
    ) -> Result<VendorPaymentAllocation, DbError> {
        let parent = self
            .parent_amount("vendor_payments", "payment_id", allocation.payment_id)
            .await?;
        let existing = self
            .get_payment_allocations(allocation.payment_id)
            .await
            .into_iter()
            .map(|allocation| allocation.amount);
        if !allocation_fits(parent, existing, allocation.amount) {
            return Err(DbError::OverAllocated);
        }
        self.insert(
            "vendor_payment_allocations",
            &allocation,
            Some("allocation_id"),
        )
        .await
    }

    async fn get_withdrawal_allocations(
        &self,
        withdrawal_id: i32,
    ) -> Vec<ProfitWithdrawalAllocation> {
        let filter = format!("eq.{withdrawal_id}");
        self.select_or_empty(
            "profit_withdrawal_allocations",
            &[("select", "*"), ("withdrawal_id", filter.as_str())],
        )
        .await
    }

    async fn add_withdrawal_allocation(
        &self,
        allocation: ProfitWithdrawalAllocation,
    ) -> Result<ProfitWithdrawalAllocation, DbError> {
        let parent = self
            .parent_amount(
                "profit_withdrawals",
                "withdrawal_id",
                allocation.withdrawal_id,
            )
            .await?;
        let existing = self
            .get_withdrawal_allocations(allocation.withdrawal_id)
            .await
            .into_iter()
            .map(|allocation| allocation.amount);
        if !allocation_fits(parent, existing, allocation.amount) {
            return Err(DbError::OverAllocated);
        }
        self.insert(
            "profit_withdrawal_allocations",
            &allocation,
            Some("allocation_id"),
        )
        .await
    }
}
