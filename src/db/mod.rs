mod in_memory;
mod supabase;

use async_trait::async_trait;

use crate::{
    error::DbError,
    types::{
        ChequeTransaction, Customer, CustomerDeposit, CustomerDepositAllocation, ProfitWithdrawal,
        ProfitWithdrawalAllocation, Vendor, VendorPayment, VendorPaymentAllocation,
    },
};

pub use in_memory::InMemoryDb;
pub use supabase::SupabaseDb;

/// CRUD capability over the ledger's backing store. Call shapes follow the
/// application's degrade policy: list calls come back empty on failure,
/// single-row calls come back `None`, update/delete report a plain success
/// flag, and only inserts surface their error.
#[async_trait]
pub trait Database: Send + Sync {
    /// Stores credentials and probes the backend. `false` on any probe
    /// failure; every accessor degrades until a probe has succeeded.
    async fn initialize(&self, api_url: &str, api_key: &str) -> bool;

    // Customers
    async fn get_customers(&self) -> Vec<Customer>;
    async fn get_customer_by_id(&self, customer_id: i32) -> Option<Customer>;
    async fn add_customer(&self, customer: Customer) -> Result<Customer, DbError>;
    async fn update_customer(&self, customer: &Customer) -> bool;
    async fn delete_customer(&self, customer_id: i32) -> bool;

    // Vendors
    async fn get_vendors(&self) -> Vec<Vendor>;
    async fn get_vendor_by_id(&self, vendor_id: &str) -> Option<Vendor>;
    async fn add_vendor(&self, vendor: Vendor) -> Result<Vendor, DbError>;
    async fn update_vendor(&self, vendor: &Vendor) -> bool;
    async fn delete_vendor(&self, vendor_id: &str) -> bool;

    // Transactions
    async fn get_transactions(&self) -> Vec<ChequeTransaction>;
    async fn get_transaction_by_id(&self, transaction_id: i32) -> Option<ChequeTransaction>;
    async fn get_transactions_by_customer(&self, customer_id: i32) -> Vec<ChequeTransaction>;
    async fn get_transactions_by_vendor(&self, vendor_id: &str) -> Vec<ChequeTransaction>;
    async fn add_transaction(
        &self,
        transaction: ChequeTransaction,
    ) -> Result<ChequeTransaction, DbError>;
    async fn update_transaction(&self, transaction: &ChequeTransaction) -> bool;
    async fn delete_transaction(&self, transaction_id: i32) -> bool;

    // Customer deposits
    async fn get_customer_deposits(&self, customer_id: i32) -> Vec<CustomerDeposit>;
    async fn add_customer_deposit(
        &self,
        deposit: CustomerDeposit,
    ) -> Result<CustomerDeposit, DbError>;

    // Vendor payments
    async fn get_vendor_payments(&self, vendor_id: &str) -> Vec<VendorPayment>;
    async fn add_vendor_payment(&self, payment: VendorPayment) -> Result<VendorPayment, DbError>;

    // Profit withdrawals
    async fn get_profit_withdrawals(&self) -> Vec<ProfitWithdrawal>;
    async fn add_profit_withdrawal(
        &self,
        withdrawal: ProfitWithdrawal,
    ) -> Result<ProfitWithdrawal, DbError>;

    // Settlement allocations. Adds enforce the over-allocation invariant.
    async fn get_deposit_allocations(&self, deposit_id: i32) -> Vec<CustomerDepositAllocation>;
    async fn add_deposit_allocation(
        &self,
        allocation: CustomerDepositAllocation,
    ) -> Result<CustomerDepositAllocation, DbError>;
    async fn get_payment_allocations(&self, payment_id: i32) -> Vec<VendorPaymentAllocation>;
    async fn add_payment_allocation(
        &self,
        allocation: VendorPaymentAllocation,
    ) -> Result<VendorPaymentAllocation, DbError>;
    async fn get_withdrawal_allocations(
        &self,
        withdrawal_id: i32,
    ) -> Vec<ProfitWithdrawalAllocation>;
    async fn add_withdrawal_allocation(
        &self,
        allocation: ProfitWithdrawalAllocation,
    ) -> Result<ProfitWithdrawalAllocation, DbError>;
}
