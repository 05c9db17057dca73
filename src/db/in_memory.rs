use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI32, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::DbError,
    types::{
        ChequeTransaction, Customer, CustomerDeposit, CustomerDepositAllocation, ProfitWithdrawal,
        ProfitWithdrawalAllocation, Vendor, VendorPayment, VendorPaymentAllocation,
        allocation_fits,
    },
};

use super::Database;

/// Process-local store with the same call shapes as the REST-backed one.
/// Serves tests and runs the service when Supabase credentials are absent.
#[derive(Debug, Default)]
pub struct InMemoryDb {
    customers: Arc<RwLock<HashMap<i32, Customer>>>,
    vendors: Arc<RwLock<HashMap<String, Vendor>>>,
    transactions: Arc<RwLock<HashMap<i32, ChequeTransaction>>>,
    deposits: Arc<RwLock<HashMap<i32, CustomerDeposit>>>,
    payments: Arc<RwLock<HashMap<i32, VendorPayment>>>,
    withdrawals: Arc<RwLock<HashMap<i32, ProfitWithdrawal>>>,
    deposit_allocations: Arc<RwLock<Vec<CustomerDepositAllocation>>>,
    payment_allocations: Arc<RwLock<Vec<VendorPaymentAllocation>>>,
    withdrawal_allocations: Arc<RwLock<Vec<ProfitWithdrawalAllocation>>>,
    next_id: AtomicI32,
}

impl InMemoryDb {
    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl Database for InMemoryDb {
    async fn initialize(&self, _api_url: &str, _api_key: &str) -> bool {
        true
    }

    async fn get_customers(&self) -> Vec<Customer> {
        let mut customers: Vec<_> = self.customers.read().await.values().cloned().collect();
        customers.sort_by_key(|customer| customer.customer_id);
        customers
    }

    async fn get_customer_by_id(&self, customer_id: i32) -> Option<Customer> {
        self.customers.read().await.get(&customer_id).cloned()
    }

    async fn add_customer(&self, mut customer: Customer) -> Result<Customer, DbError> {
        customer.customer_id = self.next_id();
        customer.created_at = Some(Utc::now());
        customer.updated_at = customer.created_at;
        self.customers
            .write()
            .await
            .insert(customer.customer_id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(&self, customer: &Customer) -> bool {
        let mut customers = self.customers.write().await;
        match customers.get_mut(&customer.customer_id) {
            Some(existing) => {
                *existing = Customer {
                    updated_at: Some(Utc::now()),
                    ..customer.clone()
                };
                true
            }
            None => false,
        }
    }

    async fn delete_customer(&self, customer_id: i32) -> bool {
        self.customers.write().await.remove(&customer_id).is_some()
    }

    async fn get_vendors(&self) -> Vec<Vendor> {
        let mut vendors: Vec<_> = self.vendors.read().await.values().cloned().collect();
        vendors.sort_by(|a, b| a.vendor_id.cmp(&b.vendor_id));
        vendors
    }

    async fn get_vendor_by_id(&self, vendor_id: &str) -> Option<Vendor> {
        self.vendors.read().await.get(vendor_id).cloned()
    }

    async fn add_vendor(&self, mut vendor: Vendor) -> Result<Vendor, DbError> {
        vendor.created_at = Some(Utc::now());
        vendor.updated_at = vendor.created_at;
        self.vendors
            .write()
            .await
            .insert(vendor.vendor_id.clone(), vendor.clone());
        Ok(vendor)
    }

    async fn update_vendor(&self, vendor: &Vendor) -> bool {
        let mut vendors = self.vendors.write().await;
        match vendors.get_mut(&vendor.vendor_id) {
            Some(existing) => {
                *existing = Vendor {
                    updated_at: Some(Utc::now()),
                    ..vendor.clone()
                };
                true
            }
            None => false,
        }
    }

    async fn delete_vendor(&self, vendor_id: &str) -> bool {
        self.vendors.write().await.remove(vendor_id).is_some()
    }

    async fn get_transactions(&self) -> Vec<ChequeTransaction> {
        let mut transactions: Vec<_> =
            self.transactions.read().await.values().cloned().collect();
        // Most recent first, matching the REST backend's ordering.
        transactions.sort_by_key(|transaction| std::cmp::Reverse(transaction.transaction_id));
        transactions
    }

    async fn get_transaction_by_id(&self, transaction_id: i32) -> Option<ChequeTransaction> {
        self.transactions.read().await.get(&transaction_id).cloned()
    }

    async fn get_transactions_by_customer(&self, customer_id: i32) -> Vec<ChequeTransaction> {
        self.get_transactions()
            .await
            .into_iter()
            .filter(|transaction| transaction.customer_id == customer_id)
            .collect()
    }

    async fn get_transactions_by_vendor(&self, vendor_id: &str) -> Vec<ChequeTransaction> {
        self.get_transactions()
            .await
            .into_iter()
            .filter(|transaction| transaction.vendor_id == vendor_id)
            .collect()
    }

    async fn add_transaction(
        &self,
        mut transaction: ChequeTransaction,
    ) -> Result<ChequeTransaction, DbError> {
        transaction.transaction_id = self.next_id();
        transaction.created_at = Some(Utc::now());
        transaction.updated_at = transaction.created_at;
        self.transactions
            .write()
            .await
            .insert(transaction.transaction_id, transaction.clone());
        Ok(transaction)
    }

    async fn update_transaction(&self, transaction: &ChequeTransaction) -> bool {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(&transaction.transaction_id) {
            Some(existing) => {
                *existing = ChequeTransaction {
                    updated_at: Some(Utc::now()),
                    ..transaction.clone()
                };
                true
            }
            None => false,
        }
    }

    async fn delete_transaction(&self, transaction_id: i32) -> bool {
        self.transactions
            .write()
            .await
            .remove(&transaction_id)
            .is_some()
    }

    async fn get_customer_deposits(&self, customer_id: i32) -> Vec<CustomerDeposit> {
        let mut deposits: Vec<_> = self
            .deposits
            .read()
            .await
            .values()
            .filter(|deposit| deposit.customer_id == customer_id)
            .cloned()
            .collect();
        deposits.sort_by_key(|deposit| deposit.deposit_id);
        deposits
    }

    async fn add_customer_deposit(
        &self,
        mut deposit: CustomerDeposit,
    ) -> Result<CustomerDeposit, DbError> {
        deposit.deposit_id = self.next_id();
        deposit.created_at = Some(Utc::now());
        deposit.updated_at = deposit.created_at;
        self.deposits
            .write()
            .await
            .insert(deposit.deposit_id, deposit.clone());
        Ok(deposit)
    }

    async fn get_vendor_payments(&self, vendor_id: &str) -> Vec<VendorPayment> {
        let mut payments: Vec<_> = self
            .payments
            .read()
            .await
            .values()
            .filter(|payment| payment.vendor_id == vendor_id)
            .cloned()
            .collect();
        payments.sort_by_key(|payment| payment.payment_id);
        payments
    }

    async fn add_vendor_payment(
        &self,
        mut payment: VendorPayment,
    ) -> Result<VendorPayment, DbError> {
        payment.payment_id = self.next_id();
        payment.created_at = Some(Utc::now());
        payment.updated_at = payment.created_at;
        self.payments
            .write()
            .await
            .insert(payment.payment_id, payment.clone());
        Ok(payment)
    }

    async fn get_profit_withdrawals(&self) -> Vec<ProfitWithdrawal> {
        let mut withdrawals: Vec<_> = self.withdrawals.read().await.values().cloned().collect();
        withdrawals.sort_by_key(|withdrawal| withdrawal.withdrawal_id);
        withdrawals
    }

    async fn add_profit_withdrawal(
        &self,
        mut withdrawal: ProfitWithdrawal,
    ) -> Result<ProfitWithdrawal, DbError> {
        withdrawal.withdrawal_id = self.next_id();
        withdrawal.created_at = Some(Utc::now());
        withdrawal.updated_at = withdrawal.created_at;
        self.withdrawals
            .write()
            .await
            .insert(withdrawal.withdrawal_id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn get_deposit_allocations(&self, deposit_id: i32) -> Vec<CustomerDepositAllocation> {
        self.deposit_allocations
            .read()
            .await
            .iter()
            .filter(|allocation| allocation.deposit_id == deposit_id)
            .cloned()
            .collect()
    }

    async fn add_deposit_allocation(
        &self,
        mut allocation: CustomerDepositAllocation,
    ) -> Result<CustomerDepositAllocation, DbError> {
        let parent = self
            .deposits
            .read()
            .await
            .get(&allocation.deposit_id)
            .cloned()
            .ok_or(DbError::NotFound {
                key: format!("deposit_id={}", allocation.deposit_id),
            })?;
        let existing = self
            .get_deposit_allocations(allocation.deposit_id)
            .await
            .into_iter()
            .map(|allocation| allocation.amount);
        if !allocation_fits(parent.amount, existing, allocation.amount) {
            return Err(DbError::OverAllocated);
        }

        allocation.allocation_id = self.next_id();
        allocation.created_at = Some(Utc::now());
        self.deposit_allocations
            .write()
            .await
            .push(allocation.clone());
        Ok(allocation)
    }

    async fn get_payment_allocations(&self, payment_id: i32) -> Vec<VendorPaymentAllocation> {
        self.payment_allocations
            .read()
            .await
            .iter()
            .filter(|allocation| allocation.payment_id == payment_id)
            .cloned()
            .collect()
    }

    async fn add_payment_allocation(
        &self,
        mut allocation: VendorPaymentAllocation,
    ) -> Result<VendorPaymentAllocation, DbError> {
        let parent = self
            .payments
            .read()
            .await
            .get(&allocation.payment_id)
            .cloned()
            .ok_or(DbError::NotFound {
                key: format!("payment_id={}", allocation.payment_id),
            })?;
        let existing = self
            .get_payment_allocations(allocation.payment_id)
            .await
            .into_iter()
            .map(|allocation| allocation.amount);
        if !allocation_fits(parent.amount, existing, allocation.amount) {
            return Err(DbError::OverAllocated);
        }

        allocation.allocation_id = self.next_id();
        allocation.created_at = Some(Utc::now());
        self.payment_allocations
            .write()
            .await
            .push(allocation.clone());
        Ok(allocation)
    }

    async fn get_withdrawal_allocations(
        &self,
        withdrawal_id: i32,
    ) -> Vec<ProfitWithdrawalAllocation> {
        self.withdrawal_allocations
            .read()
            .await
            .iter()
            .filter(|allocation| allocation.withdrawal_id == withdrawal_id)
            .cloned()
            .collect()
    }

    async fn add_withdrawal_allocation(
        &self,
        mut allocation: ProfitWithdrawalAllocation,
    ) -> Result<ProfitWithdrawalAllocation, DbError> {
        let parent = self
            .withdrawals
            .read()
            .await
            .get(&allocation.withdrawal_id)
            .cloned()
            .ok_or(DbError::NotFound {
                key: format!("withdrawal_id={}", allocation.withdrawal_id),
            })?;
        let existing = self
            .get_withdrawal_allocations(allocation.withdrawal_id)
            .await
            .into_iter()
            .map(|allocation| allocation.amount);
        if !allocation_fits(parent.amount, existing, allocation.amount) {
            return Err(DbError::OverAllocated);
        }

        allocation.allocation_id = self.next_id();
        allocation.created_at = Some(Utc::now());
        self.withdrawal_allocations
            .write()
            .await
            .push(allocation.clone());
        Ok(allocation)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;

    fn customer(name: &str) -> Customer {
        Customer {
            customer_id: 0,
            customer_name: name.to_owned(),
            contact_info: None,
            fee_percentage: dec!(2.5),
            created_at: None,
            updated_at: None,
        }
    }

    fn payment(vendor_id: &str, amount: rust_decimal::Decimal) -> VendorPayment {
        VendorPayment {
            payment_id: 0,
            vendor_id: vendor_id.to_owned(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            amount,
            notes: None,
            fully_allocated: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn customer_crud_round_trip() {
        let db = InMemoryDb::default();

        let saved = db.add_customer(customer("Alice")).await.unwrap();
        assert!(saved.customer_id > 0);
        assert!(saved.created_at.is_some());

        let mut renamed = saved.clone();
        renamed.customer_name = "Alice B".to_owned();
        assert!(db.update_customer(&renamed).await);
        assert_eq!(
            db.get_customer_by_id(saved.customer_id)
                .await
                .unwrap()
                .customer_name,
            "Alice B"
        );

        assert!(db.delete_customer(saved.customer_id).await);
        assert!(db.get_customer_by_id(saved.customer_id).await.is_none());
    }

    #[tokio::test]
    async fn delete_without_match_reports_false() {
        let db = InMemoryDb::default();
        assert!(!db.delete_customer(404).await);
        assert!(!db.delete_transaction(404).await);
        assert!(!db.delete_vendor("VND404").await);
    }

    #[tokio::test]
    async fn transactions_list_most_recent_first() {
        let db = InMemoryDb::default();
        for n in 1..=3 {
            let mut transaction = ChequeTransaction::blank();
            transaction.customer_id = 1;
            transaction.vendor_id = "VND1".to_owned();
            transaction.cheque_number = format!("CHQ-{n}");
            db.add_transaction(transaction).await.unwrap();
        }

        let listed = db.get_transactions().await;
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].cheque_number, "CHQ-3");
        assert_eq!(listed[2].cheque_number, "CHQ-1");
    }

    #[tokio::test]
    async fn allocations_respect_parent_amount() {
        let db = InMemoryDb::default();
        let saved = db
            .add_vendor_payment(payment("VND1", dec!(100.00)))
            .await
            .unwrap();

        let allocation = |amount| VendorPaymentAllocation {
            allocation_id: 0,
            payment_id: saved.payment_id,
            transaction_id: 1,
            amount,
            created_at: None,
        };

        db.add_payment_allocation(allocation(dec!(60.00)))
            .await
            .unwrap();
        db.add_payment_allocation(allocation(dec!(40.00)))
            .await
            .unwrap();
        let over = db.add_payment_allocation(allocation(dec!(0.01))).await;
        assert!(matches!(over, Err(DbError::OverAllocated)));
    }

    #[tokio::test]
    async fn allocation_against_missing_parent_fails() {
        let db = InMemoryDb::default();
        let result = db
            .add_deposit_allocation(CustomerDepositAllocation {
                allocation_id: 0,
                deposit_id: 99,
                transaction_id: 1,
                amount: dec!(10.00),
                created_at: None,
            })
            .await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }
}
