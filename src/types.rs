use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single cashed-cheque record linking a customer (payee) and a vendor
/// (cheque issuer). Amount fields are decimals, never floats, so running
/// totals stay exact. Field names match the backend column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChequeTransaction {
    #[serde(default)]
    pub transaction_id: i32,
    pub date: NaiveDate,
    pub customer_id: i32,
    pub vendor_id: String,
    pub cheque_number: String,
    pub cheque_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_payable_to_customer: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_to_receive_from_vendor: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<Decimal>,
    #[serde(default)]
    pub paid_to_customer: Decimal,
    #[serde(default)]
    pub received_from_vendor: Decimal,
    #[serde(default)]
    pub profit_withdrawn: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChequeTransaction {
    pub fn new(date: NaiveDate, customer_id: i32, vendor_id: String) -> Self {
        Self {
            transaction_id: 0,
            date,
            customer_id,
            vendor_id,
            cheque_number: String::new(),
            cheque_amount: Decimal::ZERO,
            customer_fee: None,
            net_payable_to_customer: None,
            vendor_fee: None,
            amount_to_receive_from_vendor: None,
            profit: None,
            paid_to_customer: Decimal::ZERO,
            received_from_vendor: Decimal::ZERO,
            profit_withdrawn: Decimal::ZERO,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn blank() -> Self {
        Self::new(Utc::now().date_naive(), 0, String::new())
    }

    /// Fill the computed fee columns from the parties' fee percentages.
    /// `profit` is what the vendor side pays us beyond what we pay out.
    pub fn compute_fees(&mut self, customer_pct: Decimal, vendor_pct: Decimal) {
        let hundred = Decimal::from(100);
        let customer_fee = (self.cheque_amount * customer_pct / hundred).round_dp(2);
        let vendor_fee = (self.cheque_amount * vendor_pct / hundred).round_dp(2);
        let net_payable = self.cheque_amount - customer_fee;
        let to_receive = self.cheque_amount - vendor_fee;

        self.customer_fee = Some(customer_fee);
        self.net_payable_to_customer = Some(net_payable);
        self.vendor_fee = Some(vendor_fee);
        self.amount_to_receive_from_vendor = Some(to_receive);
        self.profit = Some(to_receive - net_payable);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub customer_id: i32,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    pub fee_percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub vendor_id: String,
    pub vendor_name: String,
    pub fee_percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDeposit {
    #[serde(default)]
    pub deposit_id: i32,
    pub customer_id: i32,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub fully_allocated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorPayment {
    #[serde(default)]
    pub payment_id: i32,
    pub vendor_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub fully_allocated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitWithdrawal {
    #[serde(default)]
    pub withdrawal_id: i32,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub fully_allocated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial linkage of a deposit to one or more transactions it settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDepositAllocation {
    #[serde(default)]
    pub allocation_id: i32,
    pub deposit_id: i32,
    pub transaction_id: i32,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorPaymentAllocation {
    #[serde(default)]
    pub allocation_id: i32,
    pub payment_id: i32,
    pub transaction_id: i32,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitWithdrawalAllocation {
    #[serde(default)]
    pub allocation_id: i32,
    pub withdrawal_id: i32,
    pub transaction_id: i32,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Allocations against one parent may never commit more than the parent's
/// amount, and a zero or negative slice is meaningless.
pub fn allocation_fits(
    parent_amount: Decimal,
    existing: impl IntoIterator<Item = Decimal>,
    requested: Decimal,
) -> bool {
    let committed: Decimal = existing.into_iter().sum();
    requested > Decimal::ZERO && committed + requested <= parent_amount
}

/// What the extraction prompts ask the model to emit: camelCase keys, every
/// field optional because the model only fills in what it can see.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(default)]
    pub customer_id: Option<i32>,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub cheque_number: Option<String>,
    #[serde(default)]
    pub cheque_amount: Option<Decimal>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl TransactionDraft {
    /// Defaults mirror the extraction prompt: customer 1 and vendor "VND1"
    /// when the cheque does not show them, today's date when absent.
    pub fn into_transaction(self) -> ChequeTransaction {
        let mut transaction = ChequeTransaction::new(
            self.date.unwrap_or_else(|| Utc::now().date_naive()),
            self.customer_id.unwrap_or(1),
            self.vendor_id.unwrap_or_else(|| "VND1".to_owned()),
        );
        transaction.cheque_number = self.cheque_number.unwrap_or_default();
        transaction.cheque_amount = self.cheque_amount.unwrap_or(Decimal::ZERO);
        transaction
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn fee_computation_is_exact() {
        let mut transaction = ChequeTransaction::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            1,
            "VND1".to_owned(),
        );
        transaction.cheque_amount = dec!(1000.00);
        transaction.compute_fees(dec!(2.5), dec!(1.0));

        assert_eq!(transaction.customer_fee, Some(dec!(25.000)));
        assert_eq!(transaction.net_payable_to_customer, Some(dec!(975.000)));
        assert_eq!(transaction.vendor_fee, Some(dec!(10.000)));
        assert_eq!(
            transaction.amount_to_receive_from_vendor,
            Some(dec!(990.000))
        );
        assert_eq!(transaction.profit, Some(dec!(15.000)));
    }

    #[test]
    fn draft_fills_prompt_defaults() {
        let draft: TransactionDraft =
            serde_json::from_str(r#"{"chequeNumber":"CHQ-77","chequeAmount":125.50}"#).unwrap();
        let transaction = draft.into_transaction();

        assert_eq!(transaction.customer_id, 1);
        assert_eq!(transaction.vendor_id, "VND1");
        assert_eq!(transaction.cheque_number, "CHQ-77");
        assert_eq!(transaction.cheque_amount, dec!(125.50));
    }

    #[test]
    fn draft_keeps_explicit_fields() {
        let draft: TransactionDraft = serde_json::from_str(
            r#"{"customerId":7,"vendorId":"VND9","chequeNumber":"1001","chequeAmount":"420.00","date":"2024-06-15"}"#,
        )
        .unwrap();
        let transaction = draft.into_transaction();

        assert_eq!(transaction.customer_id, 7);
        assert_eq!(transaction.vendor_id, "VND9");
        assert_eq!(transaction.cheque_amount, dec!(420.00));
        assert_eq!(
            transaction.date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
    }

    #[test]
    fn allocation_cannot_exceed_parent() {
        let existing = vec![dec!(40.00), dec!(35.00)];
        assert!(allocation_fits(dec!(100.00), existing.clone(), dec!(25.00)));
        assert!(!allocation_fits(dec!(100.00), existing.clone(), dec!(25.01)));
        assert!(!allocation_fits(dec!(100.00), existing, dec!(0)));
    }
}
