use std::fmt;

use chrono::NaiveDate;
use invoice_types::Party;
use serde::{Deserialize, Serialize};

/// Descriptive invoice attributes plus the signed amount.
///
/// Everything except `financial_transaction_amount` is opaque pass-through
/// data; the verifier never looks at it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub pay_term_description: String,
    pub currency_code: String,
    pub transaction_type: String,
    pub policy_number: u64,
    pub coverage_code: u32,
    pub coverage_name: String,
    pub policy_event_type: String,
    pub installment_due_date: NaiveDate,
    pub invoice_number: u64,
    pub invoice_line_number: u32,
    pub financial_transaction_code: String,
    /// Must be strictly positive for issuance; enforced by the verifier,
    /// not at construction.
    pub financial_transaction_amount: i64,
    pub ap_status: String,
    pub payee_id: String,
    pub payee_name: String,
    pub invoice_transaction_id: String,
}

/// One invoice obligation between an issuer and an owner.
///
/// Immutable once constructed: every field is private and exposed through a
/// getter. A change to an invoice is expressed by consuming this state in a
/// transaction and producing a new one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceState {
    issuer: Party,
    owner: Party,
    fields: InvoiceFields,
}

impl InvoiceState {
    pub fn new(issuer: Party, owner: Party, fields: InvoiceFields) -> Self {
        Self {
            issuer,
            owner,
            fields,
        }
    }

    pub fn issuer(&self) -> &Party {
        &self.issuer
    }

    pub fn owner(&self) -> &Party {
        &self.owner
    }

    /// Parties with standing in this state: issuer first, then owner.
    pub fn participants(&self) -> [&Party; 2] {
        [&self.issuer, &self.owner]
    }

    pub fn fields(&self) -> &InvoiceFields {
        &self.fields
    }

    pub fn pay_term_description(&self) -> &str {
        &self.fields.pay_term_description
    }

    pub fn currency_code(&self) -> &str {
        &self.fields.currency_code
    }

    pub fn transaction_type(&self) -> &str {
        &self.fields.transaction_type
    }

    pub fn policy_number(&self) -> u64 {
        self.fields.policy_number
    }

    pub fn coverage_code(&self) -> u32 {
        self.fields.coverage_code
    }

    pub fn coverage_name(&self) -> &str {
        &self.fields.coverage_name
    }

    pub fn policy_event_type(&self) -> &str {
        &self.fields.policy_event_type
    }

    pub fn installment_due_date(&self) -> NaiveDate {
        self.fields.installment_due_date
    }

    pub fn invoice_number(&self) -> u64 {
        self.fields.invoice_number
    }

    pub fn invoice_line_number(&self) -> u32 {
        self.fields.invoice_line_number
    }

    pub fn financial_transaction_code(&self) -> &str {
        &self.fields.financial_transaction_code
    }

    pub fn financial_transaction_amount(&self) -> i64 {
        self.fields.financial_transaction_amount
    }

    pub fn ap_status(&self) -> &str {
        &self.fields.ap_status
    }

    pub fn payee_id(&self) -> &str {
        &self.fields.payee_id
    }

    pub fn payee_name(&self) -> &str {
        &self.fields.payee_name
    }

    pub fn invoice_transaction_id(&self) -> &str {
        &self.fields.invoice_transaction_id
    }
}

impl fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invoice #{}/{} {} {} {} -> {}",
            self.fields.invoice_number,
            self.fields.invoice_line_number,
            self.fields.financial_transaction_amount,
            self.fields.currency_code,
            self.issuer,
            self.owner,
        )
    }
}
