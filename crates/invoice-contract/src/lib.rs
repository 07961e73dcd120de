//! Invoice ledger records and the stateless transaction verifier.
//!
//! An invoice is created by a transaction with no inputs, one
//! [`InvoiceState`] output and one `Issue` command that both the issuer and
//! the owner must sign. [`TransactionBuilder`] assembles such a transaction
//! without checking it; [`verify_transaction`] decides whether it is
//! admissible and names the first rule it breaks.
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use invoice_contract::{verify_transaction, InvoiceFields, RejectionReason, TransactionBuilder};
//! use invoice_types::{Party, PartyKey};
//!
//! let alice = Party::new("Alice", PartyKey::from_bytes([1; 32])).unwrap();
//! let bob = Party::new("Bob", PartyKey::from_bytes([2; 32])).unwrap();
//! let notary = Party::new("Notary", PartyKey::from_bytes([9; 32])).unwrap();
//!
//! let fields = InvoiceFields {
//!     pay_term_description: "NET30".into(),
//!     currency_code: "INR".into(),
//!     transaction_type: "CASH".into(),
//!     policy_number: 12345,
//!     coverage_code: 1,
//!     coverage_name: "CN".into(),
//!     policy_event_type: "BASE".into(),
//!     installment_due_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!     invoice_number: 123,
//!     invoice_line_number: 1,
//!     financial_transaction_code: "ABC".into(),
//!     financial_transaction_amount: 0,
//!     ap_status: "Pass".into(),
//!     payee_id: "abc".into(),
//!     payee_name: "ABC".into(),
//!     invoice_transaction_id: "ABC123".into(),
//! };
//!
//! let tx = TransactionBuilder::issuance(alice, bob, notary, fields);
//! assert_eq!(
//!     verify_transaction(&tx),
//!     Err(RejectionReason::NonPositiveAmount { amount: 0 })
//! );
//! ```

pub mod builder;
pub mod command;
pub mod contract;
pub mod error;
pub mod state;
pub mod transaction;

pub use builder::TransactionBuilder;
pub use command::{Command, CommandData, InvoiceCommand};
pub use contract::{verify_transaction, Contract, InvoiceContract};
pub use error::{RejectionReason, SignerRole, TransactionError};
pub use state::{InvoiceFields, InvoiceState};
pub use transaction::{
    FinalizedTransaction, ProposedTransaction, SignedTransaction, StateAndRef, StateData,
    TransactionState,
};
