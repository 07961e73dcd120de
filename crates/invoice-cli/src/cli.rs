use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use invoice_contract::InvoiceFields;

#[derive(Parser)]
#[command(
    name = "ivl",
    about = "Invoice ledger: issue and verify invoice records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Network description (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Issue an invoice to a peer and print the finalized transaction
    Issue(IssueArgs),
    /// Build an issuance and print the verifier's verdict
    Verify(VerifyArgs),
    /// List the parties and notary of the network
    Parties(PartiesArgs),
}

#[derive(Args)]
pub struct IssueArgs {
    /// Party that will own the invoice
    #[arg(long)]
    pub owner: String,
    #[command(flatten)]
    pub invoice: InvoiceArgs,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Issuing party; the local party when omitted
    #[arg(long)]
    pub issuer: Option<String>,
    #[arg(long)]
    pub owner: String,
    #[command(flatten)]
    pub invoice: InvoiceArgs,
}

#[derive(Args)]
pub struct PartiesArgs {}

#[derive(Args)]
pub struct InvoiceArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub amount: i64,
    #[arg(long, default_value = "INR")]
    pub currency: String,
    #[arg(long, default_value_t = 1)]
    pub invoice_number: u64,
    #[arg(long, default_value_t = 1)]
    pub line: u32,
    #[arg(long, default_value = "2024-03-31")]
    pub due_date: NaiveDate,
    #[arg(long, default_value_t = 0)]
    pub policy_number: u64,
    #[arg(long, default_value_t = 0)]
    pub coverage_code: u32,
    #[arg(long, default_value = "")]
    pub coverage_name: String,
    #[arg(long, default_value = "")]
    pub pay_term: String,
    #[arg(long, default_value = "CASH")]
    pub transaction_type: String,
    #[arg(long, default_value = "BASE")]
    pub policy_event_type: String,
    #[arg(long, default_value = "")]
    pub transaction_code: String,
    #[arg(long, default_value = "Pass")]
    pub ap_status: String,
    #[arg(long, default_value = "")]
    pub payee_id: String,
    #[arg(long, default_value = "")]
    pub payee_name: String,
    #[arg(long, default_value = "")]
    pub invoice_transaction_id: String,
}

impl InvoiceArgs {
    pub fn to_fields(&self) -> InvoiceFields {
        InvoiceFields {
            pay_term_description: self.pay_term.clone(),
            currency_code: self.currency.clone(),
            transaction_type: self.transaction_type.clone(),
            policy_number: self.policy_number,
            coverage_code: self.coverage_code,
            coverage_name: self.coverage_name.clone(),
            policy_event_type: self.policy_event_type.clone(),
            installment_due_date: self.due_date,
            invoice_number: self.invoice_number,
            invoice_line_number: self.line,
            financial_transaction_code: self.transaction_code.clone(),
            financial_transaction_amount: self.amount,
            ap_status: self.ap_status.clone(),
            payee_id: self.payee_id.clone(),
            payee_name: self.payee_name.clone(),
            invoice_transaction_id: self.invoice_transaction_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_issue() {
        let cli = Cli::try_parse_from(["ivl", "issue", "--owner", "PartyB", "--amount", "99"]).unwrap();
        if let Command::Issue(args) = cli.command {
            assert_eq!(args.owner, "PartyB");
            let fields = args.invoice.to_fields();
            assert_eq!(fields.financial_transaction_amount, 99);
            assert_eq!(fields.currency_code, "INR");
            assert_eq!(
                fields.installment_due_date,
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
            );
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_issue_requires_owner() {
        assert!(Cli::try_parse_from(["ivl", "issue", "--amount", "5"]).is_err());
    }

    #[test]
    fn parse_verify_negative_amount() {
        let cli = Cli::try_parse_from([
            "ivl", "verify", "--owner", "PartyB", "--amount", "-5", "--invoice-number", "7",
        ])
        .unwrap();
        if let Command::Verify(args) = cli.command {
            assert!(args.issuer.is_none());
            assert_eq!(args.invoice.amount, -5);
            assert_eq!(args.invoice.invoice_number, 7);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_bad_due_date() {
        let parsed = Cli::try_parse_from([
            "ivl", "issue", "--owner", "PartyB", "--amount", "1", "--due-date", "31/03/2024",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_parties() {
        let cli = Cli::try_parse_from(["ivl", "parties"]).unwrap();
        assert!(matches!(cli.command, Command::Parties(_)));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "ivl", "--verbose", "--config", "net.toml", "--format", "json", "parties",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("net.toml")));
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
