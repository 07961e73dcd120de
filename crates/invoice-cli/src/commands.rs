use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use invoice_contract::{verify_transaction, FinalizedTransaction, TransactionBuilder};
use invoice_crypto::SigningKey;
use invoice_flow::{
    IdentityService, InMemoryNotary, IssueRequest, MockNetwork, MockNode, ResponderOutcome,
};
use invoice_types::Party;
use tracing::{debug, warn};

use crate::cli::*;
use crate::config::NetworkConfig;

/// A network built from [`NetworkConfig`], with nodes looked up by name.
struct Network {
    mock: MockNetwork,
    local: MockNode,
    peers: BTreeMap<String, MockNode>,
}

impl Network {
    fn build(config: &NetworkConfig) -> anyhow::Result<Self> {
        let key = SigningKey::generate();
        let notary_party = Party::new(config.notary.clone(), key.party_key())?;
        let notary = InMemoryNotary::new(notary_party.clone(), key)?;
        let mock = MockNetwork::with_notary(config.flow.clone(), notary_party, Arc::new(notary))?;
        let local = mock.add_node(&config.local)?;
        let mut peers = BTreeMap::new();
        for name in &config.peers {
            peers.insert(name.clone(), mock.add_node(name)?);
        }
        Ok(Self { mock, local, peers })
    }

    fn node(&self, name: &str) -> anyhow::Result<&MockNode> {
        if self.local.party().name() == name {
            return Ok(&self.local);
        }
        self.peers.get(name).ok_or_else(|| {
            let known: Vec<_> = self.peers.keys().map(String::as_str).collect();
            anyhow::anyhow!("unknown party {name:?} (peers: {})", known.join(", "))
        })
    }

    fn name_of(&self, key: &invoice_types::PartyKey) -> String {
        self.mock
            .identity()
            .party_from_key(key)
            .map(|party| party.name().to_owned())
            .unwrap_or_else(|| key.short_id())
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = NetworkConfig::load(cli.config.as_deref())?;
    let network = Network::build(&config)?;
    match cli.command {
        Command::Issue(args) => cmd_issue(&network, args, cli.format).await,
        Command::Verify(args) => cmd_verify(&network, args, cli.format),
        Command::Parties(_) => cmd_parties(&network, cli.format),
    }
}

async fn cmd_issue(network: &Network, args: IssueArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let owner = network.node(&args.owner)?;
    let handle = network.mock.flow(&network.local).start(IssueRequest {
        owner: owner.party().clone(),
        notary: network.mock.notary_party().clone(),
        fields: args.invoice.to_fields(),
    });
    let flow_id = handle.flow_id();
    let finalized = handle.result().await?;

    match network.mock.responder_outcome(flow_id).await {
        Some(Ok(ResponderOutcome::Recorded(_))) => debug!(owner = %args.owner, "owner recorded the invoice"),
        Some(Ok(other)) => warn!(owner = %args.owner, outcome = ?other, "owner did not record the invoice"),
        Some(Err(err)) => warn!(owner = %args.owner, error = %err, "owner responder failed"),
        None => {}
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&finalized)?),
        OutputFormat::Text => print_finalized(network, &finalized)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn print_finalized(network: &Network, finalized: &FinalizedTransaction) -> anyhow::Result<()> {
    println!("{} Invoice issued", "✓".green().bold());
    println!("  Transaction: {}", finalized.id()?.to_hex().yellow());
    if let Some(invoice) = finalized.issued_invoice() {
        println!("  Invoice: {invoice}");
    }
    let signers: Vec<_> = finalized
        .signed()
        .signers()
        .iter()
        .map(|key| network.name_of(key))
        .collect();
    println!("  Signed by: {}", signers.join(", ").cyan());
    println!("  Notary: {}", finalized.tx().notary.name().cyan());
    Ok(())
}

fn cmd_verify(network: &Network, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let issuer = match &args.issuer {
        Some(name) => network.node(name)?,
        None => &network.local,
    };
    let owner = network.node(&args.owner)?;
    let tx = TransactionBuilder::issuance(
        issuer.party().clone(),
        owner.party().clone(),
        network.mock.notary_party().clone(),
        args.invoice.to_fields(),
    );
    let tx_id = tx.id()?;
    let verdict = verify_transaction(&tx);

    match format {
        OutputFormat::Json => {
            let body = match &verdict {
                Ok(()) => serde_json::json!({ "tx_id": tx_id.to_hex(), "accepted": true }),
                Err(reason) => serde_json::json!({
                    "tx_id": tx_id.to_hex(),
                    "accepted": false,
                    "rule": reason.rule(),
                    "reason": reason.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => match &verdict {
            Ok(()) => {
                println!("{} Transaction {} verifies", "✓".green().bold(), tx_id.short_hex().yellow());
            }
            Err(reason) => {
                println!("{} Transaction {} rejected", "✗".red().bold(), tx_id.short_hex().yellow());
                println!("  Rule: {}", reason.rule().red());
                println!("  Reason: {reason}");
            }
        },
    }
    Ok(if verdict.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_parties(network: &Network, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let notary = network.mock.notary_party();
    let local = network.local.party();
    let role = |party: &Party| {
        if party == notary {
            "notary"
        } else if party == local {
            "local"
        } else {
            "peer"
        }
    };

    let parties = network.mock.parties();
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = parties
                .iter()
                .map(|party| {
                    serde_json::json!({
                        "name": party.name(),
                        "key": party.owning_key().to_hex(),
                        "role": role(party),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for party in &parties {
                println!(
                    "{:<16} {}  {}",
                    party.name().bold(),
                    party.owning_key().short_id().dimmed(),
                    role(party).cyan()
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
