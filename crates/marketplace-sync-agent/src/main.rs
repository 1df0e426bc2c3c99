//! Marketplace Sync Agent - reconciles on-chain sale events into the
//! transaction store
//!
//! The agent polls the chain gateway for the full settlement event history,
//! merges it into the sale request ledger (highest state wins), and pushes
//! the delta to the companion REST service. It can also submit participant
//! actions and print the categorized view of an asset's negotiations.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing::info;

use marketplace_sale_logic::addr::{format_for_display, is_well_formed, validate_terms};
use marketplace_sale_logic::categorize::categorize;
use marketplace_sale_logic::chain::{ActionSubmitter, SaleAction};
use marketplace_sale_logic::config::BaseConfig;
use marketplace_sale_logic::ledger::SaleLedger;
use marketplace_sale_logic::lifecycle::{describe_status, ActionKind};
use marketplace_sale_logic::logging::init_logging;
use marketplace_sale_logic::runner::{run_sync, sync_once};
use marketplace_sale_logic::store::BackendStore;
use marketplace_sale_logic::types::Transaction;

mod gateway;

use gateway::HttpGateway;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(name = "sync-agent")]
#[command(about = "Marketplace sync agent - reconciles sale events into the store")]
struct Cli {
    /// Path to agent configuration file
    #[arg(short, long, default_value = "agent.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync loop (long-running, polls until Ctrl-C)
    Run,
    /// Run a single reconcile-and-store pass, then exit
    Once,
    /// Print the categorized negotiations for one asset
    Show {
        /// Asset id to display
        #[arg(long)]
        asset: u64,
        /// Viewer address (defaults to PARTICIPANT_ADDRESS)
        #[arg(long)]
        viewer: Option<String>,
    },
    /// Submit a participant action through the gateway
    Submit {
        /// Action to perform
        #[arg(long, value_enum)]
        action: CliAction,
        #[arg(long)]
        asset: u64,
        #[arg(long)]
        seller: String,
        #[arg(long)]
        buyer: String,
        #[arg(long)]
        tokens: u64,
        /// Price in whole currency units, e.g. 2.5
        #[arg(long)]
        funds: Decimal,
        /// Declared available balance for the acting party
        #[arg(long, default_value_t = u64::MAX)]
        max_tokens: u64,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliAction {
    PlaceBid,
    AcceptAuction,
    ProposePurchase,
    ApproveSale,
    ConfirmSale,
    FinishTransaction,
    Withdraw,
}

impl From<CliAction> for ActionKind {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::PlaceBid => ActionKind::PlaceBid,
            CliAction::AcceptAuction => ActionKind::AcceptAuction,
            CliAction::ProposePurchase => ActionKind::ProposePurchase,
            CliAction::ApproveSale => ActionKind::ApproveSale,
            CliAction::ConfirmSale => ActionKind::ConfirmSale,
            CliAction::FinishTransaction => ActionKind::FinishTransaction,
            CliAction::Withdraw => ActionKind::Withdraw,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(
        cli.verbose,
        &["marketplace_sale_logic", "marketplace_sync_agent"],
        "sync-agent",
    );

    let config = BaseConfig::load(&cli.config).context("Failed to load configuration")?;
    let store = BackendStore::new(&config.api_url, config.connection_timeout_secs)?;
    let gateway = HttpGateway::new(&config.events_url, config.connection_timeout_secs)?;

    match cli.command {
        Commands::Run => {
            info!("Contract: {}", config.contract_address);
            run_sync(&config, &gateway, &store).await
        }
        Commands::Once => {
            let mut ledger = SaleLedger::new();
            let mut pushed = 0u64;
            let report = sync_once(&config, &mut ledger, &gateway, &store, &mut pushed).await?;
            info!("Reconciliation pass: {} ({} row(s))", report, ledger.len());
            Ok(())
        }
        Commands::Show { asset, viewer } => {
            let viewer = viewer
                .or_else(|| config.participant.clone())
                .context("No viewer: pass --viewer or set PARTICIPANT_ADDRESS")?;
            if !is_well_formed(&viewer) {
                bail!("Viewer is not a well-formed address");
            }
            let records = store.fetch_by_asset(asset).await?;
            print_buckets(asset, &records, &viewer);
            Ok(())
        }
        Commands::Submit {
            action,
            asset,
            seller,
            buyer,
            tokens,
            funds,
            max_tokens,
        } => {
            validate_terms(tokens, max_tokens, funds)?;
            let action = SaleAction {
                kind: action.into(),
                asset_id: asset,
                seller,
                buyer,
                tokens,
                funds,
            };
            let receipt = gateway.submit(&action).await?;
            info!(
                "Accepted {} for asset {} (reference {})",
                action.kind, action.asset_id, receipt.reference_id
            );
            info!("Run a sync pass to observe the settled effect.");
            Ok(())
        }
    }
}

fn print_buckets(asset: u64, records: &[Transaction], viewer: &str) {
    let buckets = categorize(records, viewer);
    info!("Asset #{}: {} negotiation record(s)", asset, buckets.total());

    let sections: [(&str, &Vec<Transaction>); 6] = [
        ("Pending Bids", &buckets.pending_bids),
        ("Pending Auctions", &buckets.pending_auctions),
        ("Sales Approvals", &buckets.pending_approvals),
        ("Purchase Proposals", &buckets.pending_proposals),
        ("In Progress", &buckets.in_progress),
        ("Completed", &buckets.completed),
    ];
    for (title, list) in sections {
        if list.is_empty() {
            continue;
        }
        info!("{} ({})", title, list.len());
        for tx in list {
            info!(
                "  #{} seller={} buyer={} tokens={} funds={} - {}",
                tx.id,
                format_for_display(&tx.seller, viewer),
                format_for_display(&tx.buyer, viewer),
                tx.tokens,
                tx.funds,
                describe_status(tx, viewer)
            );
        }
    }
}
