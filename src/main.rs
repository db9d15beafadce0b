use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cinder_ledger::bank::InMemoryBank;
use cinder_ledger::ledger::{Address, Amount, AssetId, LedgerCore};
use cinder_ledger::registry::{AssetListing, InMemoryRegistry};

#[derive(Parser)]
#[command(name = "cinder", version, about = "Burn-to-credit unit ledger")]
struct Cli {
    /// Path to the JSON state file.
    #[arg(long, default_value = "cinder.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh ledger state file.
    Init { owner: Address, sink: Address },
    /// List an asset in the eligibility registry.
    ListAsset {
        asset: AssetId,
        #[arg(long, default_value_t = 8)]
        decimals: u8,
        #[arg(long, default_value_t = 100)]
        units_per_reference: Amount,
        /// Cumulative sponsorship cap in units; 0 means uncapped.
        #[arg(long, default_value_t = 0)]
        cap: Amount,
    },
    /// Enable or disable a listed asset.
    SetEnabled { asset: AssetId, enabled: bool },
    /// Update the cumulative cap of a listed asset.
    SetCap { asset: AssetId, cap: Amount },
    /// Configure a flat transfer fee for an asset in the demo bank.
    SetFee { asset: AssetId, fee: Amount },
    /// Mint demo funds to a holder.
    Deposit {
        holder: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// Assign the consuming engine (owner only).
    SetEngine {
        #[arg(long)]
        caller: Address,
        engine: Address,
    },
    /// Propose a new owner (owner only).
    ProposeOwner {
        #[arg(long)]
        caller: Address,
        next: Address,
    },
    /// Accept a pending ownership proposal.
    AcceptOwner {
        #[arg(long)]
        caller: Address,
    },
    /// Sweep an asset from the caller into the sink and credit the
    /// beneficiary with the units the sink actually received.
    Sponsor {
        #[arg(long)]
        caller: Address,
        beneficiary: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// Debit a beneficiary's balance (engine only).
    Consume {
        #[arg(long)]
        caller: Address,
        beneficiary: Address,
        asset: AssetId,
        amount: Amount,
    },
    /// Clear the caller's sponsor once no balance remains.
    Clear {
        #[arg(long)]
        caller: Address,
    },
    /// Forfeit the caller's balance for the listed assets.
    Forfeit {
        #[arg(long)]
        caller: Address,
        assets: Vec<AssetId>,
    },
    /// Show a beneficiary's position, or the whole ledger.
    Show { beneficiary: Option<Address> },
    /// Print the audit event log, one JSON record per line.
    Events,
    /// Print the SHA-256 state digest.
    Digest,
}

#[derive(Serialize, Deserialize)]
struct AppState {
    ledger: LedgerCore,
    registry: InMemoryRegistry,
    bank: InMemoryBank,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Command::Init { owner, sink } = &cli.command {
        let state = AppState {
            ledger: LedgerCore::new(owner.clone()),
            registry: InMemoryRegistry::new(),
            bank: InMemoryBank::new(sink.clone()),
        };
        save(&cli.state, &state)?;
        println!("initialized {}", cli.state.display());
        return Ok(());
    }

    let mut state = load(&cli.state)?;
    match cli.command {
        Command::Init { .. } => {}
        Command::ListAsset {
            asset,
            decimals,
            units_per_reference,
            cap,
        } => {
            state.registry.list(
                asset.clone(),
                AssetListing {
                    enabled: true,
                    decimals,
                    units_per_reference,
                    cap_units: cap,
                },
            );
            println!("listed {asset}");
        }
        Command::SetEnabled { asset, enabled } => {
            if !state.registry.set_enabled(&asset, enabled) {
                return Err(format!("asset {asset} is not listed").into());
            }
            println!("{} {asset}", if enabled { "enabled" } else { "disabled" });
        }
        Command::SetCap { asset, cap } => {
            if !state.registry.set_cap(&asset, cap) {
                return Err(format!("asset {asset} is not listed").into());
            }
            println!("cap for {asset} set to {cap}");
        }
        Command::SetFee { asset, fee } => {
            state.bank.set_fee(asset.clone(), fee);
            println!("transfer fee for {asset} set to {fee}");
        }
        Command::Deposit {
            holder,
            asset,
            amount,
        } => {
            state.bank.deposit(&holder, &asset, amount);
            println!(
                "{holder} now holds {} {asset}",
                state.bank.balance_of(&holder, &asset)
            );
        }
        Command::SetEngine { caller, engine } => {
            state.ledger.set_engine(&caller, &engine)?;
            println!("consuming engine set to {engine}");
        }
        Command::ProposeOwner { caller, next } => {
            state.ledger.propose_owner(&caller, &next)?;
            println!("proposed {next} as the next owner");
        }
        Command::AcceptOwner { caller } => {
            state.ledger.accept_owner(&caller)?;
            println!("owner is now {caller}");
        }
        Command::Sponsor {
            caller,
            beneficiary,
            asset,
            amount,
        } => {
            let received = state.ledger.sponsor(
                &caller,
                &beneficiary,
                &asset,
                amount,
                &state.registry,
                &mut state.bank,
            )?;
            println!("credited {received} units of {asset} to {beneficiary}");
        }
        Command::Consume {
            caller,
            beneficiary,
            asset,
            amount,
        } => {
            let remaining = state.ledger.consume(&caller, &beneficiary, &asset, amount)?;
            println!("consumed {amount}; {remaining} units of {asset} remain for {beneficiary}");
        }
        Command::Clear { caller } => {
            state.ledger.clear_sponsor_if_empty(&caller)?;
            println!("sponsor cleared for {caller}");
        }
        Command::Forfeit { caller, assets } => {
            let outcome = state.ledger.clear_sponsor_and_forfeit(&caller, &assets)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Show { beneficiary } => match beneficiary {
            Some(beneficiary) => {
                let balances = state
                    .ledger
                    .account(&beneficiary)
                    .map(|account| account.balances.clone())
                    .unwrap_or_default();
                let view = serde_json::json!({
                    "beneficiary": &beneficiary,
                    "sponsor": state.ledger.sponsor_of(&beneficiary),
                    "active_assets": state.ledger.active_asset_count(&beneficiary),
                    "lifetime_allocated": state.ledger.lifetime_allocated(&beneficiary),
                    "balances": balances,
                });
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            None => {
                let snapshot = state.ledger.snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        },
        Command::Events => {
            for event in state.ledger.events() {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        Command::Digest => {
            println!("{}", state.ledger.snapshot().digest_hex());
        }
    }

    // reached only when the operation succeeded, so a failing call never
    // rewrites the state file
    save(&cli.state, &state)?;
    Ok(())
}

fn load(path: &Path) -> Result<AppState, Box<dyn Error>> {
    let raw =
        fs::read_to_string(path).map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    let state = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), "state loaded");
    Ok(state)
}

fn save(path: &Path, state: &AppState) -> Result<(), Box<dyn Error>> {
    let raw = serde_json::to_string_pretty(state)?;
    fs::write(path, raw).map_err(|err| format!("cannot write {}: {err}", path.display()))?;
    debug!(path = %path.display(), "state saved");
    Ok(())
}
