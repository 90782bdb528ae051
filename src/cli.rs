//! Command-line interface.
//!
//! Every command loads [`Config`] from the environment, applies the global
//! flags on top, runs one core operation and prints the resulting record,
//! either as colored text or, with `--json`, as pretty-printed JSON on
//! stdout.
//!
//! # Commands
//!
//! - `info`: ERC-20 metadata of the contract
//! - `ownership`: current owner and full transfer history (`--quick` skips
//!   the history)
//! - `pools`: liquidity pools and spot prices on every DEX of the chain
//! - `tx <hash>`: pair creation analysis of a transaction
//! - `detect <address>`: find which registered chain hosts a contract, then
//!   show its token metadata and pools there
//! - `events`: decoded events of the contract
//!
//! # Example
//!
//! ```bash
//! CONTRACT_ADDRESS=0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82 chain-lens ownership
//! chain-lens --chain 1 pools --token 0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2
//! chain-lens --json events --kind transfer --from 19000000 --to 19001000
//! ```

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, B256, U256};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::Config;
use crate::contract::{ContractInspector, PairCreationReport, TokenInfo};
use crate::detect::detect_and_analyze;
use crate::error::{LensError, LensResult};
use crate::events::{DecodedEvent, EventKind};
use crate::ownership::{HistoryStatus, OwnershipHistory, OwnershipStatus};
use crate::pools::{PoolDiscovery, PoolResolver, PoolState};
use crate::registry::{format_fee_tier, ChainInfo, ChainRegistry};
use crate::rpc::AlloyRpcClient;

/// Read-only contract and DEX inspector
#[derive(Parser, Debug)]
#[command(name = "chain-lens")]
#[command(about = "Ownership history, pool discovery and spot pricing for EVM contracts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Flags that override the environment.
#[derive(Args, Debug, Default, PartialEq, Eq)]
struct GlobalArgs {
    /// Chain id (overrides CHAIN_ID)
    #[arg(long, global = true)]
    chain: Option<u64>,

    /// RPC endpoint (overrides RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Target contract (overrides CONTRACT_ADDRESS)
    #[arg(long, global = true)]
    contract: Option<Address>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Show ERC-20 metadata of the contract
    Info,

    /// Show the owner and ownership transfer history
    Ownership {
        /// Only read the current owner
        #[arg(short, long)]
        quick: bool,
    },

    /// Find liquidity pools and spot prices
    Pools {
        /// Token to search for (default: the contract)
        #[arg(short, long)]
        token: Option<Address>,
    },

    /// Analyze a pair creation transaction
    Tx {
        /// Transaction hash
        hash: B256,
    },

    /// Find the chain a contract is deployed on and analyse it there
    Detect {
        /// Contract address
        address: Address,
    },

    /// List decoded events emitted by the contract
    Events {
        /// Event kinds to include (repeatable; default: Transfer, Approval and OwnershipTransferred)
        #[arg(short, long = "kind")]
        kinds: Vec<EventKind>,

        /// First block (default: deployment block)
        #[arg(long)]
        from: Option<u64>,

        /// Last block (default: latest)
        #[arg(long)]
        to: Option<u64>,
    },
}

/// Parse CLI arguments and execute the selected command.
///
/// # Errors
///
/// Returns configuration errors (missing contract, unknown chain, bad
/// environment values) and any failure of the executed operation.
pub async fn run() -> LensResult<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(chain) = cli.global.chain {
        config = config.with_chain_id(chain);
    }
    if let Some(url) = cli.global.rpc_url {
        config = config.with_rpc_url(url);
    }
    if let Some(contract) = cli.global.contract {
        config = config.with_contract_address(contract);
    }

    let registry = ChainRegistry::builtin();
    let json = cli.global.json;

    match cli.command {
        Commands::Info => run_info(&config, &registry, json).await,
        Commands::Ownership { quick } => run_ownership(&config, &registry, quick, json).await,
        Commands::Pools { token } => run_pools(&config, &registry, token, json).await,
        Commands::Tx { hash } => run_tx(&config, &registry, hash, json).await,
        Commands::Detect { address } => run_detect(&config, &registry, address, json).await,
        Commands::Events { kinds, from, to } => {
            run_events(&config, &registry, &kinds, from, to, json).await
        }
    }
}

async fn connect(config: &Config, registry: &ChainRegistry) -> LensResult<AlloyRpcClient> {
    let url = config.resolve_rpc_url(registry)?;
    AlloyRpcClient::connect(&url).await
}

async fn run_info(config: &Config, registry: &ChainRegistry, json: bool) -> LensResult<()> {
    let contract = config.require_contract()?;
    let client = connect(config, registry).await?;
    let token = ContractInspector::from_config(&client, contract, config)
        .token_info()
        .await?;

    if json {
        return print_json(&token);
    }
    print_token_info(&token, registry.chain(config.chain_id()).ok());
    Ok(())
}

#[instrument(skip(config, registry))]
async fn run_ownership(
    config: &Config,
    registry: &ChainRegistry,
    quick: bool,
    json: bool,
) -> LensResult<()> {
    let contract = config.require_contract()?;
    let client = connect(config, registry).await?;
    let inspector = ContractInspector::from_config(&client, contract, config);

    if quick {
        let status = inspector.quick_check().await?;
        if json {
            return print_json(&status);
        }
        print_ownership_status(contract, &status);
        return Ok(());
    }

    info!(contract = %contract, "Rebuilding ownership history");
    let history = inspector.history().await?;
    if json {
        return print_json(&history);
    }
    print_ownership_history(contract, &history);
    Ok(())
}

async fn run_pools(
    config: &Config,
    registry: &ChainRegistry,
    token: Option<Address>,
    json: bool,
) -> LensResult<()> {
    let token = match token {
        Some(token) => token,
        None => config.require_contract()?,
    };
    let client = connect(config, registry).await?;
    let discovery = PoolResolver::new(&client, registry, config.retry_policy())
        .discover(token, config.chain_id())
        .await?;

    if json {
        return print_json(&discovery);
    }
    print_pools(token, &discovery);
    Ok(())
}

async fn run_tx(
    config: &Config,
    registry: &ChainRegistry,
    hash: B256,
    json: bool,
) -> LensResult<()> {
    // Without a configured contract the involvement flag compares against zero
    let contract = config.contract_address().unwrap_or(Address::ZERO);
    let client = connect(config, registry).await?;
    let report = ContractInspector::from_config(&client, contract, config)
        .analyze_pair_creation(hash)
        .await?;

    if json {
        return print_json(&report);
    }
    print_pair_report(&report, config.contract_address().is_some());
    Ok(())
}

async fn run_detect(
    config: &Config,
    registry: &ChainRegistry,
    address: Address,
    json: bool,
) -> LensResult<()> {
    let detection = detect_and_analyze(address, registry, config.retry_policy(), |chain| async move {
        let url = chain.default_rpc_url().ok_or_else(|| {
            LensError::config(format!("no public RPC for {}", chain.name), None)
        })?;
        AlloyRpcClient::connect(url).await
    })
    .await?;

    if json {
        return print_json(&detection);
    }
    let Some(detection) = detection else {
        println!(
            "{} {} was not found on any registered chain",
            "❌".red(),
            address.to_string().cyan()
        );
        return Ok(());
    };

    println!(
        "{} {} found on {} (chain id {})",
        "✅".green(),
        address.to_string().cyan(),
        detection.chain.name.green().bold(),
        detection.chain.id
    );
    match &detection.token {
        Some(token) => print_token_info(token, Some(&detection.chain)),
        None => println!("   {}", "Token info unavailable".yellow()),
    }
    print_pools(address, &detection.pools);
    Ok(())
}

async fn run_events(
    config: &Config,
    registry: &ChainRegistry,
    kinds: &[EventKind],
    from: Option<u64>,
    to: Option<u64>,
    json: bool,
) -> LensResult<()> {
    let contract = config.require_contract()?;
    let kinds = kinds_or_default(kinds);
    let client = connect(config, registry).await?;
    let events = ContractInspector::from_config(&client, contract, config)
        .events(&kinds, from, to)
        .await?;

    if json {
        return print_json(&events);
    }
    print_events(&events);
    Ok(())
}

/// Requested kinds, or the contract's own events when none were given.
fn kinds_or_default(kinds: &[EventKind]) -> Vec<EventKind> {
    if kinds.is_empty() {
        EventKind::CONTRACT.to_vec()
    } else {
        kinds.to_vec()
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> LensResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| LensError::decoding("failed to encode output as JSON", Some(Box::new(e))))?;
    println!("{rendered}");
    Ok(())
}

fn print_token_info(token: &TokenInfo, chain: Option<&ChainInfo>) {
    println!("{} {}", "🪙".cyan(), "Token".bold());
    println!("   Address:      {}", token.address.to_string().cyan());
    println!("   Name:         {}", token.name.bold());
    println!("   Symbol:       {}", token.symbol.yellow());
    println!("   Decimals:     {}", token.decimals);
    println!(
        "   Total supply: {}",
        format_amount(token.total_supply, token.decimals).blue()
    );
    if let Some(chain) = chain {
        println!(
            "   Explorer:     {}",
            format!("{}/token/{}", chain.explorer, token.address).dimmed()
        );
    }
}

fn print_ownership_status(contract: Address, status: &OwnershipStatus) {
    println!("{} Ownership of {}", "🔑".cyan(), contract.to_string().cyan());
    if status.is_renounced {
        println!("   Owner: {} {}", status.current_owner, "(renounced)".green().bold());
    } else {
        println!("   Owner: {}", status.current_owner.to_string().yellow());
    }
}

fn print_ownership_history(contract: Address, history: &OwnershipHistory) {
    print_ownership_status(
        contract,
        &OwnershipStatus {
            current_owner: history.current_owner,
            is_renounced: history.is_renounced,
        },
    );
    println!();
    println!("{} {} transfer(s)", "📜".cyan(), history.transfer_events.len());

    for event in &history.transfer_events {
        let when = event.datetime().map_or_else(
            || event.timestamp.to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        println!(
            "   {} Block {} | {} -> {} | by {} | tx {}",
            when.dimmed(),
            event.block_number.to_string().yellow(),
            event.previous_owner,
            event.new_owner.to_string().bold(),
            event.from_address,
            event.transaction_hash.to_string().dimmed()
        );
    }

    if let HistoryStatus::Stale { expected, found } = history.status() {
        println!();
        println!(
            "{} History ends at {} but owner() is {}; set DEPLOYMENT_BLOCK or check the RPC",
            "⚠️".yellow(),
            found.map_or_else(|| "no transfer".to_string(), |owner| owner.to_string()),
            expected
        );
    }
}

fn print_pools(token: Address, discovery: &PoolDiscovery) {
    println!("{} Pools for {}", "💧".cyan(), token.to_string().cyan());

    if discovery.snapshots.is_empty() {
        println!("   {}", "No pools found".yellow().bold());
    }

    for snapshot in &discovery.snapshots {
        let candidate = &snapshot.candidate;
        let fee = candidate
            .fee_tier
            .map(|fee| format!(" {}", format_fee_tier(fee)))
            .unwrap_or_default();
        let price = snapshot.price.map_or_else(
            || "n/a".dimmed().to_string(),
            |price| format!("{price:.8} {}", candidate.quote.symbol).green().bold().to_string(),
        );
        let depth = match &snapshot.state {
            PoolState::V2 {
                token_reserve,
                quote_reserve,
            } => format!("reserves {token_reserve} / {quote_reserve}"),
            PoolState::V3 { liquidity, .. } => format!("liquidity {liquidity}"),
        };
        let marker = if snapshot.has_liquidity {
            "●".green()
        } else {
            "○".red()
        };

        println!(
            "   {} {} {}/{}{} | {} | price {} | {}",
            marker,
            candidate.dex.bold(),
            "TOKEN".dimmed(),
            candidate.quote.symbol.yellow(),
            fee,
            candidate.address,
            price,
            depth.dimmed()
        );
    }

    for skipped in &discovery.skipped {
        let fee = skipped
            .fee_tier
            .map(|fee| format!(" {}", format_fee_tier(fee)))
            .unwrap_or_default();
        println!(
            "   {} skipped {} {}{}: {}",
            "⚠️".yellow(),
            skipped.dex,
            skipped.quote,
            fee,
            skipped.reason.dimmed()
        );
    }
}

fn print_pair_report(report: &PairCreationReport, has_contract: bool) {
    println!("{} Transaction {}", "🔎".cyan(), report.transaction_hash.to_string().cyan());
    println!(
        "   Block: {}",
        report
            .block_number
            .map_or_else(|| "pending".to_string(), |block| block.to_string())
            .yellow()
    );
    println!("   From:  {}", report.from);
    println!(
        "   To:    {}",
        report.to.map_or_else(|| "contract creation".to_string(), |to| to.to_string())
    );
    println!("   Value: {}", format_amount(report.value, 18));
    println!("   Events: {}", report.events.len());

    match &report.created_pair {
        Some(pair) => {
            println!();
            println!("{} {}", "✅".green(), "Pair created".green().bold());
            println!("   Pair:    {}", pair.pair.to_string().bold());
            println!("   Factory: {}", pair.factory);
            println!("   Token0:  {}", pair.token0);
            println!("   Token1:  {}", pair.token1);
            if let Some(fee) = pair.fee_tier {
                println!("   Fee:     {}", format_fee_tier(fee));
            }
            if has_contract {
                let verdict = if report.involves_contract {
                    "yes".green()
                } else {
                    "no".red()
                };
                println!("   Involves contract: {verdict}");
            }
        }
        None => println!("{} {}", "❌".red(), "No pair creation event".yellow()),
    }
}

fn print_events(events: &[DecodedEvent]) {
    println!("{} {} event(s)", "📜".cyan(), events.len());
    for event in events {
        let args = event
            .args
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "   Block {} #{} {} {}",
            event.block_number.to_string().yellow(),
            event.log_index,
            event.name().bold(),
            args.dimmed()
        );
    }
}

/// Render a raw token amount in whole units, dropping trailing zeros.
fn format_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals).map_or_else(
        |_| amount.to_string(),
        |formatted| {
            if formatted.contains('.') {
                formatted
                    .trim_end_matches('0')
                    .trim_end_matches('.')
                    .to_string()
            } else {
                formatted
            }
        },
    )
}
