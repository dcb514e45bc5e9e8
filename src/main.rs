use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use station_core::assets::{finder_url, FinderQuery};
use station_core::chain::address::is_account_address;
use station_core::chain::staking;
use station_core::chain::types::Coin;
use station_core::chain::{ChainOptions, ChainRegistry, LcdClient, NetworkName};
use station_core::config::Config;
use station_core::confirm::chain_error;
use station_core::fee::{fee_denom_list, select_fee_denom, FeeDenomRequest};
use station_core::format::{self, FormatConfig, DEFAULT_DECIMALS};

#[derive(Parser)]
#[command(name = "station")]
#[command(about = "Terra Station wallet core", version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml", env = "STATION_CONFIG")]
    config: String,

    /// Network to use instead of the configured one
    #[arg(short, long, global = true)]
    network: Option<NetworkName>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },

    /// Show the resolved endpoints of every network
    Networks,

    /// Pick the fee denomination an account would pay with
    FeeDenom {
        address: String,

        /// Estimated gas; omitted means "before simulation"
        #[arg(short, long)]
        gas: Option<u64>,

        /// Preferred denomination
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Look up a transaction and report whether it succeeded
    TxStatus { txhash: String },

    /// Delegations and unbondings of an account
    Staking { address: String },

    /// List the accounts in the configured key store
    Keys,

    /// Format an integer amount for display
    Format {
        amount: String,
        denom: String,

        #[arg(short, long, default_value_t = DEFAULT_DECIMALS)]
        decimals: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "station_core=info,station=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output } => {
            let config = Config::default();
            config.save(&output)?;
            info!("Configuration file created at: {}", output);
        }
        Commands::Networks => {
            let config = load_config(&cli.config)?;
            let registry = ChainRegistry::new(&config.network.assets_url, config.http_timeout())?;
            for chain in registry.resolve_all().await {
                println!(
                    "{:<8} {:<11} lcd={} fcd={} walletconnect={}",
                    chain.name, chain.chain_id, chain.lcd, chain.fcd, chain.walletconnect_id
                );
            }
        }
        Commands::FeeDenom { address, gas, default } => {
            let (config, chain) = resolve(&cli.config, cli.network).await?;
            let lcd = client(&config, &chain)?;
            if !is_account_address(&address) {
                bail!("Invalid address: {}", address);
            }

            let balance = lcd.query_balance(&address).await?;
            let calculator = lcd.gas_prices().await?;
            let candidates = fee_denom_list(&balance);
            let accept_all = |_: &Coin| true;

            let request = FeeDenomRequest {
                candidates: &candidates,
                balance: &balance,
                gas,
                calculator: Some(&calculator),
                validate: &accept_all,
                default_denom: default.as_deref(),
                is_classic: chain.is_classic(),
            };

            match select_fee_denom(&request) {
                Some(denom) => {
                    let fee = request.fee_for(&denom);
                    println!(
                        "{} (fee {})",
                        format::denom(&denom, None),
                        format::coin(&fee, DEFAULT_DECIMALS, FormatConfig::default(), None)
                    );
                }
                None => bail!("Insufficient balance for any fee denomination"),
            }
        }
        Commands::TxStatus { txhash } => {
            let (config, chain) = resolve(&cli.config, cli.network).await?;
            let lcd = client(&config, &chain)?;

            match lcd.query_tx(&txhash).await? {
                None => println!("{} is pending", txhash),
                Some(info) if !info.is_included() => println!("{} is pending", txhash),
                Some(info) => {
                    match chain_error(&info, "Transaction failed") {
                        Some(message) => println!("{} failed at height {}: {}", txhash, info.height, message),
                        None => println!("{} succeeded at height {}", txhash, info.height),
                    }
                    println!("{}", finder_url(&chain.chain_id, None, FinderQuery::Tx, &txhash));
                }
            }
        }
        Commands::Staking { address } => {
            let (config, chain) = resolve(&cli.config, cli.network).await?;
            let lcd = client(&config, &chain)?;
            if !is_account_address(&address) {
                bail!("Invalid address: {}", address);
            }

            let validators = staking::query_validators(&lcd).await?;
            let delegations = staking::query_delegations(&lcd, &address).await?;
            let unbondings = staking::query_unbondings(&lcd, &address).await?;
            let amount = |value: &str| format::amount(value, DEFAULT_DECIMALS, FormatConfig::default());

            println!("Delegated: {} Luna", amount(&staking::calc_delegations_total(&delegations)));
            for delegation in &delegations {
                let operator = delegation.validator_address();
                let moniker = staking::find_moniker(&validators, operator).unwrap_or_else(|e| {
                    warn!("{}", e);
                    operator
                });
                println!("  {:<24} {}", moniker, amount(&delegation.balance.amount));
            }

            println!("Unbonding: {} Luna", amount(&staking::calc_unbondings_total(&unbondings)));
            for unbonding in staking::flatten_unbondings(&unbondings) {
                let release = unbonding.entry.completion_time.to_rfc3339();
                println!(
                    "  {} {} until {}",
                    format::truncate(&unbonding.validator_address, 16, 6),
                    amount(&unbonding.entry.balance),
                    format::date(&release, Default::default())
                );
            }
        }
        Commands::Keys => {
            let config = load_config(&cli.config)?;
            let store = config.open_keystore()?;
            if store.list().is_empty() {
                println!("No keys in {}", store.path().display());
            }
            for key in store.list() {
                let kind = if key.ledger { "ledger" } else { "local" };
                println!("{:<16} {:<7} {}", key.name, kind, key.address);
            }
        }
        Commands::Format { amount, denom, decimals } => {
            let coin = Coin::new(denom, amount);
            println!("{}", format::coin(&coin, decimals, FormatConfig::default(), None));
        }
    }

    Ok(())
}

/// The configured file, or defaults when it does not exist yet
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::load(path)
    } else {
        info!("No configuration at {}, using defaults", path);
        Ok(Config::default())
    }
}

async fn resolve(path: &str, network: Option<NetworkName>) -> Result<(Config, ChainOptions)> {
    let config = load_config(path)?;
    let registry = ChainRegistry::new(&config.network.assets_url, config.http_timeout())?;
    let chain = registry.resolve_network(network.unwrap_or(config.network.name)).await;
    info!("Using {} ({})", chain.name, chain.chain_id);
    Ok((config, chain))
}

fn client(config: &Config, chain: &ChainOptions) -> Result<LcdClient> {
    Ok(LcdClient::new(config.client_config(chain))?)
}
