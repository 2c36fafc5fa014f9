use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use xrpl_wallet::amount::{format_xrp, xrp_to_drops, Amount};
use xrpl_wallet::assets::{display_currency, encode_currency};
use xrpl_wallet::history::TxStatus;
use xrpl_wallet::icons::Icon;
use xrpl_wallet::{Config, Error, LedgerError, WalletService};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Wallet address to operate on (or set XRPL_WALLET_ADDRESS env var)
    #[arg(long, env = "XRPL_WALLET_ADDRESS")]
    address: Option<String>,

    /// TOML config file; environment variables are used when absent
    #[arg(long, env = "XRPL_CONFIG")]
    config: Option<PathBuf>,

    /// Network to use (mainnet or testnet), overrides the config
    #[arg(long)]
    network: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new wallet
    Generate,

    /// Restore a wallet from a family seed or recovery phrase
    Restore {
        /// Family seed (s...)
        #[arg(long, conflicts_with = "mnemonic", required_unless_present = "mnemonic")]
        seed: Option<String>,

        /// Space separated recovery phrase
        #[arg(long)]
        mnemonic: Option<String>,
    },

    /// List stored wallets
    List,

    /// Show the XRP balance
    Balance {
        /// Skip the cache
        #[arg(long)]
        refresh: bool,
    },

    /// Show trustlines and token balances
    Assets {
        #[arg(long)]
        refresh: bool,

        /// Also try to fetch token icons
        #[arg(long)]
        icons: bool,
    },

    /// Show recent transactions
    History {
        #[arg(long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        refresh: bool,
    },

    /// Quote a swap into a token (or XRP)
    Quote {
        /// Amount to receive
        amount: String,

        /// Currency to receive (XRP or a token code)
        #[arg(long, default_value = "XRP")]
        currency: String,

        /// Issuer of the token to receive
        #[arg(long)]
        issuer: Option<String>,
    },

    /// Submit a signed transaction blob
    Submit {
        /// Hex encoded signed transaction
        tx_blob: String,
    },

    /// Show the current base fee
    Fee,

    /// Delete the stored wallet and its cached data
    Reset,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };
    config.logging.init();

    if let Err(e) = run(args, config).await {
        eprintln!("\n❌ {}", e);
        if is_retryable(&e) {
            eprintln!("Could not reach the XRP Ledger. Check your connection and try again.");
        }
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(network) = &args.network {
        config.network = network.parse()?;
        config.nodes.clear();
    }
    Ok(config)
}

fn is_retryable(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<Error>() {
        Some(err) => err.is_retryable(),
        None => matches!(e.downcast_ref::<LedgerError>(), Some(LedgerError::Connection(_))),
    }
}

fn require_address(args_address: Option<String>) -> Result<String> {
    args_address
        .ok_or_else(|| anyhow!("Please provide a wallet address via --address or XRPL_WALLET_ADDRESS"))
}

async fn run(args: Args, config: Config) -> Result<()> {
    let service = WalletService::new(&config)?;

    match args.command {
        Commands::Generate => {
            let wallet = service.create_wallet()?;
            println!("\n🔐 Generated new wallet (KEEP THE SECRETS SAFE!):");
            println!("{}", wallet);
            println!("Seed: {}", wallet.seed);
            if let Some(phrase) = wallet.seed_phrase() {
                println!("Recovery phrase: {}", phrase);
            }
            println!("\nFund it with at least the base reserve before it appears on the ledger.");
        }

        Commands::Restore { seed, mnemonic } => {
            let secret = seed
                .or(mnemonic)
                .ok_or_else(|| anyhow!("Provide --seed or --mnemonic"))?;
            let wallet = service.restore_wallet(&secret)?;
            println!("\n👛 Restored wallet:");
            println!("{}", wallet);
        }

        Commands::List => {
            let wallets = service.storage().list_wallets()?;
            if wallets.is_empty() {
                println!("No wallets stored in {}", service.storage().base_dir().display());
            }
            for address in wallets {
                println!("{}", address);
            }
        }

        Commands::Balance { refresh } => {
            let address = require_address(args.address)?;
            let info = service.balance(&address, refresh).await?;
            println!("\n💰 Balance for {}:", info.address);
            if info.funded {
                println!("{} ({} drops)", format_xrp(info.balance_drops), info.balance_drops);
                println!("Sequence: {}  Owned objects: {}", info.sequence, info.owner_count);
            } else {
                println!("Account not activated yet (0 XRP)");
            }
        }

        Commands::Assets { refresh, icons } => {
            let address = require_address(args.address)?;
            let lines = service.assets(&address, refresh).await?;
            println!("\n🪙 Assets for {}:", address);
            if lines.is_empty() {
                println!("No trustlines");
            }
            for line in &lines {
                let icon = if icons {
                    match service.icon(line).await {
                        Icon::Image { content_type, bytes } => {
                            format!(" [icon {} {} bytes]", content_type, bytes.len())
                        }
                        Icon::TextFallback(text) => format!(" [{}]", text),
                    }
                } else {
                    String::new()
                };
                println!(
                    "{} ({}) {} / limit {} issued by {}{}",
                    line.metadata.name,
                    line.metadata.symbol,
                    line.balance,
                    line.limit,
                    line.issuer,
                    icon
                );
            }
        }

        Commands::History { limit, refresh } => {
            let address = require_address(args.address)?;
            let records = service.history(&address, limit, refresh).await?;
            println!("\n📜 Recent transactions for {}:", address);
            for record in records {
                let status = match &record.status {
                    TxStatus::Success => "✅".to_string(),
                    TxStatus::Pending => "⏳".to_string(),
                    TxStatus::Failed(code) => format!("❌ {}", code),
                };
                let change = record
                    .net_change
                    .as_ref()
                    .map(|c| format!(" ({} {})", c.value, display_currency(&c.currency)))
                    .unwrap_or_default();
                println!(
                    "{} {} {}{} fee {} drops {}",
                    record
                        .timestamp
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "pending".into()),
                    status,
                    record.description,
                    change,
                    record.fee_drops,
                    record.hash
                );
            }
        }

        Commands::Quote {
            amount,
            currency,
            issuer,
        } => {
            let address = require_address(args.address)?;
            let deliver = if currency.eq_ignore_ascii_case("XRP") {
                Amount::Xrp {
                    drops: xrp_to_drops(&amount)?,
                }
            } else {
                let issuer = issuer.ok_or_else(|| anyhow!("--issuer is required for tokens"))?;
                Amount::Issued {
                    currency: encode_currency(&currency)?,
                    issuer,
                    value: amount
                        .parse()
                        .map_err(|e| anyhow!("Invalid amount '{}': {}", amount, e))?,
                }
            };
            let quote = service
                .ledger()
                .ripple_path_find(&address, &address, &deliver)
                .await?;
            println!("\n🔁 To receive {}:", quote.destination_amount);
            if quote.alternatives.is_empty() {
                println!("No path found");
            }
            for (i, alt) in quote.alternatives.iter().enumerate() {
                println!("{}. spend {}", i + 1, alt.source_amount);
            }
        }

        Commands::Submit { tx_blob } => {
            let result = service.ledger().submit(&tx_blob).await?;
            println!("\n📤 {}: {}", result.engine_result, result.engine_result_message);
            if let Some(hash) = result.hash {
                println!("Hash: {}", hash);
            }
        }

        Commands::Fee => {
            let fee = service.ledger().server_fee().await?;
            println!("Base fee: {} drops", fee);
        }

        Commands::Reset => {
            let address = require_address(args.address)?;
            service.reset(&address).await?;
            println!("Wallet {} removed from this device", address);
        }
    }

    service.shutdown().await;
    Ok(())
}
