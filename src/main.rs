//! Copy-trade ledger CLI.
//!
//! Simulates copy-trading against mock wallets: follow a source wallet,
//! replay its buys and sells with fees, and inspect balances and history.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gmgn_ledger::models::{
    BalanceChangeKind, BuyMode, Chain, ChangeRefs, CopyTradeDraft, CopyTradePatch,
    CopyTradeStatus, SellMethod, TradeSide, Wallet,
};
use gmgn_ledger::{CopyTradeLedger, LedgerConfig, Session, SqliteStore};

/// Copy-trade ledger CLI.
#[derive(Parser)]
#[command(name = "gmgn-ledger")]
#[command(about = "Simulated copy-trading ledger with mock wallets", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "LEDGER_DATABASE", default_value = "sqlite:./gmgn_ledger.db?mode=rwc")]
    database: String,

    /// Account email (omit to act logged out)
    #[arg(short, long, env = "LEDGER_EMAIL")]
    email: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Starting balance for new accounts (SOL)
    #[arg(long, env = "LEDGER_INITIAL_BALANCE", default_value = "1000")]
    initial_balance: Decimal,

    /// USD price of one SOL
    #[arg(long, env = "LEDGER_REFERENCE_PRICE", default_value = "150")]
    reference_price: Decimal,

    /// Trading fee rate (0.001 = 0.1%)
    #[arg(long, env = "LEDGER_FEE_RATE", default_value = "0.001")]
    fee_rate: Decimal,

    /// Minimum trading fee (SOL)
    #[arg(long, env = "LEDGER_MIN_FEE", default_value = "0.01")]
    min_fee: Decimal,

    /// Gas fee per trade (SOL)
    #[arg(long, env = "LEDGER_GAS_FEE", default_value = "0.005")]
    gas_fee: Decimal,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List wallets and balances
    Wallets,

    /// Add an empty wallet
    AddWallet {
        /// Display name
        name: String,

        /// Display address (generated if omitted)
        #[arg(short, long)]
        address: Option<String>,

        /// Network (SOL, BSC, Base, Monad, ETH, Tron)
        #[arg(short, long, default_value = "SOL")]
        chain: Chain,
    },

    /// Credit a wallet
    Deposit {
        wallet_id: String,
        amount: Decimal,
    },

    /// Debit a wallet
    Withdraw {
        wallet_id: String,
        amount: Decimal,
    },

    /// Ensure the account holds funds on a network
    EnsureChain {
        #[arg(default_value = "SOL")]
        chain: Chain,
    },

    /// Start copying a source wallet
    Follow {
        /// Wallet address to mirror
        source: String,

        /// Display name for the source
        #[arg(short, long)]
        name: Option<String>,

        /// Buy sizing (max, fixed, ratio)
        #[arg(long, default_value = "ratio")]
        buy_mode: BuyMode,

        /// SOL per buy (fixed mode)
        #[arg(long)]
        buy_amount: Option<Decimal>,

        /// Percent of the source's size (ratio mode)
        #[arg(long)]
        buy_ratio: Option<Decimal>,

        /// Exit rule (copy, nosell, tpsl, adv)
        #[arg(long, default_value = "copy")]
        sell_method: SellMethod,

        /// Take profit percent (tpsl)
        #[arg(long)]
        tp: Option<Decimal>,

        /// Stop loss percent (tpsl)
        #[arg(long)]
        sl: Option<Decimal>,

        #[arg(long)]
        slippage: Option<Decimal>,

        #[arg(long)]
        gas_limit: Option<Decimal>,

        /// Create in the stopped state
        #[arg(long)]
        disabled: bool,
    },

    /// Pause a copy trade
    Pause { id: String },

    /// Resume a paused or stopped copy trade
    Resume { id: String },

    /// Stop a copy trade
    Stop { id: String },

    /// Delete a copy trade (history is kept)
    Unfollow { id: String },

    /// List copy trades
    Configs,

    /// Simulate a copied trade
    Trade {
        /// Copy trade id
        id: String,

        /// buy or sell
        side: TradeSide,

        /// Token symbol
        token: String,

        /// Token amount
        amount: Decimal,

        /// USD price per token
        price: Decimal,
    },

    /// Show executed trades
    Trades {
        /// Only trades of this copy trade
        #[arg(short, long)]
        id: Option<String>,
    },

    /// Show the balance audit log
    Changes {
        /// Only changes of this wallet
        #[arg(short, long)]
        wallet: Option<String>,
    },

    /// Record a raw balance change (deposit, withdraw, fee, trade, copytrade)
    Adjust {
        wallet_id: String,
        amount: Decimal,
        #[arg(short, long, default_value = "trade")]
        kind: BalanceChangeKind,
        #[arg(short, long, default_value = "Manual adjustment")]
        description: String,
    },

    /// Show copy-trade lifetime summaries
    History,

    /// Show the portfolio summary
    Portfolio,

    /// Show ledger configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = LedgerConfig {
        initial_balance: cli.initial_balance,
        reference_price: cli.reference_price,
        fee_rate: cli.fee_rate,
        min_fee: cli.min_fee,
        gas_fee: cli.gas_fee,
    };

    let store = SqliteStore::new(&cli.database).await?;
    let ledger = CopyTradeLedger::new(store, config)?;

    let session = match cli.email.as_deref() {
        Some(email) => ledger.login(email).await?,
        None => Session::logged_out(),
    };

    match cli.command {
        Commands::Wallets => {
            let wallets = ledger.wallets(&session).await?;
            if wallets.is_empty() {
                println!("No wallets. Pass --email to log in.");
                return Ok(());
            }

            println!(
                "\n{:<44} {:<16} {:<6} {:>14} {:>14}",
                "ID", "NAME", "CHAIN", "BALANCE", "USD"
            );
            println!("{}", "-".repeat(98));
            for w in &wallets {
                println!(
                    "{:<44} {:<16} {:<6} {:>14.4} {:>14.2}",
                    w.id,
                    truncate(&w.name, 16),
                    w.chain,
                    w.balance,
                    w.usd_value
                );
            }
            println!(
                "\nTotal value: ${:.2}",
                ledger.total_balance_usd(&session).await?
            );
        }

        Commands::AddWallet {
            name,
            address,
            chain,
        } => {
            let address = address.unwrap_or_else(Wallet::placeholder_address);
            let wallet = ledger.create_wallet(&session, &name, &address, chain).await?;
            println!("Created wallet {} ({}) on {}", wallet.id, wallet.address, chain.display_name());
        }

        Commands::Deposit { wallet_id, amount } => {
            let change = ledger.deposit(&session, &wallet_id, amount).await?;
            println!("Balance: {} -> {}", change.balance_before, change.balance_after);
        }

        Commands::Withdraw { wallet_id, amount } => {
            let change = ledger.withdraw(&session, &wallet_id, amount).await?;
            println!("Balance: {} -> {}", change.balance_before, change.balance_after);
        }

        Commands::EnsureChain { chain } => {
            let balance = ledger.ensure_chain_wallet(&session, chain).await?;
            println!("{} balance: {:.4}", chain.display_name(), balance);
        }

        Commands::Follow {
            source,
            name,
            buy_mode,
            buy_amount,
            buy_ratio,
            sell_method,
            tp,
            sl,
            slippage,
            gas_limit,
            disabled,
        } => {
            let draft = CopyTradeDraft {
                source_address: source,
                source_name: name,
                buy_mode,
                buy_amount,
                buy_ratio,
                sell_method,
                tp_percent: tp,
                sl_percent: sl,
                advanced_strategy: Vec::new(),
                slippage,
                gas_limit,
                enabled: !disabled,
            };
            let config = ledger.create_config(&session, draft).await?;
            println!("Copy trade {} is {}", config.id, config.status);
        }

        Commands::Pause { id } => set_status(&ledger, &session, &id, CopyTradeStatus::Paused).await?,
        Commands::Resume { id } => set_status(&ledger, &session, &id, CopyTradeStatus::Running).await?,
        Commands::Stop { id } => set_status(&ledger, &session, &id, CopyTradeStatus::Stopped).await?,

        Commands::Unfollow { id } => {
            ledger.delete_config(&session, &id).await?;
            println!("Deleted copy trade {}", id);
        }

        Commands::Configs => {
            let configs = ledger.configs(&session).await?;
            if configs.is_empty() {
                println!("No copy trades. Use 'gmgn-ledger follow <address>' to add one.");
                return Ok(());
            }

            println!(
                "\n{:<48} {:<14} {:<8} {:<8} {:>12} {:>12}",
                "ID", "SOURCE", "MODE", "STATUS", "BOUGHT", "SOLD"
            );
            println!("{}", "-".repeat(106));
            for c in &configs {
                println!(
                    "{:<48} {:<14} {:<8} {:<8} {:>12.2} {:>12.2}",
                    c.id,
                    truncate(&c.display_name(), 14),
                    format!("{:?}", c.settings.buy_mode).to_lowercase(),
                    c.status,
                    c.bought,
                    c.sold
                );
            }
        }

        Commands::Trade {
            id,
            side,
            token,
            amount,
            price,
        } => {
            info!(id = %id, side = %side, token = %token, "Submitting simulated trade");
            let trade = ledger
                .execute_trade(&session, &id, side, &token, amount, price)
                .await?;
            println!(
                "{} {} {} @ ${} (${:.2}) | fee {} SOL + gas {} SOL",
                trade.side, trade.amount, trade.token, trade.price, trade.total_usd, trade.fee, trade.gas_fee
            );
        }

        Commands::Trades { id } => {
            let trades = ledger.trade_history(&session, id.as_deref()).await?;
            println!(
                "\n{:<20} {:<5} {:<10} {:>14} {:>12} {:>12} {:>10}",
                "TIME", "SIDE", "TOKEN", "AMOUNT", "PRICE", "USD", "FEE"
            );
            println!("{}", "-".repeat(89));
            for t in &trades {
                println!(
                    "{:<20} {:<5} {:<10} {:>14.4} {:>12.6} {:>12.2} {:>10.4}",
                    t.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    t.side,
                    truncate(&t.token, 10),
                    t.amount,
                    t.price,
                    t.total_usd,
                    t.fee.saturating_add(t.gas_fee)
                );
            }
        }

        Commands::Changes { wallet } => {
            let changes = ledger.balance_changes(&session, wallet.as_deref()).await?;
            println!(
                "\n{:<20} {:<10} {:>14} {:>14} {:>14}  {}",
                "TIME", "TYPE", "AMOUNT", "BEFORE", "AFTER", "DESCRIPTION"
            );
            println!("{}", "-".repeat(100));
            for c in &changes {
                println!(
                    "{:<20} {:<10} {:>14.4} {:>14.4} {:>14.4}  {}",
                    c.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    c.kind,
                    c.amount,
                    c.balance_before,
                    c.balance_after,
                    c.description
                );
            }
        }

        Commands::Adjust {
            wallet_id,
            amount,
            kind,
            description,
        } => {
            let change = ledger
                .record_balance_change(&session, &wallet_id, kind, amount, &description, ChangeRefs::default())
                .await?;
            println!("Balance: {} -> {}", change.balance_before, change.balance_after);
        }

        Commands::History => {
            let history = ledger.copy_trade_history(&session).await?;
            println!(
                "\n{:<14} {:<8} {:<17} {:<17} {:>12} {:>10} {:>7}",
                "NAME", "STATUS", "STARTED", "ENDED", "SPENT", "FEES", "TRADES"
            );
            println!("{}", "-".repeat(90));
            for h in &history {
                let ended = h
                    .end_time
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<14} {:<8} {:<17} {:<17} {:>12.4} {:>10.4} {:>7}",
                    truncate(&h.copy_trade_name, 14),
                    h.status,
                    h.start_time.format("%Y-%m-%d %H:%M").to_string(),
                    ended,
                    h.total_spent,
                    h.total_fees,
                    h.total_trades
                );
            }
        }

        Commands::Portfolio => {
            let summary = ledger.portfolio_summary(&session).await?;
            println!("{}", summary);
        }

        Commands::Config => print_config(ledger.config()),
    }

    Ok(())
}

async fn set_status(
    ledger: &CopyTradeLedger<SqliteStore>,
    session: &Session,
    id: &str,
    status: CopyTradeStatus,
) -> Result<()> {
    let config = ledger
        .update_config(session, id, CopyTradePatch::status(status))
        .await?;
    println!("Copy trade {} is {}", config.id, config.status);
    Ok(())
}

fn print_config(config: &LedgerConfig) {
    println!("\n=== Ledger Configuration ===\n");
    println!("Balances:");
    println!("  Initial Balance:      {} SOL", config.initial_balance);
    println!("  Reference Price:      ${}", config.reference_price);

    println!("\nCopy-Trade Fees:");
    println!("  Fee Rate:             {}%", config.fee_rate * Decimal::from(100));
    println!("  Minimum Fee:          {} SOL", config.min_fee);
    println!("  Gas Fee:              {} SOL", config.gas_fee);
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
