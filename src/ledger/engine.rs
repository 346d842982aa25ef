//! Copy-trade ledger: wallet balances, fees, trade history and strategy lifecycle.
//!
//! Every mutation follows the same cycle under a per-user lock:
//! load a fresh copy of the user, apply the change to the copy, save it.
//! If any step fails the copy is dropped, so stored state never shows a
//! partially applied operation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::UserStore;
use crate::models::{
    self, BalanceChangeKind, Chain, ChangeRefs, CopyTradeConfig, CopyTradeDraft,
    CopyTradeHistory, CopyTradePatch, CopyTradeStatus, TradeHistory, TradeSide, User, Wallet,
    WalletBalanceChange,
};

use super::{LedgerConfig, LedgerError, LedgerResult, PortfolioSummary, Session, TradeCosts};

/// Per-user ledger over a durable store.
pub struct CopyTradeLedger<S> {
    store: S,
    config: LedgerConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: UserStore> CopyTradeLedger<S> {
    /// Create a ledger over `store`.
    pub fn new(store: S, config: LedgerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ==================== Session ====================

    /// Log in as `email`, creating the user on first sight.
    pub async fn login(&self, email: &str) -> LedgerResult<Session> {
        let session = Session::for_email(email);
        let email = session.require()?;

        let _guard = self.lock_user(email).await;
        let (user, created) = self.load_or_provision(email).await?;
        if created {
            self.commit(&user).await?;
            info!(email = %email, balance = %user.total_balance(), "Provisioned new user");
        }

        Ok(session)
    }

    // ==================== Copy trade configs ====================

    /// Create a copy trade together with its history record.
    pub async fn create_config(
        &self,
        session: &Session,
        draft: CopyTradeDraft,
    ) -> LedgerResult<CopyTradeConfig> {
        let config = self
            .mutate(session, |user, _| {
                let now = models::now();
                let status = CopyTradeStatus::initial(draft.enabled);
                let config = CopyTradeConfig {
                    id: format!("copytrade-{}", Uuid::new_v4()),
                    settings: draft,
                    created_at: now,
                    bought: Decimal::ZERO,
                    sold: Decimal::ZERO,
                    status,
                };

                user.copy_trade_history.push(new_history(&config, now));
                user.copy_trades.push(config.clone());
                Ok(config)
            })
            .await?;

        info!(
            config_id = %config.id,
            source = %config.source_address(),
            status = %config.status,
            "Created copy trade"
        );
        Ok(config)
    }

    /// Merge `patch` into a config, keeping its history status in step.
    pub async fn update_config(
        &self,
        session: &Session,
        id: &str,
        patch: CopyTradePatch,
    ) -> LedgerResult<CopyTradeConfig> {
        let config = self
            .mutate(session, |user, _| {
                let ci = user
                    .copy_trades
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or_else(|| LedgerError::config_not_found(id))?;

                let now = models::now();
                let hi = match user
                    .copy_trade_history
                    .iter()
                    .position(|h| h.copy_trade_id == id)
                {
                    Some(hi) => hi,
                    None => {
                        // Records from older data may lack a summary
                        let history = new_history(&user.copy_trades[ci], now);
                        user.copy_trade_history.push(history);
                        user.copy_trade_history.len() - 1
                    }
                };

                let config = &mut user.copy_trades[ci];
                patch.merge_settings(&mut config.settings);
                apply_status_change(config, &mut user.copy_trade_history[hi], &patch, now);
                Ok(config.clone())
            })
            .await?;

        info!(config_id = %id, status = %config.status, "Updated copy trade");
        Ok(config)
    }

    /// Remove a config. Its trades, audit records and summary are kept.
    pub async fn delete_config(&self, session: &Session, id: &str) -> LedgerResult<()> {
        self.mutate(session, |user, _| {
            let index = user
                .copy_trades
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| LedgerError::config_not_found(id))?;
            user.copy_trades.remove(index);
            Ok(())
        })
        .await?;

        info!(config_id = %id, "Deleted copy trade");
        Ok(())
    }

    // ==================== Balances ====================

    /// Apply a signed amount to a wallet and record it in the audit log.
    pub async fn record_balance_change(
        &self,
        session: &Session,
        wallet_id: &str,
        kind: BalanceChangeKind,
        amount: Decimal,
        description: &str,
        refs: ChangeRefs,
    ) -> LedgerResult<WalletBalanceChange> {
        let change = self
            .mutate(session, |user, config| {
                apply_change(user, config, wallet_id, kind, amount, description, refs, models::now())
            })
            .await?;

        debug!(
            wallet_id = %wallet_id,
            kind = %kind,
            amount = %amount,
            balance = %change.balance_after,
            "Recorded balance change"
        );
        Ok(change)
    }

    /// Credit a wallet.
    pub async fn deposit(
        &self,
        session: &Session,
        wallet_id: &str,
        amount: Decimal,
    ) -> LedgerResult<WalletBalanceChange> {
        session.require()?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let description = format!("Deposit: {} SOL", amount);
        self.record_balance_change(
            session,
            wallet_id,
            BalanceChangeKind::Deposit,
            amount,
            &description,
            ChangeRefs::default(),
        )
        .await
    }

    /// Debit a wallet; refuses to overdraw.
    pub async fn withdraw(
        &self,
        session: &Session,
        wallet_id: &str,
        amount: Decimal,
    ) -> LedgerResult<WalletBalanceChange> {
        session.require()?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let change = self
            .mutate(session, |user, config| {
                let available = user
                    .wallet(wallet_id)
                    .ok_or_else(|| LedgerError::wallet_not_found(wallet_id))?
                    .balance;
                if available < amount {
                    return Err(LedgerError::InsufficientBalance {
                        required: amount,
                        available,
                    });
                }

                let description = format!("Withdraw: {} SOL", amount);
                apply_change(
                    user,
                    config,
                    wallet_id,
                    BalanceChangeKind::Withdraw,
                    -amount,
                    &description,
                    ChangeRefs::default(),
                    models::now(),
                )
            })
            .await?;

        info!(wallet_id = %wallet_id, amount = %amount, "Withdrew from wallet");
        Ok(change)
    }

    // ==================== Wallets ====================

    /// Add an empty wallet.
    pub async fn create_wallet(
        &self,
        session: &Session,
        name: &str,
        address: &str,
        chain: Chain,
    ) -> LedgerResult<Wallet> {
        let wallet = self
            .mutate(session, |user, config| {
                let wallet = Wallet::new(name, address, chain);
                Ok(user.add_wallet(wallet, config)?.clone())
            })
            .await?;

        info!(wallet_id = %wallet.id, chain = %chain, "Created wallet");
        Ok(wallet)
    }

    /// Make sure the user holds funds on `chain`, funding a fresh wallet if not.
    ///
    /// Returns the resulting balance on that chain.
    pub async fn ensure_chain_wallet(&self, session: &Session, chain: Chain) -> LedgerResult<Decimal> {
        self.mutate(session, |user, config| {
            let has_wallet = user.wallets.iter().any(|w| w.chain == chain);
            if has_wallet && !user.chain_balance(chain).is_zero() {
                return Ok(user.chain_balance(chain));
            }

            let name = if chain == Chain::Sol {
                "Wallet1".to_string()
            } else {
                format!("Wallet1 ({})", chain)
            };
            let wallet_id = user
                .add_wallet(Wallet::new(name, Wallet::placeholder_address(), chain), config)?
                .id
                .clone();
            fund_initial(user, config, &wallet_id)?;

            info!(chain = %chain, wallet_id = %wallet_id, "Funded wallet for chain");
            Ok(user.chain_balance(chain))
        })
        .await
    }

    // ==================== Trading ====================

    /// Simulate one copy trade against the user's trading wallet.
    pub async fn execute_trade(
        &self,
        session: &Session,
        config_id: &str,
        side: TradeSide,
        token: &str,
        token_amount: Decimal,
        unit_price: Decimal,
    ) -> LedgerResult<TradeHistory> {
        session.require()?;
        if token_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(token_amount));
        }
        if unit_price < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(unit_price));
        }

        let result = self
            .mutate(session, |user, config| {
                apply_trade(user, config, config_id, side, token, token_amount, unit_price)
            })
            .await;

        match &result {
            Ok(trade) => info!(
                config_id = %config_id,
                side = %side,
                token = %token,
                amount = %token_amount,
                price = %unit_price,
                fee = %trade.fee,
                "Executed copy trade"
            ),
            Err(e) => warn!(config_id = %config_id, side = %side, error = %e, "Copy trade rejected"),
        }

        result
    }

    // ==================== Queries ====================

    pub async fn wallets(&self, session: &Session) -> LedgerResult<Vec<Wallet>> {
        self.read(session, |u| u.wallets().to_vec()).await
    }

    /// Total USD value across all wallets.
    pub async fn total_balance_usd(&self, session: &Session) -> LedgerResult<Decimal> {
        self.read(session, |u| u.total_usd_value()).await
    }

    /// Native balance held on `chain`.
    pub async fn chain_balance(&self, session: &Session, chain: Chain) -> LedgerResult<Decimal> {
        self.read(session, |u| u.chain_balance(chain)).await
    }

    pub async fn configs(&self, session: &Session) -> LedgerResult<Vec<CopyTradeConfig>> {
        self.read(session, |u| u.copy_trades().to_vec()).await
    }

    /// Trades, optionally only those of one copy trade.
    pub async fn trade_history(
        &self,
        session: &Session,
        config_id: Option<&str>,
    ) -> LedgerResult<Vec<TradeHistory>> {
        self.read(session, |u| {
            u.trade_history()
                .iter()
                .filter(|t| config_id.map_or(true, |id| t.copy_trade_id == id))
                .cloned()
                .collect()
        })
        .await
    }

    /// Audit records, optionally only those of one wallet.
    pub async fn balance_changes(
        &self,
        session: &Session,
        wallet_id: Option<&str>,
    ) -> LedgerResult<Vec<WalletBalanceChange>> {
        self.read(session, |u| {
            u.balance_changes()
                .iter()
                .filter(|c| wallet_id.map_or(true, |id| c.wallet_id == id))
                .cloned()
                .collect()
        })
        .await
    }

    pub async fn copy_trade_history(&self, session: &Session) -> LedgerResult<Vec<CopyTradeHistory>> {
        self.read(session, |u| u.copy_trade_history().to_vec()).await
    }

    pub async fn portfolio_summary(&self, session: &Session) -> LedgerResult<PortfolioSummary> {
        self.read(session, PortfolioSummary::from_user).await
    }

    // ==================== Internals ====================

    /// Per-user lock. Entries nobody holds or waits on are pruned on each call,
    /// so the map stays bounded by the number of users with operations in flight.
    async fn lock_user(&self, email: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(email.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn load(&self, email: &str) -> LedgerResult<Option<User>> {
        let mut user = self
            .store
            .load(email)
            .await
            .map_err(LedgerError::Persistence)?;

        if let Some(user) = user.as_mut() {
            user.recompute_totals(&self.config)?;
        }
        Ok(user)
    }

    async fn load_or_provision(&self, email: &str) -> LedgerResult<(User, bool)> {
        match self.load(email).await? {
            Some(user) => Ok((user, false)),
            None => Ok((self.provision(email)?, true)),
        }
    }

    /// Fresh user with one SOL wallet funded with the initial balance.
    fn provision(&self, email: &str) -> LedgerResult<User> {
        let mut user = User::new(email);
        let wallet_id = user
            .add_wallet(
                Wallet::new("Wallet1", Wallet::placeholder_address(), Chain::Sol),
                &self.config,
            )?
            .id
            .clone();
        fund_initial(&mut user, &self.config, &wallet_id)?;
        Ok(user)
    }

    async fn commit(&self, user: &User) -> LedgerResult<()> {
        self.store.save(user).await.map_err(|e| {
            warn!(email = %user.email(), error = %e, "Failed to persist user");
            LedgerError::Persistence(e)
        })
    }

    /// Run `f` on a fresh copy of the session's user and persist the result.
    async fn mutate<T>(
        &self,
        session: &Session,
        f: impl FnOnce(&mut User, &LedgerConfig) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let email = session.require()?;
        let _guard = self.lock_user(email).await;

        let (mut user, _) = self.load_or_provision(email).await?;
        let out = f(&mut user, &self.config)?;
        self.commit(&user).await?;
        Ok(out)
    }

    /// Run `f` on the session's user; logged out or unknown users read as empty.
    async fn read<T: Default>(&self, session: &Session, f: impl FnOnce(&User) -> T) -> LedgerResult<T> {
        let Some(email) = session.email() else {
            return Ok(T::default());
        };

        Ok(self.load(email).await?.map(|u| f(&u)).unwrap_or_default())
    }
}

fn new_history(config: &CopyTradeConfig, now: DateTime<Utc>) -> CopyTradeHistory {
    CopyTradeHistory {
        id: format!("ct-history-{}", config.id),
        copy_trade_id: config.id.clone(),
        copy_trade_name: config.display_name(),
        start_time: now,
        end_time: None,
        total_spent: Decimal::ZERO,
        total_fees: Decimal::ZERO,
        total_trades: 0,
        status: config.status,
    }
}

/// The single status transition for a config and its summary.
///
/// Stopping (explicitly, or by disabling a config that is not yet stopped)
/// stamps `end_time`; resuming leaves the last `end_time` in place.
fn apply_status_change(
    config: &mut CopyTradeConfig,
    history: &mut CopyTradeHistory,
    patch: &CopyTradePatch,
    now: DateTime<Utc>,
) {
    if let Some(status) = patch.status {
        config.status = status;
    }

    let stopping = patch.status == Some(CopyTradeStatus::Stopped)
        || (patch.enabled == Some(false) && config.status != CopyTradeStatus::Stopped);

    if stopping {
        config.status = CopyTradeStatus::Stopped;
        history.end_time = Some(now);
    }

    history.status = config.status;
}

#[allow(clippy::too_many_arguments)]
fn apply_change(
    user: &mut User,
    config: &LedgerConfig,
    wallet_id: &str,
    kind: BalanceChangeKind,
    amount: Decimal,
    description: &str,
    refs: ChangeRefs,
    timestamp: DateTime<Utc>,
) -> LedgerResult<WalletBalanceChange> {
    user.apply_balance_change(
        wallet_id,
        kind,
        amount,
        description,
        refs,
        config,
        timestamp,
    )
}

fn fund_initial(user: &mut User, config: &LedgerConfig, wallet_id: &str) -> LedgerResult<()> {
    apply_change(
        user,
        config,
        wallet_id,
        BalanceChangeKind::Deposit,
        config.initial_balance,
        "Initial balance",
        ChangeRefs::default(),
        models::now(),
    )?;
    Ok(())
}

/// Settle one trade on the trading wallet.
///
/// Config, wallet and balance checks run before any mutation. A later
/// overflow fails the trade and the working copy is discarded.
fn apply_trade(
    user: &mut User,
    config: &LedgerConfig,
    config_id: &str,
    side: TradeSide,
    token: &str,
    token_amount: Decimal,
    unit_price: Decimal,
) -> LedgerResult<TradeHistory> {
    let copy_trade = user
        .copy_trade(config_id)
        .ok_or_else(|| LedgerError::config_not_found(config_id))?;
    if !copy_trade.is_running() {
        return Err(LedgerError::ConfigNotRunning {
            id: config_id.to_string(),
            status: copy_trade.status,
        });
    }
    let source_address = copy_trade.source_address().to_string();

    let wallet = user
        .trading_wallet()
        .ok_or_else(|| LedgerError::wallet_not_found("trading wallet"))?;
    let wallet_id = wallet.id.clone();

    let costs = TradeCosts::quote(config, token_amount, unit_price)
        .ok_or(LedgerError::InvalidAmount(token_amount))?;

    if side == TradeSide::Buy && wallet.balance < costs.buy_cost() {
        return Err(LedgerError::InsufficientBalance {
            required: costs.buy_cost(),
            available: wallet.balance,
        });
    }

    let now = models::now();
    let trade_id = format!("trade-{}", Uuid::new_v4());
    let refs = ChangeRefs::copy_trade(config_id).with_trade(&trade_id);

    let (principal, label) = match side {
        TradeSide::Buy => (-costs.notional, "Buy"),
        TradeSide::Sell => (costs.sell_proceeds(), "Sell"),
    };

    let legs = [
        (
            BalanceChangeKind::CopyTrade,
            principal,
            format!("CopyTrade {}: {} ({} @ ${})", label, token, token_amount, unit_price),
        ),
        (
            BalanceChangeKind::Fee,
            -costs.fee,
            format!("CopyTrade Fee: {}", token),
        ),
        (
            BalanceChangeKind::Fee,
            -costs.gas_fee,
            format!("CopyTrade Gas Fee: {}", token),
        ),
    ];
    for (kind, amount, description) in legs {
        apply_change(user, config, &wallet_id, kind, amount, &description, refs.clone(), now)?;
    }

    let total_fee = costs.total_fee();
    if let Some(copy_trade) = user.copy_trade_mut(config_id) {
        let filled = match side {
            TradeSide::Buy => &mut copy_trade.bought,
            TradeSide::Sell => &mut copy_trade.sold,
        };
        *filled = accumulate(*filled, token_amount)?;
    }
    if let Some(history) = user.history_mut(config_id) {
        if side == TradeSide::Buy {
            history.total_spent = accumulate(history.total_spent, costs.notional)?;
        }
        history.total_fees = accumulate(history.total_fees, total_fee)?;
        history.total_trades += 1;
    }

    let trade = TradeHistory {
        id: trade_id,
        copy_trade_id: config_id.to_string(),
        side,
        token: token.to_string(),
        amount: token_amount,
        price: unit_price,
        total_usd: costs.total_usd,
        timestamp: now,
        source_address,
        fee: costs.fee,
        gas_fee: costs.gas_fee,
    };
    user.trade_history.push(trade.clone());

    Ok(trade)
}

fn accumulate(total: Decimal, amount: Decimal) -> LedgerResult<Decimal> {
    total
        .checked_add(amount)
        .ok_or(LedgerError::InvalidAmount(amount))
}
