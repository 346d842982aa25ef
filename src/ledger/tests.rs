use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::db::{MemoryStore, SqliteStore, UserStore};
use crate::models::{
    BalanceChangeKind, Chain, ChangeRefs, CopyTradeDraft, CopyTradePatch, CopyTradeStatus,
    TradeSide, User,
};

const EMAIL: &str = "trader@example.com";
const SOURCE: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

/// Memory store whose saves can be switched to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_saves: Arc<AtomicBool>,
}

impl UserStore for FlakyStore {
    async fn load(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.inner.load(email).await
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.inner.save(user).await
    }
}

fn ledger_with_balance(initial_balance: Decimal) -> CopyTradeLedger<MemoryStore> {
    let config = LedgerConfig {
        initial_balance,
        ..Default::default()
    };
    CopyTradeLedger::new(MemoryStore::new(), config).unwrap()
}

async fn setup(initial_balance: Decimal) -> (CopyTradeLedger<MemoryStore>, Session, String) {
    let ledger = ledger_with_balance(initial_balance);
    let session = ledger.login(EMAIL).await.unwrap();
    let config = ledger
        .create_config(&session, CopyTradeDraft::new(SOURCE))
        .await
        .unwrap();
    (ledger, session, config.id)
}

async fn trading_wallet_balance(ledger: &CopyTradeLedger<MemoryStore>, session: &Session) -> Decimal {
    ledger.wallets(session).await.unwrap()[0].balance
}

#[tokio::test]
async fn test_login_provisions_funded_wallet_once() {
    let ledger = ledger_with_balance(dec!(1000));
    let session = assert_ok!(ledger.login(EMAIL).await);

    let wallets = ledger.wallets(&session).await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].name, "Wallet1");
    assert_eq!(wallets[0].chain, Chain::Sol);
    assert_eq!(wallets[0].balance, dec!(1000));
    assert_eq!(wallets[0].usd_value, dec!(150000));
    assert_eq!(ledger.total_balance_usd(&session).await.unwrap(), dec!(150000));

    let changes = ledger.balance_changes(&session, None).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, BalanceChangeKind::Deposit);
    assert_eq!(changes[0].balance_before, Decimal::ZERO);
    assert_eq!(changes[0].balance_after, dec!(1000));

    // Logging in again reuses the stored user
    ledger.login(EMAIL).await.unwrap();
    let again = ledger.wallets(&session).await.unwrap();
    assert_eq!(again, wallets);
}

#[tokio::test]
async fn test_login_rejects_blank_email() {
    let ledger = ledger_with_balance(dec!(1000));
    let err = assert_err!(ledger.login("  ").await);
    assert!(matches!(err, LedgerError::NotAuthenticated));
    assert!(ledger.store().is_empty().await);
}

#[tokio::test]
async fn test_create_config_pairs_history_record() {
    let (ledger, session, id) = setup(dec!(1000)).await;

    let configs = ledger.configs(&session).await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].id, id);
    assert_eq!(configs[0].status, CopyTradeStatus::Running);

    let history = ledger.copy_trade_history(&session).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].copy_trade_id, id);
    assert_eq!(history[0].copy_trade_name, "7xKXtg2C...");
    assert_eq!(history[0].status, CopyTradeStatus::Running);
    assert_eq!(history[0].total_spent, Decimal::ZERO);
    assert_eq!(history[0].total_fees, Decimal::ZERO);
    assert_eq!(history[0].total_trades, 0);
    assert!(history[0].end_time.is_none());
}

#[tokio::test]
async fn test_disabled_draft_starts_stopped() {
    let ledger = ledger_with_balance(dec!(1000));
    let session = ledger.login(EMAIL).await.unwrap();

    let mut draft = CopyTradeDraft::new(SOURCE);
    draft.enabled = false;
    draft.source_name = Some("whale".to_string());
    let config = ledger.create_config(&session, draft).await.unwrap();

    assert_eq!(config.status, CopyTradeStatus::Stopped);
    let history = ledger.copy_trade_history(&session).await.unwrap();
    assert_eq!(history[0].status, CopyTradeStatus::Stopped);
    assert_eq!(history[0].copy_trade_name, "whale");
}

#[tokio::test]
async fn test_buy_insufficient_balance_changes_nothing() {
    let (ledger, session, id) = setup(dec!(0.1)).await;
    let raw_before = ledger.store().get_raw(EMAIL).await;

    // 1000 tokens @ $1 at $150/SOL ≈ 6.667 SOL
    let err = assert_err!(
        ledger
            .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(1000), dec!(1))
            .await
    );
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    assert_eq!(trading_wallet_balance(&ledger, &session).await, dec!(0.1));
    assert!(ledger.trade_history(&session, None).await.unwrap().is_empty());
    assert_eq!(ledger.balance_changes(&session, None).await.unwrap().len(), 1);
    assert_eq!(ledger.store().get_raw(EMAIL).await, raw_before);
}

#[tokio::test]
async fn test_buy_debits_notional_fee_and_gas() {
    let (ledger, session, id) = setup(dec!(100)).await;

    // 1500 tokens @ $1 = 10 SOL notional
    let trade = assert_ok!(
        ledger
            .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(1500), dec!(1))
            .await
    );
    assert_eq!(trade.fee, dec!(0.01));
    assert_eq!(trade.gas_fee, dec!(0.005));
    assert_eq!(trade.total_usd, dec!(1500));
    assert_eq!(trade.source_address, SOURCE);

    assert_eq!(trading_wallet_balance(&ledger, &session).await, dec!(89.985));

    let changes = ledger.balance_changes(&session, None).await.unwrap();
    let trade_changes: Vec<_> = changes.iter().skip(1).collect();
    assert_eq!(trade_changes.len(), 3);
    assert_eq!(trade_changes[0].kind, BalanceChangeKind::CopyTrade);
    assert_eq!(trade_changes[0].amount, dec!(-10));
    assert_eq!(trade_changes[1].kind, BalanceChangeKind::Fee);
    assert_eq!(trade_changes[1].amount, dec!(-0.01));
    assert_eq!(trade_changes[2].kind, BalanceChangeKind::Fee);
    assert_eq!(trade_changes[2].amount, dec!(-0.005));
    for change in &trade_changes {
        assert_eq!(change.copy_trade_id.as_deref(), Some(id.as_str()));
        assert_eq!(change.trade_id.as_deref(), Some(trade.id.as_str()));
    }

    let config = &ledger.configs(&session).await.unwrap()[0];
    assert_eq!(config.bought, dec!(1500));
    assert_eq!(config.sold, Decimal::ZERO);

    let history = &ledger.copy_trade_history(&session).await.unwrap()[0];
    assert_eq!(history.total_trades, 1);
    assert_eq!(history.total_spent, dec!(10));
    assert_eq!(history.total_fees, dec!(0.015));

    let trades = ledger.trade_history(&session, Some(&id)).await.unwrap();
    assert_eq!(trades, vec![trade]);
}

#[tokio::test]
async fn test_sell_credits_net_proceeds_then_debits_fees() {
    let (ledger, session, id) = setup(dec!(100)).await;

    // 3000 tokens @ $1 = 20 SOL notional, fee 0.02, gas 0.005
    ledger
        .execute_trade(&session, &id, TradeSide::Sell, "WIF", dec!(3000), dec!(1))
        .await
        .unwrap();

    let changes = ledger.balance_changes(&session, None).await.unwrap();
    assert_eq!(changes.len(), 4);
    assert_eq!(changes[1].kind, BalanceChangeKind::CopyTrade);
    assert_eq!(changes[1].amount, dec!(19.975));
    assert_eq!(changes[2].amount, dec!(-0.02));
    assert_eq!(changes[3].amount, dec!(-0.005));
    assert_eq!(trading_wallet_balance(&ledger, &session).await, dec!(119.95));

    let config = &ledger.configs(&session).await.unwrap()[0];
    assert_eq!(config.sold, dec!(3000));

    let history = &ledger.copy_trade_history(&session).await.unwrap()[0];
    assert_eq!(history.total_spent, Decimal::ZERO);
    assert_eq!(history.total_fees, dec!(0.025));
    assert_eq!(history.total_trades, 1);
}

#[tokio::test]
async fn test_balance_conservation_across_activity() {
    let (ledger, session, id) = setup(dec!(50)).await;

    ledger
        .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(1000), dec!(0.3))
        .await
        .unwrap();
    ledger
        .execute_trade(&session, &id, TradeSide::Sell, "BONK", dec!(400), dec!(0.45))
        .await
        .unwrap();
    let wallets = ledger.wallets(&session).await.unwrap();
    ledger.deposit(&session, &wallets[0].id, dec!(2.5)).await.unwrap();
    ledger.withdraw(&session, &wallets[0].id, dec!(1.25)).await.unwrap();
    let eth = ledger
        .create_wallet(&session, "Cold", "0xc01d", Chain::Eth)
        .await
        .unwrap();
    ledger.deposit(&session, &eth.id, dec!(7)).await.unwrap();

    for wallet in ledger.wallets(&session).await.unwrap() {
        let changes = ledger
            .balance_changes(&session, Some(&wallet.id))
            .await
            .unwrap();
        assert!(changes.iter().all(|c| c.balance_after - c.balance_before == c.amount));

        let replayed: Decimal = changes.iter().map(|c| c.amount).sum();
        assert_eq!(replayed, wallet.balance);
        assert_eq!(wallet.usd_value, wallet.balance * dec!(150));
    }

    let wallets = ledger.wallets(&session).await.unwrap();
    let total: Decimal = wallets.iter().map(|w| w.usd_value).sum();
    assert_eq!(ledger.total_balance_usd(&session).await.unwrap(), total);
}

#[tokio::test]
async fn test_stop_then_resume_keeps_end_time() {
    let (ledger, session, id) = setup(dec!(100)).await;

    let stopped = ledger
        .update_config(&session, &id, CopyTradePatch::status(CopyTradeStatus::Stopped))
        .await
        .unwrap();
    assert_eq!(stopped.status, CopyTradeStatus::Stopped);

    let history = &ledger.copy_trade_history(&session).await.unwrap()[0];
    assert_eq!(history.status, CopyTradeStatus::Stopped);
    let end_time = history.end_time.expect("end time set on stop");

    let resumed = ledger
        .update_config(&session, &id, CopyTradePatch::status(CopyTradeStatus::Running))
        .await
        .unwrap();
    assert_eq!(resumed.status, CopyTradeStatus::Running);

    let history = &ledger.copy_trade_history(&session).await.unwrap()[0];
    assert_eq!(history.status, CopyTradeStatus::Running);
    assert_eq!(history.end_time, Some(end_time));
}

#[tokio::test]
async fn test_disabling_stops_and_pause_mirrors() {
    let (ledger, session, id) = setup(dec!(100)).await;

    let paused = ledger
        .update_config(&session, &id, CopyTradePatch::status(CopyTradeStatus::Paused))
        .await
        .unwrap();
    assert_eq!(paused.status, CopyTradeStatus::Paused);
    let history = &ledger.copy_trade_history(&session).await.unwrap()[0];
    assert_eq!(history.status, CopyTradeStatus::Paused);
    assert!(history.end_time.is_none());

    let patch = CopyTradePatch {
        enabled: Some(false),
        ..Default::default()
    };
    let disabled = ledger.update_config(&session, &id, patch).await.unwrap();
    assert_eq!(disabled.status, CopyTradeStatus::Stopped);
    assert!(!disabled.settings.enabled);

    let history = &ledger.copy_trade_history(&session).await.unwrap()[0];
    assert_eq!(history.status, CopyTradeStatus::Stopped);
    assert!(history.end_time.is_some());
}

#[tokio::test]
async fn test_update_merges_settings() {
    let (ledger, session, id) = setup(dec!(100)).await;

    let patch = CopyTradePatch {
        slippage: Some(dec!(0.0014)),
        tp_percent: Some(dec!(50)),
        ..Default::default()
    };
    let updated = ledger.update_config(&session, &id, patch).await.unwrap();
    assert_eq!(updated.settings.slippage, Some(dec!(0.0014)));
    assert_eq!(updated.settings.tp_percent, Some(dec!(50)));
    assert_eq!(updated.status, CopyTradeStatus::Running);
    assert_eq!(ledger.configs(&session).await.unwrap()[0], updated);
}

#[tokio::test]
async fn test_non_running_config_rejects_trades() {
    let (ledger, session, id) = setup(dec!(100)).await;

    for status in [CopyTradeStatus::Paused, CopyTradeStatus::Stopped] {
        ledger
            .update_config(&session, &id, CopyTradePatch::status(status))
            .await
            .unwrap();

        let err = assert_err!(
            ledger
                .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(10), dec!(1))
                .await
        );
        assert!(matches!(err, LedgerError::ConfigNotRunning { status: s, .. } if s == status));
    }

    assert!(ledger.trade_history(&session, None).await.unwrap().is_empty());
    assert_eq!(trading_wallet_balance(&ledger, &session).await, dec!(100));
}

#[tokio::test]
async fn test_delete_keeps_trade_records() {
    let (ledger, session, id) = setup(dec!(100)).await;
    ledger
        .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(150), dec!(1))
        .await
        .unwrap();

    assert_ok!(ledger.delete_config(&session, &id).await);
    assert!(ledger.configs(&session).await.unwrap().is_empty());
    assert_eq!(ledger.trade_history(&session, Some(&id)).await.unwrap().len(), 1);
    assert_eq!(ledger.copy_trade_history(&session).await.unwrap().len(), 1);
    assert_eq!(ledger.balance_changes(&session, None).await.unwrap().len(), 4);

    let err = assert_err!(ledger.delete_config(&session, &id).await);
    assert!(matches!(err, LedgerError::NotFound { kind: "CopyTrade", .. }));

    let err = assert_err!(
        ledger
            .update_config(&session, &id, CopyTradePatch::status(CopyTradeStatus::Paused))
            .await
    );
    assert!(matches!(err, LedgerError::NotFound { .. }));

    let err = assert_err!(
        ledger
            .execute_trade(&session, &id, TradeSide::Sell, "BONK", dec!(1), dec!(1))
            .await
    );
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_trade_history_filter() {
    let (ledger, session, first) = setup(dec!(100)).await;
    let second = ledger
        .create_config(&session, CopyTradeDraft::new("0xother"))
        .await
        .unwrap()
        .id;

    ledger
        .execute_trade(&session, &first, TradeSide::Buy, "A", dec!(150), dec!(1))
        .await
        .unwrap();
    ledger
        .execute_trade(&session, &second, TradeSide::Buy, "B", dec!(150), dec!(1))
        .await
        .unwrap();

    assert_eq!(ledger.trade_history(&session, None).await.unwrap().len(), 2);
    let only_second = ledger.trade_history(&session, Some(&second)).await.unwrap();
    assert_eq!(only_second.len(), 1);
    assert_eq!(only_second[0].token, "B");
    assert_eq!(only_second[0].source_address, "0xother");
    assert!(ledger
        .trade_history(&session, Some("copytrade-missing"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_record_balance_change_unknown_wallet() {
    let (ledger, session, _) = setup(dec!(100)).await;

    let err = assert_err!(
        ledger
            .record_balance_change(
                &session,
                "wallet-missing",
                BalanceChangeKind::Deposit,
                dec!(1),
                "nope",
                ChangeRefs::default(),
            )
            .await
    );
    assert!(matches!(err, LedgerError::NotFound { kind: "Wallet", .. }));
    assert_eq!(ledger.balance_changes(&session, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_balance_change_carries_refs() {
    let (ledger, session, id) = setup(dec!(100)).await;
    let wallet_id = ledger.wallets(&session).await.unwrap()[0].id.clone();

    let change = ledger
        .record_balance_change(
            &session,
            &wallet_id,
            BalanceChangeKind::Trade,
            dec!(-3),
            "manual trade",
            ChangeRefs::copy_trade(&id).with_trade("trade-manual"),
        )
        .await
        .unwrap();

    assert_eq!(change.balance_before, dec!(100));
    assert_eq!(change.balance_after, dec!(97));
    assert_eq!(change.copy_trade_id.as_deref(), Some(id.as_str()));
    assert_eq!(change.trade_id.as_deref(), Some("trade-manual"));
    assert_eq!(ledger.total_balance_usd(&session).await.unwrap(), dec!(14550));
}

#[tokio::test]
async fn test_deposit_and_withdraw_guards() {
    let (ledger, session, _) = setup(dec!(10)).await;
    let wallet_id = ledger.wallets(&session).await.unwrap()[0].id.clone();

    let err = assert_err!(ledger.deposit(&session, &wallet_id, Decimal::ZERO).await);
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    let err = assert_err!(ledger.withdraw(&session, &wallet_id, dec!(10.5)).await);
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    let change = ledger.withdraw(&session, &wallet_id, dec!(10)).await.unwrap();
    assert_eq!(change.kind, BalanceChangeKind::Withdraw);
    assert_eq!(change.amount, dec!(-10));
    assert_eq!(trading_wallet_balance(&ledger, &session).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_ensure_chain_wallet_funds_once() {
    let ledger = ledger_with_balance(dec!(1000));
    let session = ledger.login(EMAIL).await.unwrap();

    assert_eq!(ledger.chain_balance(&session, Chain::Eth).await.unwrap(), Decimal::ZERO);

    let balance = ledger.ensure_chain_wallet(&session, Chain::Eth).await.unwrap();
    assert_eq!(balance, dec!(1000));
    let wallets = ledger.wallets(&session).await.unwrap();
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[1].name, "Wallet1 (ETH)");
    assert_eq!(wallets[1].chain, Chain::Eth);

    // Already funded: no new wallet
    let balance = ledger.ensure_chain_wallet(&session, Chain::Eth).await.unwrap();
    assert_eq!(balance, dec!(1000));
    assert_eq!(ledger.wallets(&session).await.unwrap().len(), 2);
    assert_eq!(ledger.total_balance_usd(&session).await.unwrap(), dec!(300000));
}

#[tokio::test]
async fn test_ensure_chain_wallet_refunds_empty_chain() {
    let ledger = ledger_with_balance(dec!(5));
    let session = ledger.login(EMAIL).await.unwrap();
    let wallet_id = ledger.wallets(&session).await.unwrap()[0].id.clone();
    ledger.withdraw(&session, &wallet_id, dec!(5)).await.unwrap();

    let balance = ledger.ensure_chain_wallet(&session, Chain::Sol).await.unwrap();
    assert_eq!(balance, dec!(5));
    assert_eq!(ledger.wallets(&session).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_wallet_is_empty() {
    let (ledger, session, _) = setup(dec!(100)).await;

    let wallet = ledger
        .create_wallet(&session, "Sniper", "0xabc...1234", Chain::Bsc)
        .await
        .unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.chain, Chain::Bsc);

    let wallets = ledger.wallets(&session).await.unwrap();
    assert_eq!(wallets.len(), 2);
    // Trades still settle against the first wallet
    assert_eq!(wallets[0].balance, dec!(100));
}

#[tokio::test]
async fn test_logged_out_reads_empty_and_writes_fail() {
    let (ledger, _, id) = setup(dec!(100)).await;
    let anon = Session::logged_out();

    assert!(ledger.configs(&anon).await.unwrap().is_empty());
    assert!(ledger.wallets(&anon).await.unwrap().is_empty());
    assert!(ledger.trade_history(&anon, None).await.unwrap().is_empty());
    assert!(ledger.balance_changes(&anon, None).await.unwrap().is_empty());
    assert!(ledger.copy_trade_history(&anon).await.unwrap().is_empty());
    assert_eq!(ledger.total_balance_usd(&anon).await.unwrap(), Decimal::ZERO);
    assert_eq!(
        ledger.portfolio_summary(&anon).await.unwrap(),
        PortfolioSummary::default()
    );

    let err = assert_err!(ledger.create_config(&anon, CopyTradeDraft::new(SOURCE)).await);
    assert!(matches!(err, LedgerError::NotAuthenticated));

    let err = assert_err!(
        ledger
            .execute_trade(&anon, &id, TradeSide::Buy, "BONK", dec!(1), dec!(1))
            .await
    );
    assert!(matches!(err, LedgerError::NotAuthenticated));
}

#[tokio::test]
async fn test_logged_out_checks_session_before_amounts() {
    let (ledger, session, id) = setup(dec!(100)).await;
    let wallet_id = ledger.wallets(&session).await.unwrap()[0].id.clone();
    let anon = Session::logged_out();

    let err = assert_err!(
        ledger
            .execute_trade(&anon, &id, TradeSide::Buy, "BONK", Decimal::ZERO, dec!(1))
            .await
    );
    assert!(matches!(err, LedgerError::NotAuthenticated));

    let err = assert_err!(ledger.deposit(&anon, &wallet_id, dec!(-1)).await);
    assert!(matches!(err, LedgerError::NotAuthenticated));

    let err = assert_err!(ledger.withdraw(&anon, &wallet_id, Decimal::ZERO).await);
    assert!(matches!(err, LedgerError::NotAuthenticated));
}

#[tokio::test]
async fn test_oversized_trade_is_rejected_without_changes() {
    let (ledger, session, id) = setup(dec!(100)).await;
    let before = ledger.store().get_raw(EMAIL).await;

    for side in [TradeSide::Buy, TradeSide::Sell] {
        let err = assert_err!(
            ledger
                .execute_trade(&session, &id, side, "BIG", dec!(1e20), dec!(1e10))
                .await
        );
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    assert_eq!(ledger.store().get_raw(EMAIL).await, before);
    assert!(ledger.trade_history(&session, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_balance_change_is_rejected_without_changes() {
    let (ledger, session, _) = setup(dec!(100)).await;
    let wallet_id = ledger.wallets(&session).await.unwrap()[0].id.clone();
    let before = ledger.store().get_raw(EMAIL).await;

    let err = assert_err!(
        ledger
            .record_balance_change(
                &session,
                &wallet_id,
                BalanceChangeKind::Deposit,
                Decimal::MAX,
                "too much",
                ChangeRefs::default(),
            )
            .await
    );
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    // Fits as a balance but not once converted to USD
    let err = assert_err!(
        ledger
            .deposit(&session, &wallet_id, Decimal::MAX / dec!(100))
            .await
    );
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    assert_eq!(ledger.store().get_raw(EMAIL).await, before);
    assert_eq!(trading_wallet_balance(&ledger, &session).await, dec!(100));
}

#[tokio::test]
async fn test_idle_user_locks_are_pruned() {
    let ledger = ledger_with_balance(dec!(10));
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        ledger.login(email).await.unwrap();
    }
    assert_eq!(ledger.tracked_locks().await, 1);

    let session = ledger.login("a@example.com").await.unwrap();
    ledger
        .create_config(&session, CopyTradeDraft::new(SOURCE))
        .await
        .unwrap();
    assert_eq!(ledger.tracked_locks().await, 1);
}

#[tokio::test]
async fn test_unknown_user_reads_empty_without_provisioning() {
    let ledger = ledger_with_balance(dec!(100));
    let session = Session::for_email("ghost@example.com");

    assert!(ledger.wallets(&session).await.unwrap().is_empty());
    assert!(ledger.store().is_empty().await);
}

#[tokio::test]
async fn test_queries_are_idempotent() {
    let (ledger, session, id) = setup(dec!(100)).await;
    ledger
        .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(300), dec!(1))
        .await
        .unwrap();

    assert_eq!(
        ledger.wallets(&session).await.unwrap(),
        ledger.wallets(&session).await.unwrap()
    );
    assert_eq!(
        ledger.configs(&session).await.unwrap(),
        ledger.configs(&session).await.unwrap()
    );
    assert_eq!(
        ledger.trade_history(&session, None).await.unwrap(),
        ledger.trade_history(&session, None).await.unwrap()
    );
    assert_eq!(
        ledger.balance_changes(&session, None).await.unwrap(),
        ledger.balance_changes(&session, None).await.unwrap()
    );
    assert_eq!(
        ledger.portfolio_summary(&session).await.unwrap(),
        ledger.portfolio_summary(&session).await.unwrap()
    );
}

#[tokio::test]
async fn test_rejects_non_positive_trade_amount() {
    let (ledger, session, id) = setup(dec!(100)).await;
    let err = assert_err!(
        ledger
            .execute_trade(&session, &id, TradeSide::Buy, "BONK", Decimal::ZERO, dec!(1))
            .await
    );
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
}

#[tokio::test]
async fn test_portfolio_summary() {
    let (ledger, session, id) = setup(dec!(100)).await;
    ledger
        .create_config(&session, CopyTradeDraft::new("0xother"))
        .await
        .unwrap();
    ledger
        .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(1500), dec!(1))
        .await
        .unwrap();
    ledger
        .update_config(&session, &id, CopyTradePatch::status(CopyTradeStatus::Paused))
        .await
        .unwrap();

    let summary = ledger.portfolio_summary(&session).await.unwrap();
    assert_eq!(summary.email, EMAIL);
    assert_eq!(summary.total_balance, dec!(89.985));
    assert_eq!(summary.wallets, 1);
    assert_eq!((summary.running, summary.paused, summary.stopped), (1, 1, 0));
    assert_eq!(summary.total_spent, dec!(10));
    assert_eq!(summary.total_fees, dec!(0.015));
    assert_eq!(summary.total_trades, 1);
}

#[tokio::test]
async fn test_failed_save_leaves_state_untouched() {
    let store = FlakyStore::default();
    let ledger = CopyTradeLedger::new(store.clone(), LedgerConfig::default()).unwrap();
    let session = ledger.login(EMAIL).await.unwrap();
    let id = ledger
        .create_config(&session, CopyTradeDraft::new(SOURCE))
        .await
        .unwrap()
        .id;
    let before = store.inner.get_raw(EMAIL).await;

    store.fail_saves.store(true, Ordering::SeqCst);

    let err = assert_err!(ledger.create_config(&session, CopyTradeDraft::new("0xnew")).await);
    assert!(matches!(err, LedgerError::Persistence(_)));
    assert!(err.to_string().contains("disk full"));

    let err = assert_err!(
        ledger
            .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(150), dec!(1))
            .await
    );
    assert!(matches!(err, LedgerError::Persistence(_)));

    assert_eq!(store.inner.get_raw(EMAIL).await, before);
    assert_eq!(ledger.configs(&session).await.unwrap().len(), 1);
    assert_eq!(ledger.copy_trade_history(&session).await.unwrap().len(), 1);
    assert!(ledger.trade_history(&session, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_provisioning_creates_nothing() {
    let store = FlakyStore::default();
    store.fail_saves.store(true, Ordering::SeqCst);
    let ledger = CopyTradeLedger::new(store.clone(), LedgerConfig::default()).unwrap();

    let err = assert_err!(ledger.login(EMAIL).await);
    assert!(matches!(err, LedgerError::Persistence(_)));
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn test_corrupt_record_surfaces_on_reads_and_writes() {
    let ledger = ledger_with_balance(dec!(100));
    ledger.store().put_raw(EMAIL, "{\"schemaVersion\": 7, \"user\": {}}").await;
    let session = Session::for_email(EMAIL);

    let err = assert_err!(ledger.wallets(&session).await);
    assert!(matches!(err, LedgerError::Persistence(_)));

    let err = assert_err!(ledger.create_config(&session, CopyTradeDraft::new(SOURCE)).await);
    assert!(matches!(err, LedgerError::Persistence(_)));
}

#[tokio::test]
async fn test_legacy_record_gets_totals_recomputed() {
    let ledger = ledger_with_balance(dec!(100));
    let raw = r#"{
        "email": "trader@example.com",
        "wallets": [{"id": "wallet-1", "name": "Wallet1", "address": "0xcd...6a73",
                     "balance": 12, "usdValue": 0, "chain": "SOL"}],
        "copyTrades": [],
        "totalBalance": 0,
        "totalUsdValue": 0
    }"#;
    ledger.store().put_raw(EMAIL, raw).await;
    let session = Session::for_email(EMAIL);

    let wallets = ledger.wallets(&session).await.unwrap();
    assert_eq!(wallets[0].usd_value, dec!(1800));
    assert_eq!(ledger.total_balance_usd(&session).await.unwrap(), dec!(1800));

    // First write upgrades the record to the versioned envelope
    ledger
        .create_config(&session, CopyTradeDraft::new(SOURCE))
        .await
        .unwrap();
    let stored = ledger.store().get_raw(EMAIL).await.unwrap();
    assert!(stored.starts_with("{\"schemaVersion\":1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposits_serialize_per_user() {
    let ledger = Arc::new(ledger_with_balance(Decimal::ZERO));
    let session = ledger.login(EMAIL).await.unwrap();
    let wallet_id = ledger.wallets(&session).await.unwrap()[0].id.clone();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let ledger = Arc::clone(&ledger);
        let session = session.clone();
        let wallet_id = wallet_id.clone();
        handles.push(tokio::spawn(async move {
            ledger.deposit(&session, &wallet_id, dec!(0.5)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(trading_wallet_balance(&ledger, &session).await, dec!(10));
    // Initial zero deposit plus twenty deposits
    assert_eq!(ledger.balance_changes(&session, None).await.unwrap().len(), 21);
}

#[tokio::test]
async fn test_sqlite_backed_ledger() {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    let ledger = CopyTradeLedger::new(store, LedgerConfig::default()).unwrap();
    let session = ledger.login(EMAIL).await.unwrap();

    let id = ledger
        .create_config(&session, CopyTradeDraft::new(SOURCE))
        .await
        .unwrap()
        .id;
    ledger
        .execute_trade(&session, &id, TradeSide::Buy, "BONK", dec!(7500), dec!(1))
        .await
        .unwrap();

    // 50 SOL notional: fee 0.05, gas 0.005
    let wallets = ledger.wallets(&session).await.unwrap();
    assert_eq!(wallets[0].balance, dec!(949.945));
    assert_eq!(ledger.store().list_emails().await.unwrap(), vec![EMAIL]);
}
