use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal_macros::dec;

use binnaculum_core::cache::LookupCaches;
use binnaculum_core::errors::CoreError;
use binnaculum_core::models::account::{Account, AccountKey};
use binnaculum_core::models::movement::{Movement, MovementKind, TradeCode};
use binnaculum_core::models::settings::ReactiveSettings;
use binnaculum_core::models::ticker::Ticker;
use binnaculum_core::persistence::traits::MovementSource;
use binnaculum_core::services::{ImportState, MovementAggregator, PassOutcome};
use binnaculum_core::store::{Change, EntityStore};

mod common;
use common::*;

fn aggregator_with(
    store: &Arc<EntityStore>,
    source: &Arc<MockMovementSource>,
    settings: ReactiveSettings,
) -> (MovementAggregator, Arc<ImportState>) {
    let caches = Arc::new(LookupCaches::new(store));
    caches.initialize();
    let import_state = Arc::new(ImportState::new());
    let aggregator = MovementAggregator::new(
        Arc::clone(store),
        caches,
        Arc::clone(source) as Arc<dyn MovementSource>,
        Arc::clone(&import_state),
        &settings,
    );
    (aggregator, import_state)
}

fn aggregator(
    store: &Arc<EntityStore>,
    source: &Arc<MockMovementSource>,
) -> (MovementAggregator, Arc<ImportState>) {
    aggregator_with(store, source, ReactiveSettings::default())
}

/// Catalog with only the IBKR broker account.
fn single_account_store() -> Arc<EntityStore> {
    let store = seeded_store();
    store.remove_account(AccountKey::Broker(TASTY_ACCOUNT));
    store.remove_account(AccountKey::Bank(SAVINGS));
    store
}

fn keys(store: &EntityStore) -> Vec<(MovementKind, i32)> {
    store
        .movements
        .snapshot()
        .iter()
        .map(|m| (m.kind(), m.key().id))
        .collect()
}

fn has_movements(store: &EntityStore, key: AccountKey) -> bool {
    store
        .accounts
        .find(|a| a.key() == key)
        .map(|a| a.has_movements)
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════
// Feed construction
// ═══════════════════════════════════════════════════════════════════

mod feed {
    use super::*;

    #[tokio::test]
    async fn merges_every_account_newest_first() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        source.trades.lock().unwrap().push(trade(
            1,
            IBKR_ACCOUNT,
            AAPL,
            at(3, 10),
            dec!(5),
            dec!(170),
            TradeCode::BuyToOpen,
        ));
        source.bank_movements.lock().unwrap().push(bank_movement(1, SAVINGS, at(2, 10), dec!(250)));
        source.dividends.lock().unwrap().push(dividend(1, TASTY_ACCOUNT, at(4, 9), dec!(3.2)));

        let (aggregator, _) = aggregator(&store, &source);
        let outcome = aggregator.refresh_async().await.unwrap();

        assert_eq!(outcome, PassOutcome::Completed);
        assert_eq!(
            keys(&store),
            vec![
                (MovementKind::Dividend, 1),
                (MovementKind::Trade, 1),
                (MovementKind::BankAccountMovement, 1),
                (MovementKind::BrokerMovement, 1),
            ]
        );
    }

    #[tokio::test]
    async fn references_are_resolved_through_caches() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.trades.lock().unwrap().push(trade(
            7,
            IBKR_ACCOUNT,
            AAPL,
            at(3, 10),
            dec!(5),
            dec!(170),
            TradeCode::BuyToOpen,
        ));

        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();

        match &store.movements.snapshot()[0] {
            Movement::Trade(trade) => {
                assert_eq!(trade.ticker, aapl());
                assert_eq!(trade.broker_account, ibkr_account());
                assert_eq!(trade.currency.code, "USD");
            }
            other => panic!("expected a trade, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn each_account_keeps_its_newest_page() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        {
            let mut rows = source.broker_movements.lock().unwrap();
            for id in 1..=3 {
                rows.push(deposit(id, IBKR_ACCOUNT, at(id as u32, 10), dec!(100)));
            }
            rows.push(deposit(4, TASTY_ACCOUNT, at(1, 8), dec!(100)));
        }
        source.trades.lock().unwrap().push(trade(
            1,
            IBKR_ACCOUNT,
            AAPL,
            at(5, 10),
            dec!(1),
            dec!(170),
            TradeCode::BuyToOpen,
        ));

        let settings = ReactiveSettings {
            page_size: 2,
            ..ReactiveSettings::default()
        };
        let (aggregator, _) = aggregator_with(&store, &source, settings);
        aggregator.refresh_async().await.unwrap();

        // IBKR: trade + newest deposit only; Tasty's older deposit survives
        assert_eq!(
            keys(&store),
            vec![
                (MovementKind::Trade, 1),
                (MovementKind::BrokerMovement, 3),
                (MovementKind::BrokerMovement, 4),
            ]
        );
    }

    #[tokio::test]
    async fn same_timestamp_orders_stably() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        {
            let mut rows = source.broker_movements.lock().unwrap();
            rows.push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(100)));
            rows.push(deposit(2, IBKR_ACCOUNT, at(1, 10), dec!(100)));
        }
        source.dividends.lock().unwrap().push(dividend(1, IBKR_ACCOUNT, at(1, 10), dec!(1)));

        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();
        let first = keys(&store);
        aggregator.refresh_async().await.unwrap();

        assert_eq!(first, keys(&store));
        assert_eq!(
            first,
            vec![
                (MovementKind::Dividend, 1),
                (MovementKind::BrokerMovement, 2),
                (MovementKind::BrokerMovement, 1),
            ]
        );
    }

    #[tokio::test]
    async fn no_accounts_empty_feed() {
        let store = Arc::new(EntityStore::new());
        let source = MockMovementSource::new();

        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();

        assert!(store.movements.is_empty());
        assert_eq!(source.broker_calls(), 0);
    }

    #[tokio::test]
    async fn option_lots_are_settled_fifo() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        {
            let mut rows = source.option_trades.lock().unwrap();
            for id in 1..=5 {
                rows.push(option_row(id, IBKR_ACCOUNT, at(1, 9 + id as u32), TradeCode::SellToOpen, dec!(50)));
            }
            let mut closing = option_row(6, IBKR_ACCOUNT, at(2, 10), TradeCode::BuyToClose, dec!(-100));
            closing.quantity = 5;
            rows.push(closing);
        }

        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();

        let options: Vec<_> = store
            .movements
            .snapshot()
            .into_iter()
            .filter_map(|m| match m {
                Movement::OptionTrade(o) => Some(o),
                _ => None,
            })
            .collect();
        assert_eq!(options.len(), 6);
        let openings: Vec<_> = options.iter().filter(|o| o.code.is_opening()).collect();
        assert_eq!(openings.len(), 5);
        assert!(openings.iter().all(|o| !o.is_open && o.closed_with == Some(6)));
        assert!(options.iter().all(|o| !o.is_open));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Minimal edits
// ═══════════════════════════════════════════════════════════════════

mod minimal_edits {
    use super::*;

    #[tokio::test]
    async fn unchanged_refresh_notifies_nobody() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        let (aggregator, _) = aggregator(&store, &source);

        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let _sub = store.movements.subscribe(move |changes: &[Change<Movement>]| {
            sink.lock().unwrap().push(changes.len());
        });

        aggregator.refresh_async().await.unwrap();
        aggregator.refresh_async().await.unwrap();

        assert_eq!(*batches.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn new_movement_is_a_single_insert_at_head() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();

        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let _sub = store.movements.subscribe(move |changes: &[Change<Movement>]| {
            sink.lock().unwrap().push(changes.to_vec());
        });

        source.broker_movements.lock().unwrap().push(deposit(2, IBKR_ACCOUNT, at(9, 10), dec!(5)));
        aggregator.refresh_async().await.unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert!(matches!(
            batches[0].as_slice(),
            [Change::Added { index: 0, item }] if item.key().id == 2
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// has_movements flags
// ═══════════════════════════════════════════════════════════════════

mod flags {
    use super::*;

    #[tokio::test]
    async fn flags_follow_persisted_movements() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        source.bank_movements.lock().unwrap().push(bank_movement(1, SAVINGS, at(2, 10), dec!(250)));

        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();

        assert!(has_movements(&store, AccountKey::Broker(IBKR_ACCOUNT)));
        assert!(!has_movements(&store, AccountKey::Broker(TASTY_ACCOUNT)));
        assert!(has_movements(&store, AccountKey::Bank(SAVINGS)));
    }

    #[tokio::test]
    async fn broker_flag_survives_a_truncated_page() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.option_trades.lock().unwrap().push(option_row(
            1,
            TASTY_ACCOUNT,
            at(1, 10),
            TradeCode::SellToOpen,
            dec!(50),
        ));

        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();
        assert!(has_movements(&store, AccountKey::Broker(TASTY_ACCOUNT)));
    }

    #[tokio::test]
    async fn flags_clear_when_movements_go_away() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.bank_movements.lock().unwrap().push(bank_movement(1, SAVINGS, at(2, 10), dec!(250)));
        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();
        assert!(has_movements(&store, AccountKey::Bank(SAVINGS)));

        source.bank_movements.lock().unwrap().clear();
        aggregator.refresh_async().await.unwrap();
        assert!(!has_movements(&store, AccountKey::Bank(SAVINGS)));
    }

    #[tokio::test]
    async fn unchanged_flags_are_not_rewritten() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        let (aggregator, _) = aggregator(&store, &source);

        let writes = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&writes);
        let _sub = store.accounts.subscribe(move |_: &[Change<Account>]| {
            *sink.lock().unwrap() += 1;
        });

        aggregator.refresh_async().await.unwrap();
        assert_eq!(*writes.lock().unwrap(), 0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════

mod failures {
    use super::*;

    #[tokio::test]
    async fn unresolved_reference_keeps_last_good_feed() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        let (aggregator, _) = aggregator(&store, &source);
        aggregator.refresh_async().await.unwrap();
        let before = store.movements.snapshot();

        source.trades.lock().unwrap().push(trade(
            1,
            IBKR_ACCOUNT,
            99,
            at(2, 10),
            dec!(1),
            dec!(10),
            TradeCode::BuyToOpen,
        ));
        let err = aggregator.refresh_async().await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::AggregationFailure { ref stage, ref message }
                if stage == "conversion" && message.contains("Ticker")
        ));
        assert_eq!(store.movements.snapshot(), before);
        assert!(!aggregator.is_loading());
    }

    #[tokio::test]
    async fn persistence_error_is_returned() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.fail.store(true, Ordering::SeqCst);
        let (aggregator, _) = aggregator(&store, &source);

        let err = aggregator.refresh_async().await.unwrap_err();
        assert!(matches!(err, CoreError::Persistence(_)));
        assert!(store.movements.is_empty());

        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(aggregator.refresh_async().await.unwrap(), PassOutcome::Completed);
    }

    #[tokio::test]
    async fn ticker_added_later_lets_the_pass_succeed() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        source.trades.lock().unwrap().push(trade(
            1,
            IBKR_ACCOUNT,
            3,
            at(2, 10),
            dec!(1),
            dec!(10),
            TradeCode::BuyToOpen,
        ));
        let (aggregator, _) = aggregator(&store, &source);
        assert!(aggregator.refresh_async().await.is_err());

        store.upsert_ticker(Ticker::new(3, "MSFT"));
        aggregator.refresh_async().await.unwrap();
        assert_eq!(store.movements.len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Import suppression
// ═══════════════════════════════════════════════════════════════════

mod suppression {
    use super::*;

    #[tokio::test]
    async fn refresh_during_import_reads_nothing() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        let (aggregator, import_state) = aggregator(&store, &source);

        let guard = import_state.begin_import();
        let outcome = aggregator.refresh_async().await.unwrap();
        assert_eq!(outcome, PassOutcome::SuppressedByImport);
        assert_eq!(source.broker_calls(), 0);
        assert!(store.movements.is_empty());

        drop(guard);
        assert_eq!(aggregator.refresh_async().await.unwrap(), PassOutcome::Completed);
        assert_eq!(store.movements.len(), 1);
    }

    #[tokio::test]
    async fn nested_imports_suppress_until_the_last_ends() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        let (aggregator, import_state) = aggregator(&store, &source);

        let outer = import_state.begin_import();
        let inner = import_state.begin_import();
        drop(inner);
        assert_eq!(
            aggregator.refresh_async().await.unwrap(),
            PassOutcome::SuppressedByImport
        );
        drop(outer);
        assert!(!import_state.is_import_in_progress());
        assert_eq!(aggregator.refresh_async().await.unwrap(), PassOutcome::Completed);
    }

    #[tokio::test]
    async fn reactive_triggers_are_skipped_during_import() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        let (aggregator, import_state) = aggregator(&store, &source);
        let guard = import_state.begin_import();

        aggregator.initialize().unwrap();
        store.upsert_ticker(Ticker::new(3, "MSFT"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(source.broker_calls(), 0);
        drop(guard);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Reentrancy
// ═══════════════════════════════════════════════════════════════════

mod reentrancy {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn awaited_refreshes_never_overlap() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        source.set_delay(Duration::from_millis(50));
        let (aggregator, _) = aggregator(&store, &source);

        let (a, b, c) = tokio::join!(
            aggregator.refresh_async(),
            aggregator.refresh_async(),
            aggregator.refresh_async(),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(source.broker_calls(), 3);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn triggers_while_loading_are_dropped() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        source.set_delay(Duration::from_millis(300));
        let (aggregator, _) = aggregator(&store, &source);

        aggregator.initialize().unwrap();
        assert!(eventually(|| aggregator.is_loading()).await);

        for _ in 0..5 {
            aggregator.refresh();
        }
        store.upsert_ticker(Ticker::new(3, "MSFT"));

        assert!(eventually(|| !aggregator.is_loading()).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.broker_calls(), 1);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn awaited_refresh_waits_for_the_running_pass() {
        let store = single_account_store();
        let source = MockMovementSource::new();
        source.set_delay(Duration::from_millis(200));
        let (aggregator, _) = aggregator(&store, &source);

        aggregator.initialize().unwrap();
        assert!(eventually(|| aggregator.is_loading()).await);

        assert_eq!(aggregator.refresh_async().await.unwrap(), PassOutcome::Completed);
        assert_eq!(source.broker_calls(), 2);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════

mod lifecycle {
    use super::*;

    #[test]
    fn initialize_outside_a_runtime_fails() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        let (aggregator, _) = aggregator(&store, &source);

        let err = aggregator.initialize().unwrap_err();
        assert!(matches!(err, CoreError::NoRuntime(_)));
        assert!(!aggregator.is_initialized());
    }

    #[tokio::test]
    async fn initialize_runs_a_first_pass() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        let (aggregator, _) = aggregator(&store, &source);

        aggregator.initialize().unwrap();
        assert!(aggregator.is_initialized());
        assert!(eventually(|| store.movements.len() == 1).await);
    }

    #[tokio::test]
    async fn source_collection_changes_trigger_a_pass() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        let (aggregator, _) = aggregator(&store, &source);
        aggregator.initialize().unwrap();
        assert!(eventually(|| !aggregator.is_loading() && source.broker_calls() == 2).await);

        source.bank_movements.lock().unwrap().push(bank_movement(1, SAVINGS, at(2, 10), dec!(250)));
        store.upsert_currency(binnaculum_core::models::currency::Currency::new(
            EUR, "EUR", "€", "Euro (EMU)",
        ));

        assert!(eventually(|| store.movements.len() == 1).await);
    }

    #[tokio::test]
    async fn disposed_aggregator_stops_reacting() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        let (aggregator, _) = aggregator(&store, &source);
        aggregator.initialize().unwrap();
        assert!(eventually(|| !aggregator.is_loading() && source.broker_calls() == 2).await);

        aggregator.dispose();
        assert!(!aggregator.is_initialized());
        source.broker_movements.lock().unwrap().push(deposit(1, IBKR_ACCOUNT, at(1, 10), dec!(1000)));
        store.upsert_ticker(Ticker::new(3, "MSFT"));
        aggregator.refresh();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.movements.is_empty());
        // Awaited refresh still works after dispose
        aggregator.refresh_async().await.unwrap();
        assert_eq!(store.movements.len(), 1);
    }

    #[tokio::test]
    async fn debug_shows_state() {
        let store = seeded_store();
        let source = MockMovementSource::new();
        let (aggregator, _) = aggregator(&store, &source);

        let text = format!("{aggregator:?}");
        assert!(text.contains("MovementAggregator"));
        assert!(text.contains("page_size: 50"));
    }
}
