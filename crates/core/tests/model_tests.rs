use std::sync::Arc;
use std::time::Duration;

use binnaculum_core::errors::CoreError;
use binnaculum_core::models::account::{Account, AccountKey};
use binnaculum_core::models::broker::SupportedBroker;
use binnaculum_core::models::currency::Currency;
use binnaculum_core::models::import::ImportMetadata;
use binnaculum_core::models::movement::TradeCode;
use binnaculum_core::models::settings::{ReactiveSettings, DEFAULT_PAGE_SIZE};
use binnaculum_core::models::snapshot::{OverviewSnapshot, SnapshotKey, SnapshotKind};
use binnaculum_core::models::ticker::Ticker;
use binnaculum_core::services::ImportState;

mod common;
use common::*;

// ═══════════════════════════════════════════════════════════════════
// ReactiveSettings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn defaults() {
        let settings = ReactiveSettings::default();
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.movements_debounce(), None);
        assert_eq!(settings.snapshots_debounce(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings = ReactiveSettings::from_json(r#"{ "movements_debounce_ms": 250 }"#).unwrap();
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.movements_debounce(), Some(Duration::from_millis(250)));
        assert_eq!(settings.snapshots_debounce(), None);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(
            ReactiveSettings::from_json("{}").unwrap(),
            ReactiveSettings::default()
        );
    }

    #[test]
    fn zero_debounce_means_off() {
        let settings = ReactiveSettings {
            snapshots_debounce_ms: Some(0),
            ..ReactiveSettings::default()
        };
        assert_eq!(settings.snapshots_debounce(), None);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = ReactiveSettings::from_json(r#"{ "page_size": 0 }"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_a_deserialization_error() {
        let err = ReactiveSettings::from_json(r#"{ "page_size": "many" }"#).unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn survives_serialization() {
        let settings = ReactiveSettings {
            page_size: 20,
            movements_debounce_ms: Some(100),
            snapshots_debounce_ms: None,
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(ReactiveSettings::from_json(&json).unwrap(), settings);
    }
}

// ═══════════════════════════════════════════════════════════════════
// ImportMetadata & ImportState
// ═══════════════════════════════════════════════════════════════════

mod import {
    use super::*;

    #[test]
    fn fresh_metadata_is_empty() {
        let metadata = ImportMetadata::new();
        assert!(metadata.is_empty());
        assert_eq!(metadata.total_movements, 0);
        assert_eq!(metadata.oldest_movement, None);
    }

    #[test]
    fn touches_accumulate() {
        let mut metadata = ImportMetadata::new();
        metadata.touch_broker_account(IBKR_ACCOUNT, at(5, 10));
        metadata.touch_broker_account(IBKR_ACCOUNT, at(2, 10));
        metadata.touch_bank_account(SAVINGS, at(7, 10));
        metadata.touch_ticker(AAPL);

        assert!(!metadata.is_empty());
        assert_eq!(metadata.broker_account_ids.len(), 1);
        assert!(metadata.bank_account_ids.contains(&SAVINGS));
        assert!(metadata.ticker_ids.contains(&AAPL));
        assert_eq!(metadata.total_movements, 3);
        assert_eq!(metadata.oldest_movement, Some(at(2, 10)));
    }

    #[test]
    fn tickers_alone_do_not_make_it_non_empty() {
        let mut metadata = ImportMetadata::new();
        metadata.touch_ticker(SPY);
        assert!(metadata.is_empty());
    }

    #[test]
    fn every_batch_gets_its_own_id() {
        assert_ne!(ImportMetadata::new().import_id, ImportMetadata::new().import_id);
    }

    #[test]
    fn guard_lowers_the_flag_on_drop() {
        let state = Arc::new(ImportState::new());
        assert!(!state.is_import_in_progress());
        {
            let _guard = state.begin_import();
            assert!(state.is_import_in_progress());
        }
        assert!(!state.is_import_in_progress());
    }

    #[test]
    fn nested_guards() {
        let state = Arc::new(ImportState::new());
        let outer = state.begin_import();
        let inner = state.begin_import();
        drop(outer);
        assert!(state.is_import_in_progress());
        drop(inner);
        assert!(!state.is_import_in_progress());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Catalog & accounts
// ═══════════════════════════════════════════════════════════════════

mod catalog {
    use super::*;

    #[test]
    fn codes_and_symbols_are_uppercase() {
        assert_eq!(Currency::new(9, "chf", "Fr", "Swiss Franc").code, "CHF");
        assert_eq!(Ticker::new(9, "msft").symbol, "MSFT");
        assert_eq!(aapl().name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn account_keys() {
        assert_eq!(Account::broker(ibkr_account()).key(), AccountKey::Broker(IBKR_ACCOUNT));
        assert_eq!(Account::bank(savings_account()).key(), AccountKey::Bank(SAVINGS));
        assert_eq!(Account::empty().key(), AccountKey::Empty);
    }

    #[test]
    fn account_payload_is_exclusive() {
        let broker = Account::broker(ibkr_account());
        assert!(broker.broker_account().is_some());
        assert!(broker.bank_account().is_none());

        let empty = Account::empty();
        assert!(empty.broker_account().is_none() && empty.bank_account().is_none());
    }

    #[test]
    fn has_movements_defaults_when_missing() {
        let mut json = serde_json::to_value(Account::bank(savings_account())).unwrap();
        json.as_object_mut().unwrap().remove("has_movements");

        let account: Account = serde_json::from_value(json).unwrap();
        assert!(!account.has_movements);
        assert_eq!(account.bank_account(), Some(&savings_account()));
    }

    #[test]
    fn supported_broker_display() {
        assert_eq!(SupportedBroker::IBKR.to_string(), "IBKR");
        assert_eq!(SupportedBroker::Tastytrade.to_string(), "Tastytrade");
    }

    #[test]
    fn trade_code_helpers() {
        assert!(TradeCode::BuyToOpen.is_opening());
        assert!(!TradeCode::SellToClose.is_opening());
        assert_eq!(
            TradeCode::BuyToClose.opening_counterpart(),
            Some(TradeCode::SellToOpen)
        );
        assert_eq!(TradeCode::BuyToOpen.opening_counterpart(), None);
        assert_eq!(TradeCode::SellToOpen.position_sign(), -1);
    }

    #[test]
    fn empty_snapshot_identity() {
        let empty = OverviewSnapshot::Empty;
        assert!(empty.is_empty());
        assert_eq!(empty.kind(), SnapshotKind::Empty);
        assert_eq!(empty.key(), SnapshotKey::Empty);
    }
}
