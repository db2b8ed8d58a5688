//! End-to-end chapter replay through the market.
//!
//! Loads the shipped `config.toml`, lists its assets, replays every
//! scripted chapter and checks the headline pricing scenarios against the results.

use stockpiece::config::{AppConfig, PricingConfig};
use stockpiece::engine::{Market, PricingEngine};
use stockpiece::types::Side;

fn shipped_config() -> AppConfig {
    AppConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap()
}

fn replay(cfg: &AppConfig) -> (Market, Vec<stockpiece::types::PeriodReport>) {
    let mut market = Market::new(PricingEngine::new(cfg.pricing.clone()).unwrap());
    for seed in &cfg.assets {
        market.list(&seed.name, seed.price, seed.circulation).unwrap();
    }
    let mut reports = Vec::new();
    for period in &cfg.periods {
        for trade in &period.trades {
            market.record_trade(&trade.asset, trade.side, trade.quantity).unwrap();
        }
        reports.push(market.close_period().unwrap());
    }
    (market, reports)
}

#[test]
fn test_shipped_scenario_replays() {
    let cfg = shipped_config();
    let (market, reports) = replay(&cfg);

    assert_eq!(market.chapter(), cfg.periods.len() as u64);
    assert_eq!(reports.len(), cfg.periods.len());
    for asset in market.assets() {
        assert_eq!(asset.history.len(), cfg.periods.len());
        assert!(asset.price >= cfg.pricing.floor_price);
        assert_eq!(asset.pending_volume(), 0.0);
    }
}

#[test]
fn test_shipped_scenario_first_chapter() {
    let cfg = shipped_config();
    let (_, reports) = replay(&cfg);
    let first = &reports[0];
    let engine = PricingEngine::new(cfg.pricing.clone()).unwrap();

    // Pure buying on a zero-circulation listing: up, but capped.
    let luffy = first.update_for("Luffy").unwrap();
    assert!(luffy.new_price > 1000.0);
    assert!(luffy.percent_change <= engine.max_change_percent(1000.0) + 1e-9);

    // Net-neutral volume never moves price.
    let zoro = first.update_for("Zoro").unwrap();
    assert_eq!(zoro.new_price, 750.0);

    // One-sided selling.
    let usopp = first.update_for("Usopp").unwrap();
    assert!(usopp.new_price < 50.0);
}

#[test]
fn test_last_chapter_is_quiet() {
    let cfg = shipped_config();
    let (market, reports) = replay(&cfg);
    let last = reports.last().unwrap();
    assert_eq!(last.movers(), 0);
    for asset in market.assets() {
        let n = asset.history.len();
        assert_eq!(asset.history[n - 1].price, asset.history[n - 2].price);
    }
}

#[test]
fn test_asymmetric_policy_crashes_faster() {
    let run = |asymmetric_drop: bool| {
        let engine = PricingEngine::new(PricingConfig {
            asymmetric_drop,
            ..PricingConfig::default()
        })
        .unwrap();
        let mut market = Market::new(engine);
        market.list("Usopp", 50.0, 5000.0).unwrap();
        market.record_trade("Usopp", Side::Sell, 200.0).unwrap();
        market.close_period().unwrap()
    };

    let symmetric = run(false);
    let asymmetric = run(true);
    let s = symmetric.update_for("Usopp").unwrap();
    let a = asymmetric.update_for("Usopp").unwrap();
    assert!(a.percent_change < s.percent_change);
    assert!(a.percent_change.abs() > s.percent_change.abs());
}

#[test]
fn test_rejected_trade_leaves_market_consistent() {
    let mut market = Market::new(PricingEngine::new(PricingConfig::default()).unwrap());
    market.list("Nami", 100.0, 100.0).unwrap();
    assert!(market.record_trade("Nami", Side::Buy, -5.0).is_err());
    assert!(market.record_trade("Arlong", Side::Buy, 5.0).is_err());

    let report = market.close_period().unwrap();
    assert_eq!(report.update_for("Nami").unwrap().new_price, 100.0);
}

#[test]
fn test_multi_chapter_rally_then_selloff() {
    let mut market = Market::new(PricingEngine::new(PricingConfig::chapter_market()).unwrap());
    market.list("Luffy", 200.0, 1000.0).unwrap();

    let mut last = 200.0;
    for _ in 0..3 {
        market.record_trade("Luffy", Side::Buy, 300.0).unwrap();
        market.close_period().unwrap();
        let price = market.get("Luffy").unwrap().price;
        assert!(price > last);
        last = price;
    }
    for _ in 0..3 {
        market.record_trade("Luffy", Side::Sell, 400.0).unwrap();
        market.close_period().unwrap();
        let price = market.get("Luffy").unwrap().price;
        assert!(price < last);
        assert!(price >= 10.0);
        last = price;
    }

    let luffy = market.get("Luffy").unwrap();
    assert_eq!(luffy.history.len(), 6);
    assert_eq!(luffy.circulation, 1000.0 + 900.0 - 1200.0);
}

#[test]
fn test_tanh_policy_replays_through_market() {
    let cfg = AppConfig::parse(
        r#"
        [pricing.model]
        kind = "tanh"

        [[assets]]
        name = "Luffy"
        price = 1000.0
        circulation = 100.0

        [[assets]]
        name = "Usopp"
        price = 50.0
        circulation = 100.0

        [[periods]]
        trades = [
            { asset = "Luffy", side = "buy", quantity = 150 },
            { asset = "Usopp", side = "sell", quantity = 10 },
        ]

        [[periods]]
        "#,
    )
    .unwrap();
    let (market, reports) = replay(&cfg);

    let luffy = reports[0].update_for("Luffy").unwrap();
    assert!((luffy.new_price - 1098.661429815143).abs() < 1e-9);
    let usopp = reports[0].update_for("Usopp").unwrap();
    assert!(usopp.new_price < 50.0);
    assert!(usopp.percent_change >= -10.0);

    assert_eq!(reports[1].movers(), 0);
    assert_eq!(market.get("Luffy").unwrap().circulation, 100.0);
}
