//! Traffic-light severity derivations.
//!
//! Badges are derived, never stored: each function is a pure projection of
//! one payload into {green, orange, red}, recomputed on every poll.

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use crate::rolls::protocol::RollReport;
use crate::status::models::{
    CapitalReport, LiquidityEntry, PriceUpdate, ProcessReport, ProcessTag, ReconcileReport,
};

/// Tri-state health indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Green,
    Orange,
    Red,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::Green => "green",
            Badge::Orange => "orange",
            Badge::Red => "red",
        }
    }

    /// Red dominates orange dominates green.
    pub fn worst(self, other: Badge) -> Badge {
        fn rank(b: Badge) -> u8 {
            match b {
                Badge::Green => 0,
                Badge::Orange => 1,
                Badge::Red => 2,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

/// Overall process health: the designated primary process decides the badge.
/// Running => green, crashed => red, anything else => orange. A missing
/// primary row counts as "other".
pub fn process_badge(report: &ProcessReport, primary_process: &str) -> Badge {
    match report.process.get(primary_process).map(|e| &e.status) {
        Some(ProcessTag::Running) => Badge::Green,
        Some(ProcessTag::Crashed) => Badge::Red,
        _ => Badge::Orange,
    }
}

/// Price staleness of one instrument, in days before `now`.
fn age_days(update: &PriceUpdate, now: DateTime<Utc>) -> f64 {
    (now - update.last_update).num_seconds() as f64 / 86_400.0
}

/// Price freshness badge plus the instruments flagged stale.
///
/// `most_recent_diff` is the age of the freshest instrument. Any instrument
/// lagging more than a day behind the freshest is flagged red; otherwise if
/// even the freshest update is over a day old the whole panel is orange.
pub fn prices_badge<'a>(
    prices: impl IntoIterator<Item = (&'a String, &'a PriceUpdate)>,
    now: DateTime<Utc>,
) -> (Badge, Vec<String>) {
    let ages: Vec<(&String, f64)> = prices
        .into_iter()
        .map(|(code, update)| (code, age_days(update, now)))
        .collect();

    let most_recent_diff = ages
        .iter()
        .map(|(_, age)| *age)
        .fold(f64::INFINITY, f64::min);

    if ages.is_empty() {
        return (Badge::Green, Vec::new());
    }

    let stale: Vec<String> = ages
        .iter()
        .filter(|(_, age)| age - most_recent_diff > 1.0)
        .map(|(code, _)| (*code).clone())
        .collect();

    let badge = if !stale.is_empty() {
        Badge::Red
    } else if most_recent_diff > 1.0 {
        Badge::Orange
    } else {
        Badge::Green
    };

    (badge, stale)
}

/// Reconciliation badge: any position break (db vs broker or own vs broker)
/// is red; otherwise any strategy current/optimal break is orange.
pub fn reconcile_badge(report: &ReconcileReport) -> Badge {
    let mut overall = Badge::Green;
    if report.has_strategy_break() {
        overall = overall.worst(Badge::Orange);
    }
    if report.has_position_break() {
        overall = overall.worst(Badge::Red);
    }
    overall
}

/// Capital badge: red on any decline from yesterday.
pub fn capital_badge(report: &CapitalReport) -> Badge {
    if report.now >= report.yesterday {
        Badge::Green
    } else {
        Badge::Red
    }
}

/// Per-instrument liquidity flags: (thin volume, thin risk-adjusted volume).
/// Each is flagged independently.
pub fn liquidity_flags(entry: &LiquidityEntry) -> (bool, bool) {
    (entry.contracts < 100.0, entry.risk < 1.5)
}

/// Roll urgency: any expired roll is red, any roll due within five days is
/// orange, red dominates.
pub fn rolls_badge(report: &RollReport) -> Badge {
    let mut overall = Badge::Green;
    for record in report.values() {
        if record.roll_expiry < 0 {
            overall = overall.worst(Badge::Red);
        } else if record.roll_expiry < 5 {
            overall = overall.worst(Badge::Orange);
        }
    }
    overall
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rolls::protocol::RollRecord;
    use crate::status::models::{ProcessEntry, StrategyPosition};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn entry(status: ProcessTag) -> ProcessEntry {
        ProcessEntry {
            status,
            detail: BTreeMap::new(),
        }
    }

    fn roll(expiry: i64) -> RollRecord {
        RollRecord {
            status: "No_Roll".to_string(),
            roll_expiry: expiry,
            carry_expiry: expiry + 10,
            price_expiry: expiry + 20,
            contract_labels: Vec::new(),
            positions: Vec::new(),
            volumes: Vec::new(),
            allowable: Vec::new(),
        }
    }

    #[test]
    fn worst_is_red_dominant() {
        assert_eq!(Badge::Green.worst(Badge::Orange), Badge::Orange);
        assert_eq!(Badge::Red.worst(Badge::Orange), Badge::Red);
        assert_eq!(Badge::Orange.worst(Badge::Red), Badge::Red);
        assert_eq!(Badge::Green.worst(Badge::Green), Badge::Green);
    }

    #[test]
    fn primary_process_drives_badge() {
        let mut report = ProcessReport {
            process: BTreeMap::new(),
            price: BTreeMap::new(),
            config: BTreeMap::new(),
        };
        report
            .process
            .insert("run_stack_handler".to_string(), entry(ProcessTag::Running));
        report
            .process
            .insert("run_capital_update".to_string(), entry(ProcessTag::Crashed));
        // Only the primary process matters for the overall badge.
        assert_eq!(process_badge(&report, "run_stack_handler"), Badge::Green);

        report
            .process
            .insert("run_stack_handler".to_string(), entry(ProcessTag::Crashed));
        assert_eq!(process_badge(&report, "run_stack_handler"), Badge::Red);

        report
            .process
            .insert("run_stack_handler".to_string(), entry(ProcessTag::Other));
        assert_eq!(process_badge(&report, "run_stack_handler"), Badge::Orange);

        report.process.remove("run_stack_handler");
        assert_eq!(process_badge(&report, "run_stack_handler"), Badge::Orange);
    }

    #[test]
    fn prices_freshness_variants() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let fresh = PriceUpdate {
            last_update: now - chrono::Duration::hours(2),
        };
        let lagging = PriceUpdate {
            last_update: now - chrono::Duration::hours(40),
        };
        let old = PriceUpdate {
            last_update: now - chrono::Duration::hours(30),
        };

        let mut prices = BTreeMap::new();
        prices.insert("EDOLLAR".to_string(), fresh.clone());
        prices.insert("CORN".to_string(), fresh.clone());
        let (badge, stale) = prices_badge(&prices, now);
        assert_eq!(badge, Badge::Green);
        assert!(stale.is_empty());

        // One instrument more than a day behind the freshest: red.
        prices.insert("CORN".to_string(), lagging);
        let (badge, stale) = prices_badge(&prices, now);
        assert_eq!(badge, Badge::Red);
        assert_eq!(stale, vec!["CORN".to_string()]);

        // Everything equally old: orange, nothing individually flagged.
        let mut prices = BTreeMap::new();
        prices.insert("EDOLLAR".to_string(), old.clone());
        prices.insert("CORN".to_string(), old);
        let (badge, stale) = prices_badge(&prices, now);
        assert_eq!(badge, Badge::Orange);
        assert!(stale.is_empty());

        let empty: BTreeMap<String, PriceUpdate> = BTreeMap::new();
        assert_eq!(prices_badge(&empty, now).0, Badge::Green);
    }

    #[test]
    fn reconcile_red_dominates_orange() {
        let mut report = ReconcileReport {
            gateway_ok: true,
            strategy: BTreeMap::new(),
            positions: BTreeMap::new(),
            db_breaks: Vec::new(),
            broker_breaks: Vec::new(),
        };
        assert_eq!(reconcile_badge(&report), Badge::Green);

        report.strategy.insert(
            "medium_speed/EDOLLAR".to_string(),
            StrategyPosition {
                current: 2.0,
                optimal: "1.2 to 1.8".to_string(),
                breached: true,
            },
        );
        assert_eq!(reconcile_badge(&report), Badge::Orange);

        report.broker_breaks.push("EDOLLAR".to_string());
        assert_eq!(reconcile_badge(&report), Badge::Red);

        // Position break alone is still red.
        report.strategy.clear();
        assert_eq!(reconcile_badge(&report), Badge::Red);
    }

    #[test]
    fn capital_red_on_decline() {
        assert_eq!(
            capital_badge(&CapitalReport {
                now: 950_000.0,
                yesterday: 1_000_000.0
            }),
            Badge::Red
        );
        assert_eq!(
            capital_badge(&CapitalReport {
                now: 1_000_000.0,
                yesterday: 1_000_000.0
            }),
            Badge::Green
        );
    }

    #[test]
    fn liquidity_thresholds_are_independent() {
        assert_eq!(
            liquidity_flags(&LiquidityEntry {
                contracts: 50.0,
                risk: 2.0
            }),
            (true, false)
        );
        assert_eq!(
            liquidity_flags(&LiquidityEntry {
                contracts: 500.0,
                risk: 1.0
            }),
            (false, true)
        );
        assert_eq!(
            liquidity_flags(&LiquidityEntry {
                contracts: 500.0,
                risk: 2.0
            }),
            (false, false)
        );
    }

    #[test]
    fn rolls_badge_thresholds() {
        let mut report = RollReport::new();
        report.insert("EDOLLAR".to_string(), roll(30));
        assert_eq!(rolls_badge(&report), Badge::Green);

        report.insert("CORN".to_string(), roll(4));
        assert_eq!(rolls_badge(&report), Badge::Orange);

        report.insert("GAS_US".to_string(), roll(-2));
        assert_eq!(rolls_badge(&report), Badge::Red);

        // Red holds even when later rows are merely close to expiry.
        report.insert("WHEAT".to_string(), roll(3));
        assert_eq!(rolls_badge(&report), Badge::Red);
    }
}
