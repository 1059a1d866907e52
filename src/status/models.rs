//! Payload types for the read-only status resources.
//!
//! Every payload is an ephemeral view model rebuilt on each poll; nothing
//! here is cached between polls. Optional sections use `#[serde(default)]`
//! so a missing field degrades the render instead of failing the poll.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::severity::Badge;

/// Generic keyed table: row key -> column -> value. Used by the pure
/// tabular projections (costs, risk, trades, strategy) where the client
/// does not interpret individual columns.
pub type KeyedRows = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// Row-list table for record-oriented payloads (P&L).
pub type RecordRows = Vec<BTreeMap<String, serde_json::Value>>;

/// Health tag for a single controlled process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessTag {
    Running,
    Crashed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub status: ProcessTag,
    /// Free-form detail columns (start time, pid, machine...).
    #[serde(flatten)]
    pub detail: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub last_update: DateTime<Utc>,
}

/// `/processes`: process control status plus price freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReport {
    pub process: BTreeMap<String, ProcessEntry>,
    #[serde(default)]
    pub price: BTreeMap<String, PriceUpdate>,
    /// Server connection summary lines (monitor, db, broker gateway).
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPosition {
    pub current: f64,
    pub optimal: String,
    #[serde(rename = "break")]
    pub breached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRow {
    pub code: String,
    pub contract_date: String,
    pub db_position: f64,
    pub broker_position: f64,
}

/// `/reconcile`: strategy-level and contract-level position breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub gateway_ok: bool,
    #[serde(default)]
    pub strategy: BTreeMap<String, StrategyPosition>,
    #[serde(default)]
    pub positions: BTreeMap<String, PositionRow>,
    /// Instrument codes whose db position disagrees with ours.
    #[serde(default)]
    pub db_breaks: Vec<String>,
    /// Instrument codes whose broker position disagrees with ours.
    #[serde(default)]
    pub broker_breaks: Vec<String>,
}

impl ReconcileReport {
    pub fn has_position_break(&self) -> bool {
        !self.db_breaks.is_empty() || !self.broker_breaks.is_empty()
    }

    pub fn has_strategy_break(&self) -> bool {
        self.strategy.values().any(|s| s.breached)
    }
}

/// `/capital`: latest global capital vs yesterday's close.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapitalReport {
    pub now: f64,
    pub yesterday: f64,
}

/// `/liquidity`: per-instrument volume and risk-adjusted liquidity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiquidityEntry {
    pub contracts: f64,
    pub risk: f64,
}

pub type LiquidityReport = BTreeMap<String, LiquidityEntry>;

/// `/forex`: broker FX balances by currency.
pub type ForexReport = BTreeMap<String, f64>;

/// `/costs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostsReport {
    #[serde(default)]
    pub sr_costs: KeyedRows,
    #[serde(default)]
    pub slippage: KeyedRows,
}

/// `/risk`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    #[serde(default)]
    pub correlations: KeyedRows,
    #[serde(default)]
    pub strategy_risk: KeyedRows,
    #[serde(default)]
    pub instrument_risk: KeyedRows,
}

/// `/pandl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PandlReport {
    #[serde(default)]
    pub instruments: RecordRows,
    #[serde(default)]
    pub strategies: RecordRows,
    #[serde(default)]
    pub sectors: RecordRows,
}

/// `/trades`: every section is optional, the backend omits empty tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradesReport {
    #[serde(default)]
    pub overview: Option<KeyedRows>,
    #[serde(default)]
    pub delays: Option<KeyedRows>,
    #[serde(default)]
    pub raw_slippage: Option<KeyedRows>,
    #[serde(default)]
    pub vol_slippage: Option<KeyedRows>,
    #[serde(default)]
    pub cash_slippage: Option<KeyedRows>,
}

/// `/strategy`
pub type StrategyReport = KeyedRows;

/// `/traffic_lights`: server-side summary badges, rendered as-is.
pub type TrafficLightsReport = BTreeMap<String, Badge>;
