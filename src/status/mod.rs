//! Read-only status resources: payload types, severity rules, pure render
//! functions and the poll scheduler.

pub mod models;
pub mod poller;
pub mod severity;
pub mod view;

use serde::{Deserialize, Serialize};

use crate::status::models::{
    CapitalReport, CostsReport, ForexReport, LiquidityReport, PandlReport, ProcessReport,
    ReconcileReport, RiskReport, StrategyReport, TradesReport, TrafficLightsReport,
};

use crate::rolls::protocol::RollReport;

/// The independently pollable status resources. Each is idempotently
/// re-fetchable; no relationships between resources are enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusResource {
    Processes,
    Reconcile,
    Capital,
    Rolls,
    Costs,
    Risk,
    Pandl,
    Trades,
    Liquidity,
    Forex,
    Strategy,
    TrafficLights,
}

impl StatusResource {
    pub const ALL: [StatusResource; 12] = [
        StatusResource::Processes,
        StatusResource::Reconcile,
        StatusResource::Capital,
        StatusResource::Rolls,
        StatusResource::Costs,
        StatusResource::Risk,
        StatusResource::Pandl,
        StatusResource::Trades,
        StatusResource::Liquidity,
        StatusResource::Forex,
        StatusResource::Strategy,
        StatusResource::TrafficLights,
    ];

    /// URL path of the GET resource.
    pub fn path(&self) -> &'static str {
        match self {
            StatusResource::Processes => "/processes",
            StatusResource::Reconcile => "/reconcile",
            StatusResource::Capital => "/capital",
            StatusResource::Rolls => "/rolls",
            StatusResource::Costs => "/costs",
            StatusResource::Risk => "/risk",
            StatusResource::Pandl => "/pandl",
            StatusResource::Trades => "/trades",
            StatusResource::Liquidity => "/liquidity",
            StatusResource::Forex => "/forex",
            StatusResource::Strategy => "/strategy",
            StatusResource::TrafficLights => "/traffic_lights",
        }
    }

    pub fn name(&self) -> &'static str {
        self.path().trim_start_matches('/')
    }
}

impl std::fmt::Display for StatusResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fetched payload paired with its resource kind.
#[derive(Debug, Clone)]
pub enum StatusPayload {
    Processes(ProcessReport),
    Reconcile(ReconcileReport),
    Capital(CapitalReport),
    Rolls(RollReport),
    Costs(CostsReport),
    Risk(RiskReport),
    Pandl(PandlReport),
    Trades(TradesReport),
    Liquidity(LiquidityReport),
    Forex(ForexReport),
    Strategy(StrategyReport),
    TrafficLights(TrafficLightsReport),
}

impl StatusPayload {
    pub fn resource(&self) -> StatusResource {
        match self {
            StatusPayload::Processes(_) => StatusResource::Processes,
            StatusPayload::Reconcile(_) => StatusResource::Reconcile,
            StatusPayload::Capital(_) => StatusResource::Capital,
            StatusPayload::Rolls(_) => StatusResource::Rolls,
            StatusPayload::Costs(_) => StatusResource::Costs,
            StatusPayload::Risk(_) => StatusResource::Risk,
            StatusPayload::Pandl(_) => StatusResource::Pandl,
            StatusPayload::Trades(_) => StatusResource::Trades,
            StatusPayload::Liquidity(_) => StatusResource::Liquidity,
            StatusPayload::Forex(_) => StatusResource::Forex,
            StatusPayload::Strategy(_) => StatusResource::Strategy,
            StatusPayload::TrafficLights(_) => StatusResource::TrafficLights,
        }
    }
}
