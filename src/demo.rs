//! In-memory demo backend.
//!
//! Serves the full dashboard contract with canned data so the client can
//! be exercised without a production trading server: every GET resource
//! plus the POST roll workflow, including the server-side transition
//! matrix and a non-committing price preview. Used by the `opsdash-demo`
//! binary and the integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::rolls::protocol::{
    AdjustedPricePoint, MultiplePricePoint, PriceLegs, RollPreview, RollRecord, RollReport,
    RollTransitionResponse, PREVIEW_SCHEMA, ROLL_ADJUSTED,
};
use crate::status::models::{
    CapitalReport, CostsReport, LiquidityEntry, PandlReport, PositionRow, PriceUpdate,
    ProcessEntry, ProcessReport, ProcessTag, ReconcileReport, RiskReport, StrategyPosition,
    TradesReport,
};
use crate::status::severity::{self, Badge};

/// One instrument's server-side roll state. `priced_position` feeds the
/// transition matrix: holding the priced contract restricts which states
/// may come next.
#[derive(Debug, Clone)]
struct InstrumentRoll {
    status: String,
    priced_position: i64,
    roll_expiry: i64,
    carry_expiry: i64,
    price_expiry: i64,
    contract_labels: Vec<String>,
    positions: Vec<i64>,
    volumes: Vec<f64>,
}

impl InstrumentRoll {
    fn to_record(&self) -> RollRecord {
        RollRecord {
            status: self.status.clone(),
            roll_expiry: self.roll_expiry,
            carry_expiry: self.carry_expiry,
            price_expiry: self.price_expiry,
            contract_labels: self.contract_labels.clone(),
            positions: self.positions.clone(),
            volumes: self.volumes.clone(),
            allowable: allowable_states(&self.status, self.priced_position),
        }
    }
}

/// Allowable next states given the current state and whether a position
/// is held in the priced contract. First entry is the recommended one.
fn allowable_states(status: &str, priced_position: i64) -> Vec<String> {
    let states: &[&str] = match (status, priced_position != 0) {
        ("No_Roll", false) => &["Roll_Adjusted", "Passive", "No_Roll"],
        ("No_Roll", true) => &["Passive", "Force", "Force_Outright", "No_Roll", "Close"],
        ("Passive", false) => &["Roll_Adjusted", "Passive", "No_Roll"],
        ("Passive", true) => &["Force", "Force_Outright", "Passive", "No_Roll", "Close"],
        ("Force", false) => &["Roll_Adjusted", "Passive"],
        ("Force", true) => &["Force", "Force_Outright", "Passive", "No_Roll", "Close"],
        ("Force_Outright", false) => &["Roll_Adjusted", "Passive"],
        ("Force_Outright", true) => &["Force", "Force_Outright", "Passive", "No_Roll", "Close"],
        ("Close", false) => &["Roll_Adjusted", "Passive"],
        ("Close", true) => &["Close", "Force", "Force_Outright", "Passive", "No_Roll"],
        ("Roll_Adjusted", false) => &["No_Roll"],
        ("Roll_Adjusted", true) => &["Roll_Adjusted"],
        _ => &[],
    };
    states.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone)]
pub struct DemoState {
    rolls: Arc<RwLock<BTreeMap<String, InstrumentRoll>>>,
}

impl Default for DemoState {
    fn default() -> Self {
        let mut rolls = BTreeMap::new();
        rolls.insert(
            "EDOLLAR".to_string(),
            InstrumentRoll {
                status: "No_Roll".to_string(),
                priced_position: 2,
                roll_expiry: -2,
                carry_expiry: 33,
                price_expiry: 61,
                contract_labels: vec!["20240300c".to_string(), "20240600f".to_string()],
                positions: vec![2, 0],
                volumes: vec![1.0, 0.451],
            },
        );
        rolls.insert(
            "CORN".to_string(),
            InstrumentRoll {
                status: "No_Roll".to_string(),
                priced_position: 0,
                roll_expiry: 4,
                carry_expiry: 18,
                price_expiry: 46,
                contract_labels: vec!["20240500c".to_string(), "20240700f".to_string()],
                positions: vec![0, 0],
                volumes: vec![1.0, 0.873],
            },
        );
        rolls.insert(
            "GAS_US".to_string(),
            InstrumentRoll {
                status: "Passive".to_string(),
                priced_position: 1,
                roll_expiry: 12,
                carry_expiry: 25,
                price_expiry: 40,
                contract_labels: vec!["20240400c".to_string(), "20240500f".to_string()],
                positions: vec![1, 0],
                volumes: vec![1.0, 0.912],
            },
        );
        Self {
            rolls: Arc::new(RwLock::new(rolls)),
        }
    }
}

/// Build the demo router with every dashboard endpoint.
pub fn router(state: DemoState) -> Router {
    Router::new()
        .route("/processes", get(processes))
        .route("/reconcile", get(reconcile))
        .route("/capital", get(capital))
        .route("/rolls", get(rolls_get).post(rolls_post))
        .route("/costs", get(costs))
        .route("/risk", get(risk))
        .route("/pandl", get(pandl))
        .route("/trades", get(trades))
        .route("/liquidity", get(liquidity))
        .route("/forex", get(forex))
        .route("/strategy", get(strategy))
        .route("/traffic_lights", get(traffic_lights))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn process_report() -> ProcessReport {
    let now = Utc::now();
    let entry = |status: ProcessTag| ProcessEntry {
        status,
        detail: BTreeMap::new(),
    };

    let mut process = BTreeMap::new();
    process.insert("run_stack_handler".to_string(), entry(ProcessTag::Running));
    process.insert("run_capital_update".to_string(), entry(ProcessTag::Running));
    process.insert("run_daily_prices_updates".to_string(), entry(ProcessTag::Other));
    process.insert("run_cleaners".to_string(), entry(ProcessTag::Crashed));

    let mut price = BTreeMap::new();
    price.insert(
        "EDOLLAR".to_string(),
        PriceUpdate {
            last_update: now - Duration::hours(3),
        },
    );
    price.insert(
        "CORN".to_string(),
        PriceUpdate {
            last_update: now - Duration::hours(5),
        },
    );

    let mut config = BTreeMap::new();
    config.insert("db".to_string(), "localhost:27017 - production".to_string());
    config.insert("gateway".to_string(), "127.0.0.1:4001".to_string());

    ProcessReport {
        process,
        price,
        config,
    }
}

async fn processes() -> Json<ProcessReport> {
    Json(process_report())
}

fn reconcile_report() -> ReconcileReport {
    let mut strategy = BTreeMap::new();
    strategy.insert(
        "medium_speed/EDOLLAR".to_string(),
        StrategyPosition {
            current: 2.0,
            optimal: "1.2 to 2.8".to_string(),
            breached: false,
        },
    );
    strategy.insert(
        "medium_speed/CORN".to_string(),
        StrategyPosition {
            current: 3.0,
            optimal: "0.4 to 1.6".to_string(),
            breached: true,
        },
    );

    let mut positions = BTreeMap::new();
    positions.insert(
        "EDOLLAR/20240300".to_string(),
        PositionRow {
            code: "EDOLLAR".to_string(),
            contract_date: "20240300".to_string(),
            db_position: 2.0,
            broker_position: 2.0,
        },
    );
    positions.insert(
        "CORN/20240500".to_string(),
        PositionRow {
            code: "CORN".to_string(),
            contract_date: "20240500".to_string(),
            db_position: 3.0,
            broker_position: 3.0,
        },
    );

    ReconcileReport {
        gateway_ok: true,
        strategy,
        positions,
        db_breaks: Vec::new(),
        broker_breaks: Vec::new(),
    }
}

async fn reconcile() -> Json<ReconcileReport> {
    Json(reconcile_report())
}

fn capital_report() -> CapitalReport {
    CapitalReport {
        now: 1_052_430.0,
        yesterday: 1_049_200.0,
    }
}

async fn capital() -> Json<CapitalReport> {
    Json(capital_report())
}

async fn rolls_get(State(state): State<DemoState>) -> Json<RollReport> {
    let report: RollReport = state
        .rolls
        .read()
        .iter()
        .map(|(code, roll)| (code.clone(), roll.to_record()))
        .collect();
    Json(report)
}

#[derive(Debug, Deserialize)]
struct RollForm {
    instrument: String,
    state: String,
    #[serde(default)]
    confirmed: bool,
}

async fn rolls_post(
    State(state): State<DemoState>,
    Form(form): Form<RollForm>,
) -> Result<Json<RollTransitionResponse>, Response> {
    let mut rolls = state.rolls.write();

    let roll = rolls.get_mut(&form.instrument).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("unknown instrument {}", form.instrument),
        )
            .into_response()
    })?;

    let allowable = allowable_states(&roll.status, roll.priced_position);
    if !allowable.contains(&form.state) {
        return Err((
            StatusCode::CONFLICT,
            format!(
                "{} cannot move from {} to {}",
                form.instrument, roll.status, form.state
            ),
        )
            .into_response());
    }

    // Adjusted rolls need a confirmed=true round trip; the preview is
    // computed without committing anything, so repeating it is harmless.
    if form.state == ROLL_ADJUSTED && !form.confirmed {
        return Ok(Json(RollTransitionResponse::Preview {
            prices: preview_prices(roll),
        }));
    }

    roll.status = form.state.clone();

    if form.state == ROLL_ADJUSTED {
        // Lot bookkeeping changes under an adjusted roll: the priced
        // contract is retired and the forward becomes the priced leg.
        roll.priced_position = 0;
        roll.contract_labels.rotate_left(1);
        roll.positions = vec![0; roll.positions.len()];
        roll.roll_expiry += 90;
        return Ok(Json(RollTransitionResponse::Rolled {
            new_state: ROLL_ADJUSTED.to_string(),
        }));
    }

    Ok(Json(RollTransitionResponse::Advanced {
        new_state: roll.status.clone(),
        allowable: allowable_states(&roll.status, roll.priced_position),
    }))
}

/// Deterministic synthetic preview: a short tail of the adjusted and
/// multiple price series, plus one proposed date with no current value.
fn preview_prices(roll: &InstrumentRoll) -> RollPreview {
    let mut single = BTreeMap::new();
    let mut multiple = BTreeMap::new();

    let base = 98.0;
    let today = Utc::now().date_naive();
    for i in 0..6i64 {
        let date = (today - Duration::days(6 - i)).format("%Y-%m-%d").to_string();
        let current = base + i as f64 * 0.25;
        single.insert(
            date.clone(),
            AdjustedPricePoint {
                current: Some(current),
                new: current + 0.5,
            },
        );
        multiple.insert(
            date,
            MultiplePricePoint {
                current: Some(PriceLegs {
                    price: Some(current),
                    price_contract: roll.contract_labels.first().cloned(),
                    carry: Some(current - 0.125),
                    carry_contract: roll.contract_labels.get(1).cloned(),
                    forward: Some(current + 0.125),
                    forward_contract: roll.contract_labels.get(1).cloned(),
                }),
                new: PriceLegs {
                    price: Some(current + 0.5),
                    price_contract: roll.contract_labels.get(1).cloned(),
                    ..PriceLegs::default()
                },
            },
        );
    }

    let new_date = today.format("%Y-%m-%d").to_string();
    single.insert(
        new_date.clone(),
        AdjustedPricePoint {
            current: None,
            new: base + 2.0,
        },
    );
    multiple.insert(
        new_date,
        MultiplePricePoint {
            current: None,
            new: PriceLegs {
                price: Some(base + 2.0),
                price_contract: roll.contract_labels.get(1).cloned(),
                ..PriceLegs::default()
            },
        },
    );

    RollPreview {
        schema: PREVIEW_SCHEMA,
        single,
        multiple,
    }
}

async fn costs() -> Json<CostsReport> {
    let row = |sr: f64, turnover: f64| {
        let mut m = BTreeMap::new();
        m.insert("SR_cost".to_string(), json!(sr));
        m.insert("turnover".to_string(), json!(turnover));
        m
    };
    let mut sr_costs = BTreeMap::new();
    sr_costs.insert("EDOLLAR".to_string(), row(0.006, 4.1));
    sr_costs.insert("CORN".to_string(), row(0.011, 7.3));

    let mut slippage = BTreeMap::new();
    let mut corn = BTreeMap::new();
    corn.insert("bid_ask".to_string(), json!(0.125));
    corn.insert("actual".to_string(), json!(0.094));
    slippage.insert("CORN".to_string(), corn);

    Json(CostsReport { sr_costs, slippage })
}

async fn risk() -> Json<RiskReport> {
    let mut instrument_risk = BTreeMap::new();
    let mut edollar = BTreeMap::new();
    edollar.insert("annual_perc_stdev".to_string(), json!(0.52));
    edollar.insert("exposure_held_perc_capital".to_string(), json!(3.1));
    instrument_risk.insert("EDOLLAR".to_string(), edollar);

    Json(RiskReport {
        correlations: BTreeMap::new(),
        strategy_risk: BTreeMap::new(),
        instrument_risk,
    })
}

async fn pandl() -> Json<PandlReport> {
    let record = |name: &str, pandl: f64| {
        let mut m = BTreeMap::new();
        m.insert("codes".to_string(), json!(name));
        m.insert("pandl".to_string(), json!(pandl));
        m
    };
    Json(PandlReport {
        instruments: vec![record("EDOLLAR", 0.42), record("CORN", -0.17)],
        strategies: vec![record("medium_speed", 0.25)],
        sectors: vec![record("rates", 0.42), record("ags", -0.17)],
    })
}

async fn trades() -> Json<TradesReport> {
    let mut overview = BTreeMap::new();
    let mut order = BTreeMap::new();
    order.insert("instrument_code".to_string(), json!("CORN"));
    order.insert("trade".to_string(), json!(-1));
    overview.insert("order-101".to_string(), order);

    // Only sections with content are present; the rest stay omitted.
    Json(TradesReport {
        overview: Some(overview),
        ..TradesReport::default()
    })
}

async fn liquidity() -> Json<BTreeMap<String, LiquidityEntry>> {
    let mut report = BTreeMap::new();
    report.insert(
        "EDOLLAR".to_string(),
        LiquidityEntry {
            contracts: 12_450.0,
            risk: 8.4,
        },
    );
    report.insert(
        "GAS_US".to_string(),
        LiquidityEntry {
            contracts: 61.0,
            risk: 1.1,
        },
    );
    Json(report)
}

async fn forex() -> Json<BTreeMap<String, f64>> {
    let mut balances = BTreeMap::new();
    balances.insert("USD".to_string(), 841_203.55);
    balances.insert("EUR".to_string(), 12_007.10);
    balances.insert("GBP".to_string(), -3_404.75);
    Json(balances)
}

async fn strategy() -> Json<BTreeMap<String, BTreeMap<String, serde_json::Value>>> {
    Json(BTreeMap::new())
}

/// Server-side summary lights, recomputed per request from the same
/// canned payloads the individual endpoints serve.
async fn traffic_lights(State(state): State<DemoState>) -> Json<BTreeMap<String, Badge>> {
    let rolls: RollReport = state
        .rolls
        .read()
        .iter()
        .map(|(code, roll)| (code.clone(), roll.to_record()))
        .collect();

    let mut lights = BTreeMap::new();
    lights.insert(
        "processes".to_string(),
        severity::process_badge(&process_report(), "run_stack_handler"),
    );
    lights.insert(
        "reconcile".to_string(),
        severity::reconcile_badge(&reconcile_report()),
    );
    lights.insert(
        "capital".to_string(),
        severity::capital_badge(&capital_report()),
    );
    lights.insert("rolls".to_string(), severity::rolls_badge(&rolls));
    Json(lights)
}
