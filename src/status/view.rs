//! Pure rendering: payload in, view description out.
//!
//! Nothing here touches a UI surface. Each render produces a fresh
//! [`PanelView`] (clear-then-rebuild); the only incremental path is the
//! roll [`RowPatch`] applied after a non-terminal transition. A renderer
//! collaborator (terminal, web, whatever) consumes these values.

use chrono::{DateTime, Utc};

use crate::status::models::{
    CapitalReport, CostsReport, ForexReport, KeyedRows, LiquidityReport, PandlReport,
    ProcessReport, ProcessTag, RecordRows, ReconcileReport, RiskReport, StrategyReport,
    TradesReport, TrafficLightsReport,
};
use crate::status::severity::{
    capital_badge, liquidity_flags, prices_badge, process_badge, reconcile_badge, rolls_badge,
    Badge,
};
use crate::status::{StatusPayload, StatusResource};

use crate::rolls::protocol::RollReport;

/// A named traffic light, optionally carrying display text (e.g. the
/// capital light shows the current capital figure).
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeView {
    pub label: String,
    pub badge: Badge,
    pub text: Option<String>,
}

/// One table cell; `flag` marks the cell with a severity colour.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub flag: Option<Badge>,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Cell {
            text: text.into(),
            flag: None,
        }
    }

    pub fn flagged(text: impl Into<String>, badge: Badge) -> Self {
        Cell {
            text: text.into(),
            flag: Some(badge),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: String,
    pub cells: Vec<Cell>,
    /// Operator actions offered on this row (roll transitions only).
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Full description of one panel, rebuilt from scratch every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub resource: StatusResource,
    pub badges: Vec<BadgeView>,
    pub tables: Vec<TableView>,
}

/// Incremental patch for a single roll row after a non-terminal
/// transition: new status plus the refreshed action set.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPatch {
    pub instrument: String,
    pub status: String,
    pub actions: Vec<String>,
}

/// Inputs the render functions need beyond the payload itself.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub now: DateTime<Utc>,
    pub primary_process: String,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            now: Utc::now(),
            primary_process: "run_stack_handler".to_string(),
        }
    }
}

/// Render any status payload into its panel description.
pub fn render(payload: &StatusPayload, ctx: &RenderContext) -> PanelView {
    match payload {
        StatusPayload::Processes(p) => render_processes(p, ctx),
        StatusPayload::Reconcile(p) => render_reconcile(p),
        StatusPayload::Capital(p) => render_capital(p),
        StatusPayload::Rolls(p) => render_rolls(p),
        StatusPayload::Costs(p) => render_costs(p),
        StatusPayload::Risk(p) => render_risk(p),
        StatusPayload::Pandl(p) => render_pandl(p),
        StatusPayload::Trades(p) => render_trades(p),
        StatusPayload::Liquidity(p) => render_liquidity(p),
        StatusPayload::Forex(p) => render_forex(p),
        StatusPayload::Strategy(p) => render_strategy(p),
        StatusPayload::TrafficLights(p) => render_traffic_lights(p),
    }
}

fn render_processes(report: &ProcessReport, ctx: &RenderContext) -> PanelView {
    let overall = process_badge(report, &ctx.primary_process);
    let (price_light, stale) = prices_badge(&report.price, ctx.now);

    let process_rows = report
        .process
        .iter()
        .map(|(name, entry)| {
            let status_cell = match entry.status {
                ProcessTag::Running => Cell::plain("running"),
                ProcessTag::Crashed => Cell::flagged("crashed", Badge::Red),
                ProcessTag::Other => Cell::plain("other"),
            };
            Row {
                key: name.clone(),
                cells: vec![Cell::plain(name.clone()), status_cell],
                actions: Vec::new(),
            }
        })
        .collect();

    let price_rows = report
        .price
        .iter()
        .map(|(code, update)| {
            let text = update.last_update.format("%Y-%m-%d %H:%M").to_string();
            let cell = if stale.contains(code) {
                Cell::flagged(text, Badge::Red)
            } else {
                Cell::plain(text)
            };
            Row {
                key: code.clone(),
                cells: vec![Cell::plain(code.clone()), cell],
                actions: Vec::new(),
            }
        })
        .collect();

    let config_rows = report
        .config
        .iter()
        .map(|(k, v)| Row {
            key: k.clone(),
            cells: vec![Cell::plain(k.clone()), Cell::plain(v.clone())],
            actions: Vec::new(),
        })
        .collect();

    PanelView {
        resource: StatusResource::Processes,
        badges: vec![
            BadgeView {
                label: "stack".to_string(),
                badge: overall,
                text: None,
            },
            BadgeView {
                label: "prices".to_string(),
                badge: price_light,
                text: None,
            },
        ],
        tables: vec![
            TableView {
                title: "processes".to_string(),
                columns: vec!["process".to_string(), "status".to_string()],
                rows: process_rows,
            },
            TableView {
                title: "price updates".to_string(),
                columns: vec!["instrument".to_string(), "last update".to_string()],
                rows: price_rows,
            },
            TableView {
                title: "connections".to_string(),
                columns: vec!["name".to_string(), "value".to_string()],
                rows: config_rows,
            },
        ],
    }
}

fn render_reconcile(report: &ReconcileReport) -> PanelView {
    let overall = reconcile_badge(report);
    let gateway = if report.gateway_ok {
        Badge::Green
    } else {
        Badge::Red
    };

    let strategy_rows = report
        .strategy
        .iter()
        .map(|(key, pos)| {
            let flag = pos.breached.then_some(Badge::Red);
            Row {
                key: key.clone(),
                cells: vec![
                    Cell::plain(key.clone()),
                    Cell {
                        text: format!("{}", pos.current),
                        flag,
                    },
                    Cell {
                        text: pos.optimal.clone(),
                        flag,
                    },
                ],
                actions: Vec::new(),
            }
        })
        .collect();

    let position_rows = report
        .positions
        .values()
        .map(|pos| {
            let db_flag = report
                .db_breaks
                .contains(&pos.code)
                .then_some(Badge::Red);
            let broker_flag = report
                .broker_breaks
                .contains(&pos.code)
                .then_some(Badge::Red);
            Row {
                key: format!("{}/{}", pos.code, pos.contract_date),
                cells: vec![
                    Cell::plain(pos.code.clone()),
                    Cell::plain(pos.contract_date.clone()),
                    Cell {
                        text: format!("{}", pos.db_position),
                        flag: db_flag,
                    },
                    Cell {
                        text: format!("{}", pos.broker_position),
                        flag: broker_flag,
                    },
                ],
                actions: Vec::new(),
            }
        })
        .collect();

    PanelView {
        resource: StatusResource::Reconcile,
        badges: vec![
            BadgeView {
                label: "breaks".to_string(),
                badge: overall,
                text: None,
            },
            BadgeView {
                label: "gateway".to_string(),
                badge: gateway,
                text: None,
            },
        ],
        tables: vec![
            TableView {
                title: "strategy positions".to_string(),
                columns: vec![
                    "strategy".to_string(),
                    "current".to_string(),
                    "optimal".to_string(),
                ],
                rows: strategy_rows,
            },
            TableView {
                title: "contract positions".to_string(),
                columns: vec![
                    "instrument".to_string(),
                    "contract".to_string(),
                    "db".to_string(),
                    "broker".to_string(),
                ],
                rows: position_rows,
            },
        ],
    }
}

fn render_capital(report: &CapitalReport) -> PanelView {
    PanelView {
        resource: StatusResource::Capital,
        badges: vec![BadgeView {
            label: "capital".to_string(),
            badge: capital_badge(report),
            text: Some(format!("${}", group_thousands(report.now))),
        }],
        tables: Vec::new(),
    }
}

fn render_rolls(report: &RollReport) -> PanelView {
    let overall = rolls_badge(report);

    let status_rows = report
        .iter()
        .map(|(code, record)| {
            let expiry_flag = if record.roll_expiry < 0 {
                Some(Badge::Red)
            } else if record.roll_expiry < 5 {
                Some(Badge::Orange)
            } else {
                None
            };
            Row {
                key: code.clone(),
                cells: vec![
                    Cell::plain(code.clone()),
                    Cell::plain(record.status.clone()),
                    Cell {
                        text: record.roll_expiry.to_string(),
                        flag: expiry_flag,
                    },
                    Cell::plain(record.carry_expiry.to_string()),
                    Cell::plain(record.price_expiry.to_string()),
                ],
                actions: record.allowable.clone(),
            }
        })
        .collect();

    let detail_rows = report
        .iter()
        .map(|(code, record)| {
            let mut cells = vec![Cell::plain(code.clone())];
            for (i, label) in record.contract_labels.iter().enumerate() {
                let position = record
                    .positions
                    .get(i)
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                let volume = record
                    .volumes
                    .get(i)
                    .map(|v| format!("{v:.3}"))
                    .unwrap_or_default();
                cells.push(Cell::plain(format!("{label} {position} {volume}")));
            }
            Row {
                key: code.clone(),
                cells,
                actions: Vec::new(),
            }
        })
        .collect();

    PanelView {
        resource: StatusResource::Rolls,
        badges: vec![BadgeView {
            label: "rolls".to_string(),
            badge: overall,
            text: None,
        }],
        tables: vec![
            TableView {
                title: "roll status".to_string(),
                columns: vec![
                    "instrument".to_string(),
                    "status".to_string(),
                    "roll expiry".to_string(),
                    "carry expiry".to_string(),
                    "price expiry".to_string(),
                ],
                rows: status_rows,
            },
            TableView {
                title: "roll details".to_string(),
                columns: vec!["instrument".to_string(), "contracts".to_string()],
                rows: detail_rows,
            },
        ],
    }
}

fn render_liquidity(report: &LiquidityReport) -> PanelView {
    let rows = report
        .iter()
        .map(|(code, entry)| {
            let (thin_contracts, thin_risk) = liquidity_flags(entry);
            Row {
                key: code.clone(),
                cells: vec![
                    Cell::plain(code.clone()),
                    Cell {
                        text: format!("{:.0}", entry.contracts),
                        flag: thin_contracts.then_some(Badge::Red),
                    },
                    Cell {
                        text: format!("{:.2}", entry.risk),
                        flag: thin_risk.then_some(Badge::Red),
                    },
                ],
                actions: Vec::new(),
            }
        })
        .collect();

    PanelView {
        resource: StatusResource::Liquidity,
        badges: Vec::new(),
        tables: vec![TableView {
            title: "liquidity".to_string(),
            columns: vec![
                "instrument".to_string(),
                "contracts".to_string(),
                "risk".to_string(),
            ],
            rows,
        }],
    }
}

fn render_forex(report: &ForexReport) -> PanelView {
    let rows = report
        .iter()
        .map(|(ccy, balance)| Row {
            key: ccy.clone(),
            cells: vec![Cell::plain(ccy.clone()), Cell::plain(format!("{balance:.2}"))],
            actions: Vec::new(),
        })
        .collect();

    PanelView {
        resource: StatusResource::Forex,
        badges: Vec::new(),
        tables: vec![TableView {
            title: "fx balances".to_string(),
            columns: vec!["currency".to_string(), "balance".to_string()],
            rows,
        }],
    }
}

fn render_costs(report: &CostsReport) -> PanelView {
    PanelView {
        resource: StatusResource::Costs,
        badges: Vec::new(),
        tables: vec![
            keyed_table("SR costs", &report.sr_costs),
            keyed_table("slippage", &report.slippage),
        ],
    }
}

fn render_risk(report: &RiskReport) -> PanelView {
    PanelView {
        resource: StatusResource::Risk,
        badges: Vec::new(),
        tables: vec![
            keyed_table("correlations", &report.correlations),
            keyed_table("strategy risk", &report.strategy_risk),
            keyed_table("instrument risk", &report.instrument_risk),
        ],
    }
}

fn render_pandl(report: &PandlReport) -> PanelView {
    PanelView {
        resource: StatusResource::Pandl,
        badges: Vec::new(),
        tables: vec![
            record_table("instrument p&l", &report.instruments),
            record_table("strategy p&l", &report.strategies),
            record_table("sector p&l", &report.sectors),
        ],
    }
}

fn render_trades(report: &TradesReport) -> PanelView {
    // Absent sections are skipped, not rendered empty.
    let sections = [
        ("orders", &report.overview),
        ("delays", &report.delays),
        ("raw slippage", &report.raw_slippage),
        ("vol slippage", &report.vol_slippage),
        ("cash slippage", &report.cash_slippage),
    ];
    let tables = sections
        .into_iter()
        .filter_map(|(title, section)| section.as_ref().map(|rows| keyed_table(title, rows)))
        .collect();

    PanelView {
        resource: StatusResource::Trades,
        badges: Vec::new(),
        tables,
    }
}

fn render_strategy(report: &StrategyReport) -> PanelView {
    PanelView {
        resource: StatusResource::Strategy,
        badges: Vec::new(),
        tables: vec![keyed_table("strategies", report)],
    }
}

fn render_traffic_lights(report: &TrafficLightsReport) -> PanelView {
    let badges = report
        .iter()
        .map(|(label, badge)| BadgeView {
            label: label.clone(),
            badge: *badge,
            text: None,
        })
        .collect();

    PanelView {
        resource: StatusResource::TrafficLights,
        badges,
        tables: Vec::new(),
    }
}

/// Flat-map a keyed-row payload into a table; columns are the sorted union
/// of every row's column names so ragged rows render without gaps shifting.
fn keyed_table(title: &str, rows: &KeyedRows) -> TableView {
    let mut columns: Vec<String> = Vec::new();
    for row in rows.values() {
        for col in row.keys() {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }
    }
    columns.sort();

    let table_rows = rows
        .iter()
        .map(|(key, row)| {
            let mut cells = vec![Cell::plain(key.clone())];
            cells.extend(
                columns
                    .iter()
                    .map(|col| Cell::plain(row.get(col).map(fmt_value).unwrap_or_default())),
            );
            Row {
                key: key.clone(),
                cells,
                actions: Vec::new(),
            }
        })
        .collect();

    let mut header = vec!["key".to_string()];
    header.extend(columns);

    TableView {
        title: title.to_string(),
        columns: header,
        rows: table_rows,
    }
}

fn record_table(title: &str, rows: &RecordRows) -> TableView {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for col in row.keys() {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }
    }
    columns.sort();

    let table_rows = rows
        .iter()
        .enumerate()
        .map(|(i, row)| Row {
            key: i.to_string(),
            cells: columns
                .iter()
                .map(|col| Cell::plain(row.get(col).map(fmt_value).unwrap_or_default()))
                .collect(),
            actions: Vec::new(),
        })
        .collect();

    TableView {
        title: title.to_string(),
        columns,
        rows: table_rows,
    }
}

fn fmt_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 1234567.0 -> "1,234,567"
fn group_thousands(amount: f64) -> String {
    let negative = amount < 0.0;
    let digits = format!("{:.0}", amount.abs());
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Apply a non-terminal roll patch to a previously rendered rolls panel.
/// Only the matching row's status cell and action set change.
pub fn apply_roll_patch(panel: &mut PanelView, patch: &RowPatch) {
    debug_assert_eq!(panel.resource, StatusResource::Rolls);
    for table in &mut panel.tables {
        if table.title != "roll status" {
            continue;
        }
        for row in &mut table.rows {
            if row.key == patch.instrument {
                if let Some(cell) = row.cells.get_mut(1) {
                    cell.text = patch.status.clone();
                }
                row.actions = patch.actions.clone();
            }
        }
    }
}
