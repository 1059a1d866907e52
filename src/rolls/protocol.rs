//! Wire types for the roll workflow.
//!
//! Roll state names are operator-facing labels owned by the backend and are
//! carried as opaque strings here, with one exception: the terminal sentinel
//! [`ROLL_ADJUSTED`]. After an adjusted roll the lot bookkeeping has changed
//! and every cached roll row is stale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Terminal state for a roll cycle: adjusted prices were rewritten.
pub const ROLL_ADJUSTED: &str = "Roll_Adjusted";

/// Wire version of the preview payload. Bumped whenever the shape of
/// [`RollPreview`] changes; the client refuses other versions.
pub const PREVIEW_SCHEMA: u32 = 2;

/// One instrument's roll status as reported by `GET /rolls`.
///
/// Only `roll_expiry` is required (the badge needs it); the display-only
/// fields default so a sparse row degrades its render instead of aborting
/// the whole poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollRecord {
    /// Current lifecycle state, e.g. "No_Roll", "Force", "Passed_expiry".
    #[serde(default)]
    pub status: String,
    /// Days until the roll should happen; negative means already expired.
    pub roll_expiry: i64,
    #[serde(default)]
    pub carry_expiry: i64,
    #[serde(default)]
    pub price_expiry: i64,
    /// Contract detail arrays, aligned by index.
    #[serde(default)]
    pub contract_labels: Vec<String>,
    #[serde(default)]
    pub positions: Vec<i64>,
    #[serde(default)]
    pub volumes: Vec<f64>,
    /// Next states the operator may request. May be absent for
    /// instruments the backend cannot advance.
    #[serde(default)]
    pub allowable: Vec<String>,
}

pub type RollReport = BTreeMap<String, RollRecord>;

/// Adjusted (single) price at one date: current series vs proposed series.
/// `current` is absent for dates that only exist in the proposed series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdjustedPricePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    pub new: f64,
}

/// The carry/price/forward legs of a multiple-price row. Individual legs
/// can be missing where the underlying series has no sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceLegs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carry_contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_contract: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplePricePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<PriceLegs>,
    pub new: PriceLegs,
}

/// Proposed price series returned for an unconfirmed adjusted roll.
/// Non-committing: the operator inspects these tables and either confirms
/// or abandons the transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollPreview {
    /// Explicit wire version, must equal [`PREVIEW_SCHEMA`].
    pub schema: u32,
    /// Tail of the back-adjusted single price series, keyed by date.
    pub single: BTreeMap<String, AdjustedPricePoint>,
    /// Tail of the multiple price series, keyed by date.
    pub multiple: BTreeMap<String, MultiplePricePoint>,
}

impl RollPreview {
    pub fn check_schema(&self) -> Result<(), crate::error::FetchError> {
        if self.schema == PREVIEW_SCHEMA {
            Ok(())
        } else {
            Err(crate::error::FetchError::Parse(format!(
                "unsupported roll preview schema {} (expected {})",
                self.schema, PREVIEW_SCHEMA
            )))
        }
    }
}

/// Result of `POST /rolls`, discriminated by the `outcome` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RollTransitionResponse {
    /// Terminal: the adjusted roll committed and position bookkeeping
    /// changed. All roll data is now stale.
    Rolled { new_state: String },
    /// Intermediate: proposed prices awaiting operator confirmation.
    /// Nothing was committed.
    Preview { prices: RollPreview },
    /// The instrument advanced to a non-terminal state; only its own row
    /// needs patching.
    Advanced {
        new_state: String,
        allowable: Vec<String>,
    },
}

impl RollTransitionResponse {
    /// True when the response means the whole rolls table must be
    /// re-fetched rather than patched row by row.
    pub fn is_terminal(&self) -> bool {
        match self {
            RollTransitionResponse::Rolled { .. } => true,
            RollTransitionResponse::Preview { .. } => false,
            // Belt and braces: an Advanced carrying the sentinel is still
            // terminal for the current cycle.
            RollTransitionResponse::Advanced { new_state, .. } => new_state == ROLL_ADJUSTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rolled_outcome() {
        let json = r#"{"outcome": "rolled", "new_state": "Roll_Adjusted"}"#;
        let resp: RollTransitionResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_terminal());
        match resp {
            RollTransitionResponse::Rolled { new_state } => assert_eq!(new_state, ROLL_ADJUSTED),
            other => panic!("expected Rolled, got {other:?}"),
        }
    }

    #[test]
    fn decodes_preview_outcome() {
        let json = r#"{
            "outcome": "preview",
            "prices": {
                "schema": 2,
                "single": {
                    "2024-03-01": {"current": 98.25, "new": 98.75},
                    "2024-03-04": {"new": 99.0}
                },
                "multiple": {
                    "2024-03-01": {
                        "current": {"price": 98.25, "price_contract": "20240600"},
                        "new": {"price": 98.75, "price_contract": "20240900", "carry": 98.5}
                    }
                }
            }
        }"#;
        let resp: RollTransitionResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.is_terminal());
        let prices = match resp {
            RollTransitionResponse::Preview { prices } => prices,
            other => panic!("expected Preview, got {other:?}"),
        };
        prices.check_schema().unwrap();
        assert_eq!(prices.single["2024-03-01"].current, Some(98.25));
        assert_eq!(prices.single["2024-03-04"].current, None);
        assert!(prices.multiple["2024-03-01"].current.is_some());
    }

    #[test]
    fn decodes_advanced_outcome() {
        let json = r#"{
            "outcome": "advanced",
            "new_state": "Force",
            "allowable": ["Force", "Force_Outright", "Passive", "No_Roll", "Close"]
        }"#;
        let resp: RollTransitionResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.is_terminal());
        match resp {
            RollTransitionResponse::Advanced {
                new_state,
                allowable,
            } => {
                assert_eq!(new_state, "Force");
                assert_eq!(allowable.len(), 5);
            }
            other => panic!("expected Advanced, got {other:?}"),
        }
    }

    #[test]
    fn advanced_with_sentinel_is_terminal() {
        let resp = RollTransitionResponse::Advanced {
            new_state: ROLL_ADJUSTED.to_string(),
            allowable: vec!["No_Roll".to_string()],
        };
        assert!(resp.is_terminal());
    }

    #[test]
    fn rejects_wrong_preview_schema() {
        let preview = RollPreview {
            schema: 1,
            single: BTreeMap::new(),
            multiple: BTreeMap::new(),
        };
        assert!(preview.check_schema().is_err());
    }

    #[test]
    fn roll_record_tolerates_missing_allowable() {
        let json = r#"{
            "status": "Passed_expiry",
            "roll_expiry": -2,
            "carry_expiry": 5,
            "price_expiry": 12
        }"#;
        let record: RollRecord = serde_json::from_str(json).unwrap();
        assert!(record.allowable.is_empty());
        assert!(record.contract_labels.is_empty());
    }

    #[test]
    fn sparse_roll_record_parses_with_defaults() {
        // Expiry plus the allowable action set is enough for a usable row.
        let json = r#"{"EDOLLAR": {"roll_expiry": -2, "allowable": ["Passed_expiry"]}}"#;
        let report: RollReport = serde_json::from_str(json).unwrap();
        let record = &report["EDOLLAR"];
        assert_eq!(record.roll_expiry, -2);
        assert_eq!(record.allowable, vec!["Passed_expiry".to_string()]);
        assert_eq!(record.status, "");
        assert_eq!(record.carry_expiry, 0);
        assert_eq!(record.price_expiry, 0);
    }
}
