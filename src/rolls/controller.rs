//! Client-side roll workflow state machine.
//!
//! One gate per instrument guards against concurrent conflicting
//! transition requests: while a request is in flight the instrument's
//! actions are unavailable, and the gate is released unconditionally when
//! the response (success or failure) lands.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::client::RollApi;
use crate::error::FetchError;
use crate::rolls::protocol::{RollPreview, RollReport, RollTransitionResponse};
use crate::status::view::RowPatch;

/// Per-instrument gate state.
#[derive(Debug, Clone, PartialEq)]
enum Gate {
    Idle,
    InFlight,
    /// A preview was returned; the confirmation is bound to the original
    /// requested state, not whatever the operator clicks next.
    AwaitingConfirmation { requested_state: String },
}

/// What the caller must do after a transition request.
#[derive(Debug, Clone)]
pub enum RollOutcome {
    /// Proposed prices need operator sign-off. Nothing committed yet;
    /// call `confirm_transition` (or `cancel_confirmation`) next.
    ConfirmationRequired(RollPreview),
    /// Non-terminal advance: patch this one row, leave the rest alone.
    PatchRow(RowPatch),
    /// Terminal (`Roll_Adjusted`): every roll row is stale, the full
    /// report included here replaces the table wholesale.
    RefreshAll(RollReport),
}

#[derive(Debug, thiserror::Error)]
pub enum RollError {
    /// A request for this instrument is already outstanding.
    #[error("transition already in flight for {0}")]
    TransitionInFlight(String),
    /// `confirm_transition` without a pending preview.
    #[error("no pending confirmation for {0}")]
    NothingToConfirm(String),
    #[error(transparent)]
    Transport(#[from] FetchError),
}

pub struct RollController<A: RollApi> {
    api: A,
    gates: HashMap<String, Gate>,
}

impl<A: RollApi> RollController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            gates: HashMap::new(),
        }
    }

    fn gate(&self, instrument: &str) -> Gate {
        self.gates.get(instrument).cloned().unwrap_or(Gate::Idle)
    }

    /// True while the instrument's action controls should be disabled.
    pub fn is_in_flight(&self, instrument: &str) -> bool {
        self.gate(instrument) == Gate::InFlight
    }

    /// The requested state awaiting confirmation, if any.
    pub fn pending_confirmation(&self, instrument: &str) -> Option<String> {
        match self.gate(instrument) {
            Gate::AwaitingConfirmation { requested_state } => Some(requested_state),
            _ => None,
        }
    }

    /// Request a transition to `state`. Never commits a price-adjusting
    /// transition directly: the first round trip is unconfirmed, and a
    /// preview response parks the instrument until the operator decides.
    pub async fn request_transition(
        &mut self,
        instrument: &str,
        state: &str,
    ) -> Result<RollOutcome, RollError> {
        if self.is_in_flight(instrument) {
            return Err(RollError::TransitionInFlight(instrument.to_string()));
        }
        self.submit(instrument, state, false).await
    }

    /// Commit the transition previewed earlier for this instrument.
    pub async fn confirm_transition(&mut self, instrument: &str) -> Result<RollOutcome, RollError> {
        let state = match self.gate(instrument) {
            Gate::AwaitingConfirmation { requested_state } => requested_state,
            Gate::InFlight => return Err(RollError::TransitionInFlight(instrument.to_string())),
            Gate::Idle => return Err(RollError::NothingToConfirm(instrument.to_string())),
        };
        self.submit(instrument, &state, true).await
    }

    /// Abandon a pending preview without committing anything.
    pub fn cancel_confirmation(&mut self, instrument: &str) {
        if matches!(self.gate(instrument), Gate::AwaitingConfirmation { .. }) {
            self.gates.insert(instrument.to_string(), Gate::Idle);
        }
    }

    async fn submit(
        &mut self,
        instrument: &str,
        state: &str,
        confirmed: bool,
    ) -> Result<RollOutcome, RollError> {
        let api = &self.api;
        // The guard releases the gate on every exit path, including the
        // caller dropping this future mid-request (e.g. a timeout); a
        // cancelled request must not leave the controls disabled.
        let mut gate = GateGuard::engage(&mut self.gates, instrument);

        let result = api.submit_transition(instrument, state, confirmed).await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(%instrument, %state, error = %err, "roll transition failed");
                return Err(err.into());
            }
        };

        if response.is_terminal() {
            info!(%instrument, "roll adjusted, re-fetching full rolls report");
            let report = api.fetch_rolls().await.map_err(RollError::Transport)?;
            return Ok(RollOutcome::RefreshAll(report));
        }

        match response {
            RollTransitionResponse::Preview { prices } => {
                gate.release_to(Gate::AwaitingConfirmation {
                    requested_state: state.to_string(),
                });
                Ok(RollOutcome::ConfirmationRequired(prices))
            }
            RollTransitionResponse::Advanced {
                new_state,
                allowable,
            } => {
                info!(%instrument, %new_state, "roll state advanced");
                Ok(RollOutcome::PatchRow(RowPatch {
                    instrument: instrument.to_string(),
                    status: new_state,
                    actions: allowable,
                }))
            }
            // is_terminal() already diverted Rolled and the sentinel.
            RollTransitionResponse::Rolled { .. } => unreachable!("terminal handled above"),
        }
    }
}

/// Marks an instrument in flight and restores its gate when dropped,
/// whether the request resolved or its future was cancelled. The preview
/// path swaps the release target for `AwaitingConfirmation`.
struct GateGuard<'a> {
    gates: &'a mut HashMap<String, Gate>,
    instrument: String,
    on_drop: Gate,
}

impl<'a> GateGuard<'a> {
    fn engage(gates: &'a mut HashMap<String, Gate>, instrument: &str) -> Self {
        gates.insert(instrument.to_string(), Gate::InFlight);
        Self {
            gates,
            instrument: instrument.to_string(),
            on_drop: Gate::Idle,
        }
    }

    fn release_to(&mut self, gate: Gate) {
        self.on_drop = gate;
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let released = std::mem::replace(&mut self.on_drop, Gate::Idle);
        self.gates.insert(self.instrument.clone(), released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rolls::protocol::{RollRecord, PREVIEW_SCHEMA, ROLL_ADJUSTED};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// Scripted fake transport recording every call.
    struct FakeApi {
        calls: Mutex<Vec<(String, String, bool)>>,
        rolls_fetches: Mutex<u32>,
        script: Mutex<Vec<Result<RollTransitionResponse, FetchError>>>,
    }

    impl FakeApi {
        fn new(script: Vec<Result<RollTransitionResponse, FetchError>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                rolls_fetches: Mutex::new(0),
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl RollApi for &FakeApi {
        async fn submit_transition(
            &self,
            instrument: &str,
            state: &str,
            confirmed: bool,
        ) -> Result<RollTransitionResponse, FetchError> {
            self.calls
                .lock()
                .push((instrument.to_string(), state.to_string(), confirmed));
            self.script.lock().remove(0)
        }

        async fn fetch_rolls(&self) -> Result<RollReport, FetchError> {
            *self.rolls_fetches.lock() += 1;
            let mut report = BTreeMap::new();
            report.insert(
                "CORN".to_string(),
                RollRecord {
                    status: ROLL_ADJUSTED.to_string(),
                    roll_expiry: 10,
                    carry_expiry: 15,
                    price_expiry: 20,
                    contract_labels: Vec::new(),
                    positions: Vec::new(),
                    volumes: Vec::new(),
                    allowable: vec!["No_Roll".to_string()],
                },
            );
            Ok(report)
        }
    }

    fn preview() -> RollTransitionResponse {
        RollTransitionResponse::Preview {
            prices: RollPreview {
                schema: PREVIEW_SCHEMA,
                single: BTreeMap::new(),
                multiple: BTreeMap::new(),
            },
        }
    }

    #[tokio::test]
    async fn preview_then_confirm_binds_the_original_pair() {
        let api = FakeApi::new(vec![
            Ok(preview()),
            Ok(RollTransitionResponse::Rolled {
                new_state: ROLL_ADJUSTED.to_string(),
            }),
        ]);
        let mut controller = RollController::new(&api);

        let outcome = controller
            .request_transition("CORN", ROLL_ADJUSTED)
            .await
            .unwrap();
        assert!(matches!(outcome, RollOutcome::ConfirmationRequired(_)));
        assert_eq!(
            controller.pending_confirmation("CORN").as_deref(),
            Some(ROLL_ADJUSTED)
        );

        let outcome = controller.confirm_transition("CORN").await.unwrap();
        assert!(matches!(outcome, RollOutcome::RefreshAll(_)));

        let calls = api.calls.lock();
        assert_eq!(
            *calls,
            vec![
                ("CORN".to_string(), ROLL_ADJUSTED.to_string(), false),
                ("CORN".to_string(), ROLL_ADJUSTED.to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn terminal_result_triggers_full_refetch_not_patch() {
        let api = FakeApi::new(vec![Ok(RollTransitionResponse::Rolled {
            new_state: ROLL_ADJUSTED.to_string(),
        })]);
        let mut controller = RollController::new(&api);

        let outcome = controller
            .request_transition("CORN", ROLL_ADJUSTED)
            .await
            .unwrap();

        match outcome {
            RollOutcome::RefreshAll(report) => {
                assert_eq!(report["CORN"].status, ROLL_ADJUSTED);
            }
            other => panic!("expected RefreshAll, got {other:?}"),
        }
        assert_eq!(*api.rolls_fetches.lock(), 1);
    }

    #[tokio::test]
    async fn advanced_with_sentinel_state_also_forces_refetch() {
        let api = FakeApi::new(vec![Ok(RollTransitionResponse::Advanced {
            new_state: ROLL_ADJUSTED.to_string(),
            allowable: vec!["No_Roll".to_string()],
        })]);
        let mut controller = RollController::new(&api);

        let outcome = controller
            .request_transition("CORN", ROLL_ADJUSTED)
            .await
            .unwrap();
        assert!(matches!(outcome, RollOutcome::RefreshAll(_)));
    }

    #[tokio::test]
    async fn non_terminal_advance_patches_one_row() {
        let api = FakeApi::new(vec![Ok(RollTransitionResponse::Advanced {
            new_state: "Force".to_string(),
            allowable: vec!["Passive".to_string(), "No_Roll".to_string()],
        })]);
        let mut controller = RollController::new(&api);

        let outcome = controller
            .request_transition("EDOLLAR", "Force")
            .await
            .unwrap();

        match outcome {
            RollOutcome::PatchRow(patch) => {
                assert_eq!(patch.instrument, "EDOLLAR");
                assert_eq!(patch.status, "Force");
                assert_eq!(patch.actions.len(), 2);
            }
            other => panic!("expected PatchRow, got {other:?}"),
        }
        assert_eq!(*api.rolls_fetches.lock(), 0);
    }

    #[tokio::test]
    async fn gate_released_after_transport_failure() {
        let api = FakeApi::new(vec![
            Err(FetchError::Conflict("stale allowable".to_string())),
            Ok(RollTransitionResponse::Advanced {
                new_state: "Passive".to_string(),
                allowable: vec!["No_Roll".to_string()],
            }),
        ]);
        let mut controller = RollController::new(&api);

        let err = controller
            .request_transition("EDOLLAR", "Force")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RollError::Transport(FetchError::Conflict(_))
        ));

        // Controls re-enabled: the next request goes through.
        assert!(!controller.is_in_flight("EDOLLAR"));
        let outcome = controller
            .request_transition("EDOLLAR", "Passive")
            .await
            .unwrap();
        assert!(matches!(outcome, RollOutcome::PatchRow(_)));
    }

    /// Transport that never resolves, for cancellation tests.
    struct HangingApi;

    #[async_trait]
    impl RollApi for HangingApi {
        async fn submit_transition(
            &self,
            _instrument: &str,
            _state: &str,
            _confirmed: bool,
        ) -> Result<RollTransitionResponse, FetchError> {
            std::future::pending().await
        }

        async fn fetch_rolls(&self) -> Result<RollReport, FetchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn gate_released_when_request_future_is_dropped() {
        let mut controller = RollController::new(HangingApi);

        // Caller-side timeout drops the request future mid-flight.
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            controller.request_transition("CORN", "Force"),
        )
        .await;
        assert!(result.is_err(), "hanging request should time out");

        // Controls come back: the gate is idle, not stuck in flight.
        assert!(!controller.is_in_flight("CORN"));
        assert!(controller.pending_confirmation("CORN").is_none());
    }

    #[tokio::test]
    async fn confirm_without_preview_is_rejected() {
        let api = FakeApi::new(Vec::new());
        let mut controller = RollController::new(&api);
        let err = controller.confirm_transition("CORN").await.unwrap_err();
        assert!(matches!(err, RollError::NothingToConfirm(_)));
    }

    #[tokio::test]
    async fn cancel_drops_the_pending_pair() {
        let api = FakeApi::new(vec![Ok(preview())]);
        let mut controller = RollController::new(&api);

        controller
            .request_transition("CORN", ROLL_ADJUSTED)
            .await
            .unwrap();
        controller.cancel_confirmation("CORN");
        assert!(controller.pending_confirmation("CORN").is_none());

        let err = controller.confirm_transition("CORN").await.unwrap_err();
        assert!(matches!(err, RollError::NothingToConfirm(_)));
    }
}
