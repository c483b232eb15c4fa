//! Staged installment confirmation.
//!
//! A run walks `redirecting → processing_request → validating → approved`,
//! dwelling the configured time in each stage, builds the schedule on
//! approval and closes itself after a grace delay. Every event goes through
//! the same lock as cancellation and teardown, so once `cancel` returns or
//! the run handle is dropped nothing more is emitted.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::InstallmentConfig;
use crate::error::CommerceError;
use crate::money::{Currency, Money};
use crate::payment::{build_schedule, InstallmentSchedule, PaymentStage, StageEvent};

/// What to finance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentRequest {
    /// Order total in USD.
    pub total: Money,
    pub installments: u32,
}

/// Starts installment runs. At most one run is active per processor.
#[derive(Clone)]
pub struct InstallmentProcessor {
    terms: InstallmentConfig,
    clock: Arc<dyn Clock>,
    active: Arc<Mutex<Option<Arc<RunControl>>>>,
}

impl InstallmentProcessor {
    pub fn new(terms: InstallmentConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            terms,
            clock,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn terms(&self) -> &InstallmentConfig {
        &self.terms
    }

    /// Start a run, tearing down the previous one first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: InstallmentRequest) -> Result<InstallmentRun, CommerceError> {
        if request.total.currency != Currency::USD || !request.total.is_positive() {
            return Err(CommerceError::ValidationError(format!(
                "installment total must be a positive USD amount, got {}",
                request.total
            )));
        }
        if request.installments == 0 || request.installments > self.terms.max_installments {
            return Err(CommerceError::InvalidInstallments(
                request.installments,
                self.terms.max_installments,
            ));
        }

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            debug!("tearing down previous installment run");
            previous.teardown();
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let control = Arc::new(RunControl {
            state: Mutex::new(RunState {
                stage: PaymentStage::Redirecting,
                events: Some(events_tx),
            }),
            cancel: cancel_tx,
            task: Mutex::new(None),
        });

        info!(
            total = %request.total,
            installments = request.installments,
            "starting installment payment"
        );
        let task = tokio::spawn(drive(
            control.clone(),
            request,
            self.terms.clone(),
            self.clock.clone(),
            cancel_rx,
        ));
        *control.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        *active = Some(control.clone());

        Ok(InstallmentRun {
            control,
            events: events_rx,
        })
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|control| !control.is_finished())
    }
}

impl fmt::Debug for InstallmentProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallmentProcessor")
            .field("terms", &self.terms)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Handle to one run. Dropping it tears the run down.
pub struct InstallmentRun {
    control: Arc<RunControl>,
    events: mpsc::UnboundedReceiver<StageEvent>,
}

impl InstallmentRun {
    pub fn stage(&self) -> PaymentStage {
        self.control.lock().stage
    }

    /// Cancel before approval.
    pub fn cancel(&self) -> Result<(), CommerceError> {
        self.control.cancel()
    }

    /// Next event, or `None` once the run has ended and every event has been
    /// read.
    pub async fn next_event(&mut self) -> Option<StageEvent> {
        self.events.recv().await
    }

    /// Read events until the schedule arrives.
    pub async fn wait_for_schedule(&mut self) -> Result<InstallmentSchedule, CommerceError> {
        while let Some(event) = self.next_event().await {
            match event {
                StageEvent::Approved(schedule) => return Ok(schedule),
                StageEvent::Cancelled => return Err(CommerceError::PaymentCancelled),
                StageEvent::Failed(reason) => return Err(CommerceError::PaymentFailed(reason)),
                StageEvent::Entered(_) | StageEvent::Closed => {}
            }
        }
        Err(CommerceError::PaymentNotActive)
    }
}

impl Drop for InstallmentRun {
    fn drop(&mut self) {
        self.control.teardown();
    }
}

impl fmt::Debug for InstallmentRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallmentRun")
            .field("stage", &self.stage())
            .finish_non_exhaustive()
    }
}

struct RunControl {
    state: Mutex<RunState>,
    cancel: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct RunState {
    stage: PaymentStage,
    /// `None` once the run has ended or been torn down.
    events: Option<mpsc::UnboundedSender<StageEvent>>,
}

impl RunControl {
    fn lock(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_finished(&self) -> bool {
        self.lock().events.is_none()
    }

    /// Publish `event`. Returns false if the run is no longer live.
    fn emit(&self, event: StageEvent) -> bool {
        let mut state = self.lock();
        if state.events.is_none() {
            return false;
        }
        let terminal = event.is_terminal();
        state.stage = event.stage();
        debug!(stage = %state.stage, "installment stage");
        if let Some(events) = &state.events {
            // A dropped receiver means the handle is gone; teardown follows.
            let _ = events.send(event);
        }
        if terminal {
            state.events = None;
        }
        true
    }

    fn cancel(&self) -> Result<(), CommerceError> {
        let mut state = self.lock();
        if state.stage == PaymentStage::Approved {
            return Err(CommerceError::PaymentCommitted);
        }
        if !state.stage.is_cancellable() {
            return Err(CommerceError::PaymentNotActive);
        }
        let Some(events) = state.events.take() else {
            return Err(CommerceError::PaymentNotActive);
        };
        state.stage = PaymentStage::Cancelled;
        let _ = events.send(StageEvent::Cancelled);
        drop(state);

        info!("installment payment cancelled");
        self.stop();
        Ok(())
    }

    /// Silence the run and stop its timers.
    fn teardown(&self) {
        self.lock().events = None;
        self.stop();
    }

    fn stop(&self) {
        self.cancel.send_replace(true);
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

async fn drive(
    control: Arc<RunControl>,
    request: InstallmentRequest,
    terms: InstallmentConfig,
    clock: Arc<dyn Clock>,
    mut cancel: watch::Receiver<bool>,
) {
    let stages = [
        (PaymentStage::Redirecting, terms.redirect_ms),
        (PaymentStage::ProcessingRequest, terms.processing_ms),
        (PaymentStage::Validating, terms.validating_ms),
    ];
    for (stage, dwell_ms) in stages {
        if !control.emit(StageEvent::Entered(stage)) || !dwell(dwell_ms, &mut cancel).await {
            return;
        }
    }

    let schedule = match build_schedule(request.total, request.installments, clock.today(), &terms) {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!(error = %e, "installment schedule rejected");
            control.emit(StageEvent::Failed(e.to_string()));
            return;
        }
    };
    info!(
        installments = schedule.installments,
        initial_payment = %schedule.initial_payment,
        monthly_amount = %schedule.monthly_amount,
        "installment payment approved"
    );
    if !control.emit(StageEvent::Approved(schedule)) || !dwell(terms.close_grace_ms, &mut cancel).await {
        return;
    }
    control.emit(StageEvent::Closed);
}

/// Sleep for `ms`, returning false if the run is stopped first.
async fn dwell(ms: u64, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
        _ = stopped(cancel) => false,
    }
}

async fn stopped(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tokio::time::Instant;

    fn processor() -> InstallmentProcessor {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 4, 15, 12, 0, 0).unwrap());
        InstallmentProcessor::new(InstallmentConfig::default(), Arc::new(clock))
    }

    fn request(total: rust_decimal::Decimal) -> InstallmentRequest {
        InstallmentRequest {
            total: Money::usd(total),
            installments: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_sequence_and_timing() {
        let processor = processor();
        let start = Instant::now();
        let mut run = processor.start(request(dec!(100))).unwrap();

        let mut seen = Vec::new();
        while let Some(event) = run.next_event().await {
            seen.push((event, start.elapsed().as_millis()));
        }

        let stages: Vec<PaymentStage> = seen.iter().map(|(e, _)| e.stage()).collect();
        assert_eq!(
            stages,
            [
                PaymentStage::Redirecting,
                PaymentStage::ProcessingRequest,
                PaymentStage::Validating,
                PaymentStage::Approved,
                PaymentStage::Closed,
            ]
        );
        let times: Vec<u128> = seen.iter().map(|(_, t)| *t).collect();
        assert_eq!(times, [0, 2_000, 5_000, 7_000, 10_000]);

        let StageEvent::Approved(schedule) = &seen[3].0 else {
            panic!("expected approval, got {:?}", seen[3].0);
        };
        assert_eq!(schedule.initial_payment.amount, dec!(40));
        assert_eq!(schedule.monthly_amount.amount, dec!(20));
        assert_eq!(
            schedule.payment_schedule[0].due_date,
            NaiveDate::from_ymd_opt(2026, 5, 15).unwrap()
        );
        assert_eq!(run.stage(), PaymentStage::Closed);
        assert!(!processor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_approval_stops_events() {
        let processor = processor();
        let mut run = processor.start(request(dec!(50))).unwrap();

        assert_eq!(
            run.next_event().await,
            Some(StageEvent::Entered(PaymentStage::Redirecting))
        );
        assert_eq!(
            run.next_event().await,
            Some(StageEvent::Entered(PaymentStage::ProcessingRequest))
        );

        run.cancel().unwrap();
        assert_eq!(run.stage(), PaymentStage::Cancelled);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(run.next_event().await, Some(StageEvent::Cancelled));
        assert_eq!(run.next_event().await, None);
        assert!(matches!(run.cancel(), Err(CommerceError::PaymentNotActive)));
        assert!(!processor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_approval_is_rejected() {
        let processor = processor();
        let mut run = processor.start(request(dec!(100))).unwrap();

        let schedule = run.wait_for_schedule().await.unwrap();
        assert_eq!(schedule.installments, 3);
        assert!(matches!(run.cancel(), Err(CommerceError::PaymentCommitted)));

        assert_eq!(run.next_event().await, Some(StageEvent::Closed));
        assert_eq!(run.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_tears_down_previous() {
        let processor = processor();
        let mut first = processor.start(request(dec!(100))).unwrap();
        assert_eq!(
            first.next_event().await,
            Some(StageEvent::Entered(PaymentStage::Redirecting))
        );

        let mut second = processor.start(request(dec!(80))).unwrap();

        assert_eq!(first.next_event().await, None);
        let schedule = second.wait_for_schedule().await.unwrap();
        assert_eq!(schedule.total_amount.amount, dec!(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_run_stops_it() {
        let processor = processor();
        let run = processor.start(request(dec!(100))).unwrap();
        assert!(processor.is_running());

        drop(run);
        assert!(!processor.is_running());
    }

    #[tokio::test]
    async fn test_emit_records_stage_and_closes_on_terminal() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let control = RunControl {
            state: Mutex::new(RunState {
                stage: PaymentStage::Redirecting,
                events: Some(events_tx),
            }),
            cancel: cancel_tx,
            task: Mutex::new(None),
        };

        assert!(control.emit(StageEvent::Entered(PaymentStage::Validating)));
        assert_eq!(control.lock().stage, PaymentStage::Validating);
        assert!(!control.is_finished());

        assert!(control.emit(StageEvent::Closed));
        assert!(control.is_finished());
        assert!(!control.emit(StageEvent::Entered(PaymentStage::Redirecting)));
        assert_eq!(control.lock().stage, PaymentStage::Closed);

        assert_eq!(
            events_rx.recv().await,
            Some(StageEvent::Entered(PaymentStage::Validating))
        );
        assert_eq!(events_rx.recv().await, Some(StageEvent::Closed));
        assert_eq!(events_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let processor = processor();
        let zero = InstallmentRequest {
            total: Money::usd(dec!(100)),
            installments: 0,
        };
        assert!(matches!(
            processor.start(zero),
            Err(CommerceError::InvalidInstallments(0, 12))
        ));

        let ves = InstallmentRequest {
            total: Money::ves(dec!(100)),
            installments: 3,
        };
        assert!(processor.start(ves).is_err());
    }
}
