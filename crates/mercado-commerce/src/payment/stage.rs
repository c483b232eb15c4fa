//! Installment confirmation stages and the events they emit.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payment::InstallmentSchedule;

/// Where an installment confirmation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStage {
    /// Handing the buyer to the provider.
    Redirecting,
    /// Provider is evaluating the request.
    ProcessingRequest,
    /// Provider is validating the buyer.
    Validating,
    /// Plan approved; can no longer be cancelled.
    Approved,
    /// Flow finished after approval.
    Closed,
    /// Buyer cancelled before approval.
    Cancelled,
    /// Flow aborted by an error.
    Failed,
}

impl PaymentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStage::Redirecting => "redirecting",
            PaymentStage::ProcessingRequest => "processing_request",
            PaymentStage::Validating => "validating",
            PaymentStage::Approved => "approved",
            PaymentStage::Closed => "closed",
            PaymentStage::Cancelled => "cancelled",
            PaymentStage::Failed => "failed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentStage::Redirecting => "Redirecting to provider",
            PaymentStage::ProcessingRequest => "Processing request",
            PaymentStage::Validating => "Validating",
            PaymentStage::Approved => "Approved",
            PaymentStage::Closed => "Closed",
            PaymentStage::Cancelled => "Cancelled",
            PaymentStage::Failed => "Failed",
        }
    }

    /// Cancellation is only possible before approval.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            PaymentStage::Redirecting | PaymentStage::ProcessingRequest | PaymentStage::Validating
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            PaymentStage::Closed | PaymentStage::Cancelled | PaymentStage::Failed
        )
    }
}

impl fmt::Display for PaymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable step of a run. A run emits a finite sequence ending in
/// `Closed`, `Cancelled` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Entered(PaymentStage),
    Approved(InstallmentSchedule),
    Closed,
    Cancelled,
    Failed(String),
}

impl StageEvent {
    /// Stage the run is in once this event is emitted.
    pub fn stage(&self) -> PaymentStage {
        match self {
            StageEvent::Entered(stage) => *stage,
            StageEvent::Approved(_) => PaymentStage::Approved,
            StageEvent::Closed => PaymentStage::Closed,
            StageEvent::Cancelled => PaymentStage::Cancelled,
            StageEvent::Failed(_) => PaymentStage::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage().is_finished()
    }
}
