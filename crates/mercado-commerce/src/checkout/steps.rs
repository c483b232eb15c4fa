//! Checkout step state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CommerceError;

/// Steps in the checkout flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Invoicing data.
    FiscalData,
    /// Delivery address and contact.
    Shipping,
    /// Payment method.
    Payment,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 3] = [
        CheckoutStep::FiscalData,
        CheckoutStep::Shipping,
        CheckoutStep::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::FiscalData => "fiscal_data",
            CheckoutStep::Shipping => "shipping",
            CheckoutStep::Payment => "payment",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CheckoutStep::FiscalData => "Fiscal data",
            CheckoutStep::Shipping => "Shipping",
            CheckoutStep::Payment => "Payment",
        }
    }

    /// 0-based position in the flow.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`StepController::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAdvance {
    /// Now on this step.
    Moved(CheckoutStep),
    /// The last step was already active; the flow is done. The controller
    /// stays on that step.
    Completed,
}

/// What the checkout UI renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub current_step: CheckoutStep,
    /// Number of completed steps; steps `0..completed_up_to` are done.
    /// Always the current step's index.
    pub completed_up_to: usize,
}

/// Linear step tracker.
///
/// Step `i` is completed iff `current > i`, active iff `current == i`, and
/// navigable iff either. Going back never discards later data; it just
/// lowers `current`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepController {
    current: usize,
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> CheckoutStep {
        CheckoutStep::from_index(self.current).unwrap_or(CheckoutStep::Payment)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Jump to an earlier or the current step.
    pub fn go_to(&mut self, step: usize) -> Result<CheckoutStep, CommerceError> {
        let target = CheckoutStep::from_index(step).ok_or(CommerceError::UnknownStep(step))?;
        if step > self.current {
            return Err(CommerceError::StepLocked {
                requested: step,
                current: self.current,
            });
        }
        self.current = step;
        Ok(target)
    }

    /// Move forward one step.
    pub fn advance(&mut self) -> StepAdvance {
        match CheckoutStep::from_index(self.current + 1) {
            Some(next) => {
                self.current += 1;
                StepAdvance::Moved(next)
            }
            None => StepAdvance::Completed,
        }
    }

    /// Step back one; no-op on the first step.
    pub fn back(&mut self) -> CheckoutStep {
        self.current = self.current.saturating_sub(1);
        self.current()
    }

    pub fn is_completed(&self, step: CheckoutStep) -> bool {
        self.current > step.index()
    }

    pub fn is_active(&self, step: CheckoutStep) -> bool {
        self.current == step.index()
    }

    pub fn is_navigable(&self, step: CheckoutStep) -> bool {
        self.is_completed(step) || self.is_active(step)
    }

    pub fn view(&self) -> StepView {
        StepView {
            current_step: self.current(),
            completed_up_to: self.current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_to_only_reaches_visited_steps() {
        let mut steps = StepController::new();
        assert!(matches!(
            steps.go_to(1),
            Err(CommerceError::StepLocked {
                requested: 1,
                current: 0
            })
        ));

        assert_eq!(steps.advance(), StepAdvance::Moved(CheckoutStep::Shipping));
        assert_eq!(steps.go_to(0).unwrap(), CheckoutStep::FiscalData);
        assert_eq!(steps.current_index(), 0);
    }

    #[test]
    fn test_go_to_is_bounded_by_current() {
        for current in 0..CheckoutStep::ALL.len() {
            let mut steps = StepController::new();
            for _ in 0..current {
                steps.advance();
            }
            for target in 0..current + 3 {
                let mut attempt = steps.clone();
                let result = attempt.go_to(target);
                assert_eq!(result.is_ok(), target <= current, "current {current} target {target}");
                if result.is_err() {
                    assert_eq!(attempt, steps);
                }
            }
        }
    }

    #[test]
    fn test_completed_and_active() {
        let mut steps = StepController::new();
        steps.advance();

        assert!(steps.is_completed(CheckoutStep::FiscalData));
        assert!(steps.is_active(CheckoutStep::Shipping));
        assert!(steps.is_navigable(CheckoutStep::Shipping));
        assert!(!steps.is_navigable(CheckoutStep::Payment));
        assert_eq!(
            steps.view(),
            StepView {
                current_step: CheckoutStep::Shipping,
                completed_up_to: 1
            }
        );
    }

    #[test]
    fn test_advance_past_last_step_completes() {
        let mut steps = StepController::new();
        steps.advance();
        steps.advance();
        let before = steps.clone();
        assert_eq!(steps.advance(), StepAdvance::Completed);
        assert_eq!(steps, before);
        assert_eq!(steps.current(), CheckoutStep::Payment);

        steps.back();
        assert_eq!(steps.current(), CheckoutStep::Shipping);
    }

    #[test]
    fn test_completed_iff_past_current() {
        let mut steps = StepController::new();
        for _ in 0..3 {
            steps.advance();
        }

        assert!(steps.is_active(CheckoutStep::Payment));
        assert!(!steps.is_completed(CheckoutStep::Payment));
        for step in CheckoutStep::ALL {
            assert!(!(steps.is_completed(step) && steps.is_active(step)), "{step}");
            assert_eq!(steps.is_completed(step), steps.current_index() > step.index());
        }
        assert_eq!(steps.view().completed_up_to, steps.current_index());
    }
}
