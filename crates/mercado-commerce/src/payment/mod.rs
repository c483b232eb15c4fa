//! Installment ("buy now, pay later") payments.

mod processor;
mod schedule;
mod stage;

pub use processor::{InstallmentProcessor, InstallmentRequest, InstallmentRun};
pub use schedule::{build_schedule, InstallmentSchedule, InstallmentStatus, ScheduledInstallment};
pub use stage::{PaymentStage, StageEvent};
