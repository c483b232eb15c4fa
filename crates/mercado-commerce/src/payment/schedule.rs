//! Installment amortization schedules.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::InstallmentConfig;
use crate::error::CommerceError;
use crate::money::Money;

/// State of a single scheduled installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    #[default]
    Pending,
}

/// One future payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    /// 1-based.
    pub installment_index: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub status: InstallmentStatus,
}

/// Payment plan produced when an installment payment is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    pub installments: u32,
    /// Paid at approval.
    pub initial_payment: Money,
    pub monthly_amount: Money,
    pub total_amount: Money,
    pub interest_rate: Decimal,
    pub payment_schedule: Vec<ScheduledInstallment>,
}

impl InstallmentSchedule {
    /// What remains after the initial payment.
    pub fn financed_amount(&self) -> Result<Money, CommerceError> {
        self.total_amount.checked_sub(&self.initial_payment)
    }
}

/// Split `total` into an initial payment and `installments` monthly ones,
/// the first due one month after `today`.
pub fn build_schedule(
    total: Money,
    installments: u32,
    today: NaiveDate,
    terms: &InstallmentConfig,
) -> Result<InstallmentSchedule, CommerceError> {
    if installments == 0 || installments > terms.max_installments {
        return Err(CommerceError::InvalidInstallments(
            installments,
            terms.max_installments,
        ));
    }
    if terms.initial_payment_ratio < Decimal::ZERO || terms.initial_payment_ratio > Decimal::ONE {
        return Err(CommerceError::ValidationError(format!(
            "initial payment ratio {} outside 0..=1",
            terms.initial_payment_ratio
        )));
    }

    let initial_payment = total.scale(terms.initial_payment_ratio)?.rounded();
    let financed = total
        .checked_sub(&initial_payment)?
        .scale(Decimal::ONE + terms.interest_rate)?
        .rounded();

    // Whole cents per month; the last installment absorbs the remainder.
    let share = financed.divide(Decimal::from(installments))?;
    let monthly_amount = Money::new(
        share
            .amount
            .round_dp_with_strategy(share.currency.decimal_places(), RoundingStrategy::ToZero),
        share.currency,
    );
    let last_amount = financed.checked_sub(&monthly_amount.times(installments - 1)?)?;

    let payment_schedule = (1..=installments)
        .map(|index| {
            let due_date = today
                .checked_add_months(Months::new(index))
                .ok_or(CommerceError::Overflow("installment due date"))?;
            Ok(ScheduledInstallment {
                installment_index: index,
                due_date,
                amount: if index == installments { last_amount } else { monthly_amount },
                status: InstallmentStatus::Pending,
            })
        })
        .collect::<Result<Vec<_>, CommerceError>>()?;

    Ok(InstallmentSchedule {
        installments,
        initial_payment,
        monthly_amount,
        total_amount: initial_payment.checked_add(&financed)?,
        interest_rate: terms.interest_rate,
        payment_schedule,
    })
}
