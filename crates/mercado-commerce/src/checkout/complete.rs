//! Placing orders: payment, then order, then the order store.

use std::sync::Arc;

use tracing::info;

use crate::cart::{Cart, PricedCart};
use crate::checkout::{CheckoutSession, Order, PaymentDetails, PaymentMethod};
use crate::clock::Clock;
use crate::error::CommerceError;
use crate::orders::OrderStore;
use crate::payment::{InstallmentProcessor, InstallmentRequest, StageEvent};

/// Ties a finished checkout session to payment and persistence.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    store: Arc<OrderStore>,
    processor: InstallmentProcessor,
    clock: Arc<dyn Clock>,
}

impl OrderPlacement {
    pub fn new(store: Arc<OrderStore>, processor: InstallmentProcessor, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            processor,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn processor(&self) -> &InstallmentProcessor {
        &self.processor
    }

    /// Run the installment confirmation and store the resulting order.
    ///
    /// `on_event` sees every stage event as it happens. The order is stored as
    /// soon as the plan is approved; the call returns once the run has closed.
    pub async fn place_installment_order(
        &self,
        session: &CheckoutSession,
        cart: &Cart,
        priced: &PricedCart,
        installments: u32,
        mut on_event: impl FnMut(&StageEvent),
    ) -> Result<Order, CommerceError> {
        let draft = session.draft(cart, priced)?;
        if draft.payment_method != PaymentMethod::Installments {
            return Err(CommerceError::PaymentMethodMismatch {
                expected: draft.payment_method.to_string(),
                got: PaymentMethod::Installments.to_string(),
            });
        }

        let mut run = self.processor.start(InstallmentRequest {
            total: draft.ledger.total,
            installments,
        })?;

        let mut draft = Some(draft);
        let mut placed = None;
        while let Some(event) = run.next_event().await {
            on_event(&event);
            match event {
                StageEvent::Approved(schedule) => {
                    if let Some(draft) = draft.take() {
                        let order = Order::place(
                            draft,
                            PaymentDetails::Installments { schedule },
                            self.clock.now(),
                        )?;
                        self.store.add_order(order.clone())?;
                        info!(order_number = %order.order_number, "installment order placed");
                        placed = Some(order);
                    }
                }
                StageEvent::Cancelled => return Err(CommerceError::PaymentCancelled),
                StageEvent::Failed(reason) => return Err(CommerceError::PaymentFailed(reason)),
                StageEvent::Entered(_) | StageEvent::Closed => {}
            }
        }

        placed.ok_or(CommerceError::PaymentNotActive)
    }

    /// Store an order paid by mobile payment, bank transfer, or cash.
    ///
    /// Mobile payment and bank transfer need the bank `reference`.
    pub fn place_order_with_reference(
        &self,
        session: &CheckoutSession,
        cart: &Cart,
        priced: &PricedCart,
        reference: Option<&str>,
    ) -> Result<Order, CommerceError> {
        let draft = session.draft(cart, priced)?;
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());

        let details = match (draft.payment_method, reference) {
            (PaymentMethod::MobilePayment, Some(r)) => PaymentDetails::MobilePayment {
                reference: r.to_string(),
            },
            (PaymentMethod::BankTransfer, Some(r)) => PaymentDetails::BankTransfer {
                reference: r.to_string(),
            },
            (PaymentMethod::CashOnDelivery, _) => PaymentDetails::CashOnDelivery,
            (PaymentMethod::Installments, _) => {
                return Err(CommerceError::ValidationError(
                    "installment orders go through the installment processor".into(),
                ))
            }
            (method, None) => {
                return Err(CommerceError::ValidationError(format!(
                    "{} requires a payment reference",
                    method.display_name()
                )))
            }
        };

        let order = Order::place(draft, details, self.clock.now())?;
        self.store.add_order(order.clone())?;
        info!(
            order_number = %order.order_number,
            method = %order.payment_method,
            "order placed"
        );
        Ok(order)
    }
}
