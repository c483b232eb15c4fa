//! Checkout session: the step controller plus what the buyer has entered.

use serde::Serialize;

use crate::cart::{Cart, PricedCart};
use crate::checkout::{
    CheckoutStep, DeliveryInfo, FiscalData, OrderDraft, OrderItem, PaymentMethod, StepAdvance,
    StepController, StepView,
};
use crate::error::CommerceError;
use crate::ids::CheckoutId;

/// One buyer's pass through checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutSession {
    id: CheckoutId,
    #[serde(skip)]
    steps: StepController,
    fiscal_data: Option<FiscalData>,
    delivery_info: Option<DeliveryInfo>,
    payment_method: Option<PaymentMethod>,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutSession {
    pub fn new() -> Self {
        Self {
            id: CheckoutId::generate(),
            steps: StepController::new(),
            fiscal_data: None,
            delivery_info: None,
            payment_method: None,
        }
    }

    pub fn id(&self) -> &CheckoutId {
        &self.id
    }

    pub fn view(&self) -> StepView {
        self.steps.view()
    }

    pub fn current_step(&self) -> CheckoutStep {
        self.steps.current()
    }

    pub fn fiscal_data(&self) -> Option<&FiscalData> {
        self.fiscal_data.as_ref()
    }

    pub fn delivery_info(&self) -> Option<&DeliveryInfo> {
        self.delivery_info.as_ref()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    /// Whether every step has been submitted.
    pub fn is_complete(&self) -> bool {
        self.fiscal_data.is_some() && self.delivery_info.is_some() && self.payment_method.is_some()
    }

    /// Navigate back to a visited step.
    pub fn go_to(&mut self, step: usize) -> Result<CheckoutStep, CommerceError> {
        self.steps.go_to(step)
    }

    /// Submit invoicing data. Moves on when the fiscal step is active;
    /// otherwise just replaces the stored data.
    pub fn submit_fiscal_data(&mut self, data: FiscalData) -> Result<StepView, CommerceError> {
        data.validate()?;
        self.submit(CheckoutStep::FiscalData)?;
        self.fiscal_data = Some(data);
        Ok(self.finish_submit(CheckoutStep::FiscalData))
    }

    pub fn submit_delivery_info(&mut self, info: DeliveryInfo) -> Result<StepView, CommerceError> {
        info.validate()?;
        self.submit(CheckoutStep::Shipping)?;
        self.delivery_info = Some(info);
        Ok(self.finish_submit(CheckoutStep::Shipping))
    }

    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<StepView, CommerceError> {
        self.submit(CheckoutStep::Payment)?;
        self.payment_method = Some(method);
        Ok(self.finish_submit(CheckoutStep::Payment))
    }

    /// Everything needed for an order, once all steps are done.
    ///
    /// `priced` must have been computed from `cart`'s current lines.
    pub fn draft(&self, cart: &Cart, priced: &PricedCart) -> Result<OrderDraft, CommerceError> {
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }
        let fiscal_data = self
            .fiscal_data
            .clone()
            .ok_or_else(|| CommerceError::CheckoutIncomplete("fiscal data".into()))?;
        let delivery_info = self
            .delivery_info
            .clone()
            .ok_or_else(|| CommerceError::CheckoutIncomplete("delivery info".into()))?;
        let payment_method = self
            .payment_method
            .ok_or_else(|| CommerceError::CheckoutIncomplete("payment method".into()))?;

        if priced.ledger.subtotal != cart.subtotal_usd()? || priced.total_weight != cart.total_weight() {
            return Err(CommerceError::ValidationError(
                "priced cart does not match the cart".into(),
            ));
        }

        let items = cart
            .lines()
            .iter()
            .map(OrderItem::from_line)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderDraft {
            items,
            ledger: priced.ledger,
            currency: priced.currency,
            exchange_rate: priced.rate.clone(),
            payment_method,
            fiscal_data,
            delivery_info,
        })
    }

    fn submit(&self, step: CheckoutStep) -> Result<(), CommerceError> {
        if !self.steps.is_navigable(step) {
            return Err(CommerceError::StepLocked {
                requested: step.index(),
                current: self.steps.current_index(),
            });
        }
        Ok(())
    }

    fn finish_submit(&mut self, step: CheckoutStep) -> StepView {
        if self.steps.is_active(step) {
            if let StepAdvance::Completed = self.steps.advance() {
                tracing::debug!(checkout = %self.id, "checkout steps complete");
            }
        }
        self.steps.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{price, CartLine};
    use crate::config::PricingConfig;
    use crate::currency::{ExchangeRate, RateSource};
    use crate::money::{Currency, Money};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fiscal() -> FiscalData {
        FiscalData::new("J-30123456-7", "Bodega La Esquina", "Av. Bolívar, Valencia").unwrap()
    }

    fn delivery() -> DeliveryInfo {
        DeliveryInfo::new("Calle 5, Local 2", "Valencia", "Carabobo", "0412-555-0101")
    }

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_line(CartLine::new("rice", "Rice", Money::usd(dec!(1.5)), 10, "kg").unwrap())
            .unwrap();
        cart
    }

    fn rate() -> ExchangeRate {
        ExchangeRate::new(dec!(36), Utc::now(), RateSource::Official).unwrap()
    }

    #[test]
    fn test_steps_advance_with_submissions() {
        let mut session = CheckoutSession::new();
        assert!(matches!(
            session.submit_delivery_info(delivery()),
            Err(CommerceError::StepLocked { .. })
        ));

        let view = session.submit_fiscal_data(fiscal()).unwrap();
        assert_eq!(view.current_step, CheckoutStep::Shipping);

        let view = session.submit_delivery_info(delivery()).unwrap();
        assert_eq!(view.current_step, CheckoutStep::Payment);

        assert!(!session.is_complete());
        let view = session.select_payment_method(PaymentMethod::BankTransfer).unwrap();
        assert_eq!(view.current_step, CheckoutStep::Payment);
        assert_eq!(view.completed_up_to, CheckoutStep::Payment.index());
        assert!(session.is_complete());

        let view = session.select_payment_method(PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(view.current_step, CheckoutStep::Payment);
        assert_eq!(session.payment_method(), Some(PaymentMethod::CashOnDelivery));
    }

    #[test]
    fn test_going_back_keeps_data_and_resubmits() {
        let mut session = CheckoutSession::new();
        session.submit_fiscal_data(fiscal()).unwrap();
        session.submit_delivery_info(delivery()).unwrap();

        assert!(session.go_to(2).is_ok());
        assert!(session.go_to(0).is_ok());
        assert!(matches!(
            session.go_to(2),
            Err(CommerceError::StepLocked {
                requested: 2,
                current: 0
            })
        ));
        assert!(session.delivery_info().is_some());

        session.submit_fiscal_data(fiscal()).unwrap();
        assert_eq!(session.current_step(), CheckoutStep::Shipping);
    }

    #[test]
    fn test_invalid_data_does_not_advance() {
        let mut session = CheckoutSession::new();
        let bad = FiscalData {
            tax_id: "123".into(),
            business_name: "X".into(),
            fiscal_address: "Y".into(),
        };
        assert!(session.submit_fiscal_data(bad).is_err());
        assert_eq!(session.current_step(), CheckoutStep::FiscalData);
        assert!(session.fiscal_data().is_none());
    }

    #[test]
    fn test_draft_requires_complete_checkout() {
        let cart = cart();
        let priced = price(cart.lines(), Currency::VES, &rate(), &PricingConfig::default()).unwrap();

        let mut session = CheckoutSession::new();
        session.submit_fiscal_data(fiscal()).unwrap();
        assert!(matches!(
            session.draft(&cart, &priced),
            Err(CommerceError::CheckoutIncomplete(_))
        ));

        session.submit_delivery_info(delivery()).unwrap();
        session.select_payment_method(PaymentMethod::Installments).unwrap();
        let draft = session.draft(&cart, &priced).unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.ledger.subtotal, Money::usd(dec!(15)));
        assert_eq!(draft.currency, Currency::VES);
        assert_eq!(draft.payment_method, PaymentMethod::Installments);
    }

    #[test]
    fn test_draft_rejects_empty_or_stale_pricing() {
        let mut session = CheckoutSession::new();
        session.submit_fiscal_data(fiscal()).unwrap();
        session.submit_delivery_info(delivery()).unwrap();
        session.select_payment_method(PaymentMethod::CashOnDelivery).unwrap();

        let empty = Cart::new();
        let priced = price(empty.lines(), Currency::USD, &rate(), &PricingConfig::default()).unwrap();
        assert!(matches!(session.draft(&empty, &priced), Err(CommerceError::EmptyCart)));

        let mut cart = cart();
        let priced = price(cart.lines(), Currency::USD, &rate(), &PricingConfig::default()).unwrap();
        cart.increment(&"rice".into()).unwrap();
        assert!(matches!(
            session.draft(&cart, &priced),
            Err(CommerceError::ValidationError(_))
        ));
    }
}
