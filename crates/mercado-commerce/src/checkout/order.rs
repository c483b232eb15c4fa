//! Order types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cart::{CartLine, PriceBreakdown};
use crate::checkout::{DeliveryInfo, FiscalData};
use crate::currency::ExchangeRate;
use crate::error::CommerceError;
use crate::ids::{OrderId, ProductId};
use crate::money::{Currency, Money};
use crate::payment::InstallmentSchedule;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    #[default]
    Pending,
    /// Order confirmed by the seller.
    Confirmed,
    /// Order being prepared.
    Processing,
    /// Order handed to logistics.
    Shipped,
    /// Order delivered.
    Delivered,
    /// Order cancelled.
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Check if order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed) | (Confirmed, Processing) | (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            (_, Cancelled) => self.can_cancel(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment methods offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Buy now, pay later through the installment provider.
    Installments,
    MobilePayment,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Installments => "installments",
            PaymentMethod::MobilePayment => "mobile_payment",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Installments => "Installments",
            PaymentMethod::MobilePayment => "Mobile payment",
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::CashOnDelivery => "Cash on delivery",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "installments" => Some(PaymentMethod::Installments),
            "mobile_payment" => Some(PaymentMethod::MobilePayment),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "cash_on_delivery" | "cash" => Some(PaymentMethod::CashOnDelivery),
            _ => None,
        }
    }

    /// Methods whose confirmation carries a bank reference number.
    pub fn needs_reference(&self) -> bool {
        matches!(self, PaymentMethod::MobilePayment | PaymentMethod::BankTransfer)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact produced by the payment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentDetails {
    Installments { schedule: InstallmentSchedule },
    MobilePayment { reference: String },
    BankTransfer { reference: String },
    CashOnDelivery,
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Installments { .. } => PaymentMethod::Installments,
            PaymentDetails::MobilePayment { .. } => PaymentMethod::MobilePayment,
            PaymentDetails::BankTransfer { .. } => PaymentMethod::BankTransfer,
            PaymentDetails::CashOnDelivery => PaymentMethod::CashOnDelivery,
        }
    }

    pub fn schedule(&self) -> Option<&InstallmentSchedule> {
        match self {
            PaymentDetails::Installments { schedule } => Some(schedule),
            _ => None,
        }
    }
}

/// Snapshot of a cart line at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    /// USD.
    pub unit_price: Money,
    pub quantity: u32,
    pub unit: String,
    /// USD.
    pub line_total: Money,
}

impl OrderItem {
    pub fn from_line(line: &CartLine) -> Result<Self, CommerceError> {
        Ok(Self {
            product_id: line.product_id().clone(),
            name: line.name().to_string(),
            unit_price: line.unit_price(),
            quantity: line.quantity(),
            unit: line.unit().to_string(),
            line_total: line.line_total()?,
        })
    }
}

/// Everything needed to place an order except the payment artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub items: Vec<OrderItem>,
    /// USD.
    pub ledger: PriceBreakdown,
    /// Currency the buyer saw.
    pub currency: Currency,
    pub exchange_rate: ExchangeRate,
    pub payment_method: PaymentMethod,
    pub fiscal_data: FiscalData,
    pub delivery_info: DeliveryInfo,
}

/// A placed order.
///
/// Amounts are the USD ledger values; `currency` records what the buyer saw
/// and `exchange_rate` the rate used to show it. Records written before
/// the rate was stored have none and display in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable order number (`ORD-<unix seconds>-<suffix>`).
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub logistics: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<ExchangeRate>,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_data: Option<FiscalData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<DeliveryInfo>,
}

impl Order {
    /// Turn a draft into a pending order.
    pub fn place(
        draft: OrderDraft,
        payment_details: PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<Self, CommerceError> {
        if payment_details.method() != draft.payment_method {
            return Err(CommerceError::PaymentMethodMismatch {
                expected: draft.payment_method.to_string(),
                got: payment_details.method().to_string(),
            });
        }
        if draft.items.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let id = OrderId::generate();
        Ok(Self {
            order_number: Self::generate_order_number(&id, now),
            id,
            items: draft.items,
            subtotal: draft.ledger.subtotal,
            logistics: draft.ledger.logistics,
            tax: draft.ledger.tax,
            total: draft.ledger.total,
            currency: draft.currency,
            exchange_rate: Some(draft.exchange_rate),
            payment_method: draft.payment_method,
            payment_details,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            fiscal_data: Some(draft.fiscal_data),
            delivery_info: Some(draft.delivery_info),
        })
    }

    /// `ORD-<unix seconds>-<last four id characters>`.
    pub fn generate_order_number(id: &OrderId, now: DateTime<Utc>) -> String {
        let raw = id.as_str();
        let suffix = raw.get(raw.len().saturating_sub(4)..).unwrap_or(raw);
        format!("ORD-{}-{}", now.timestamp(), suffix.to_uppercase())
    }

    /// Get total item count.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Total in the currency the buyer saw.
    pub fn display_total(&self) -> Result<Money, CommerceError> {
        self.display_amount(&self.total)
    }

    /// A USD ledger amount in the order's display currency, or unchanged
    /// when the order carries no rate.
    pub fn display_amount(&self, amount: &Money) -> Result<Money, CommerceError> {
        match &self.exchange_rate {
            Some(rate) => rate.convert(amount, self.currency),
            None => Ok(*amount),
        }
    }

    pub fn schedule(&self) -> Option<&InstallmentSchedule> {
        self.payment_details.schedule()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::RateSource;
    use rust_decimal_macros::dec;

    #[test]
    fn test_only_lifecycle_transitions_succeed() {
        use OrderStatus::*;
        let allowed = [
            (Pending, Confirmed),
            (Confirmed, Processing),
            (Processing, Shipped),
            (Shipped, Delivered),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
            (Processing, Cancelled),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(!OrderStatus::Shipped.can_cancel());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(OrderStatus::from_str_opt("Shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::from_str_opt("lost"), None);
        assert_eq!(
            PaymentMethod::from_str_opt("bank-transfer"),
            Some(PaymentMethod::BankTransfer)
        );
    }

    #[test]
    fn test_order_number_format() {
        let now = DateTime::parse_from_rfc3339("2026-02-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let number = Order::generate_order_number(&OrderId::new("abc12f9e"), now);
        assert_eq!(number, format!("ORD-{}-2F9E", now.timestamp()));
    }

    #[test]
    fn test_place_rejects_mismatched_details() {
        let draft = OrderDraft {
            items: vec![OrderItem {
                product_id: ProductId::new("rice"),
                name: "Rice".into(),
                unit_price: Money::usd(dec!(1)),
                quantity: 5,
                unit: "kg".into(),
                line_total: Money::usd(dec!(5)),
            }],
            ledger: PriceBreakdown {
                subtotal: Money::usd(dec!(5)),
                logistics: Money::usd(dec!(5)),
                tax: Money::usd(dec!(0)),
                total: Money::usd(dec!(10)),
            },
            currency: Currency::USD,
            exchange_rate: ExchangeRate::new(dec!(36), Utc::now(), RateSource::Official).unwrap(),
            payment_method: PaymentMethod::BankTransfer,
            fiscal_data: FiscalData::new("J123456789", "Bodega", "Caracas").unwrap(),
            delivery_info: DeliveryInfo::new("Calle 1", "Caracas", "DC", "04125550101"),
        };

        let result = Order::place(draft.clone(), PaymentDetails::CashOnDelivery, Utc::now());
        assert!(matches!(result, Err(CommerceError::PaymentMethodMismatch { .. })));

        let order = Order::place(
            draft,
            PaymentDetails::BankTransfer {
                reference: "0102-998877".into(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Money::usd(dec!(10)));
        assert!(order.order_number.starts_with("ORD-"));
        assert!(order.exchange_rate.is_some());
    }

    #[test]
    fn test_record_without_rate_decodes_and_displays_in_usd() {
        let draft = OrderDraft {
            items: vec![OrderItem {
                product_id: ProductId::new("flour"),
                name: "Flour".into(),
                unit_price: Money::usd(dec!(2)),
                quantity: 5,
                unit: "kg".into(),
                line_total: Money::usd(dec!(10)),
            }],
            ledger: PriceBreakdown {
                subtotal: Money::usd(dec!(10)),
                logistics: Money::usd(dec!(5)),
                tax: Money::usd(dec!(0)),
                total: Money::usd(dec!(15)),
            },
            currency: Currency::VES,
            exchange_rate: ExchangeRate::new(dec!(36), Utc::now(), RateSource::Official).unwrap(),
            payment_method: PaymentMethod::CashOnDelivery,
            fiscal_data: FiscalData::new("J123456789", "Bodega", "Caracas").unwrap(),
            delivery_info: DeliveryInfo::new("Calle 1", "Caracas", "DC", "04125550101"),
        };
        let placed = Order::place(draft, PaymentDetails::CashOnDelivery, Utc::now()).unwrap();
        assert_eq!(placed.display_total().unwrap(), Money::ves(dec!(540)));

        let mut record = serde_json::to_value(&placed).unwrap();
        record.as_object_mut().unwrap().remove("exchange_rate");
        let legacy: Order = serde_json::from_value(record).unwrap();

        assert_eq!(legacy.exchange_rate, None);
        assert_eq!(legacy.display_total().unwrap(), Money::usd(dec!(15)));
        let encoded = serde_json::to_value(&legacy).unwrap();
        assert!(encoded.get("exchange_rate").is_none());
    }
}
