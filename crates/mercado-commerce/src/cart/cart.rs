//! Cart and cart line types.

use serde::Serialize;

use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::{Currency, Money};

/// Minimum order quantity applied to every line unless overridden.
pub const MIN_ORDER_QUANTITY: u32 = 5;

/// Maximum quantity allowed per line.
pub const MAX_QUANTITY_PER_LINE: u32 = 9999;

/// One product in the cart, priced in USD.
///
/// Fields are private so the quantity floor and the USD price can't be
/// bypassed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    product_id: ProductId,
    name: String,
    unit_price: Money,
    quantity: u32,
    unit: String,
    minimum_quantity: u32,
}

impl CartLine {
    /// Create a line with the default minimum quantity.
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        unit: impl Into<String>,
    ) -> Result<Self, CommerceError> {
        Self::with_minimum(product_id, name, unit_price, quantity, unit, MIN_ORDER_QUANTITY)
    }

    /// Create a line with a product-specific minimum quantity.
    pub fn with_minimum(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        unit: impl Into<String>,
        minimum_quantity: u32,
    ) -> Result<Self, CommerceError> {
        let product_id = product_id.into();
        if unit_price.currency != Currency::USD || !unit_price.is_positive() {
            return Err(CommerceError::InvalidUnitPrice {
                product_id: product_id.to_string(),
                price: unit_price.display(),
            });
        }
        if minimum_quantity == 0 {
            return Err(CommerceError::ValidationError(format!(
                "minimum quantity for {product_id} must be positive"
            )));
        }
        check_quantity(&product_id, quantity, minimum_quantity)?;

        Ok(Self {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
            unit: unit.into(),
            minimum_quantity,
        })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit price in USD.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn minimum_quantity(&self) -> u32 {
        self.minimum_quantity
    }

    /// `unit_price × quantity`, in USD.
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price.times(self.quantity)
    }

    fn set_quantity(&mut self, quantity: u32) -> Result<(), CommerceError> {
        check_quantity(&self.product_id, quantity, self.minimum_quantity)?;
        self.quantity = quantity;
        Ok(())
    }
}

fn check_quantity(product_id: &ProductId, quantity: u32, minimum: u32) -> Result<(), CommerceError> {
    if quantity < minimum {
        return Err(CommerceError::BelowMinimumQuantity {
            product_id: product_id.to_string(),
            requested: quantity,
            minimum,
        });
    }
    if quantity > MAX_QUANTITY_PER_LINE {
        return Err(CommerceError::QuantityExceedsLimit(quantity, MAX_QUANTITY_PER_LINE));
    }
    Ok(())
}

/// A shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line. A line for a product already in the cart adds its
    /// quantity to the existing one.
    pub fn add_line(&mut self, line: CartLine) -> Result<(), CommerceError> {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            let quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(CommerceError::Overflow("cart quantity"))?;
            return existing.set_quantity(quantity);
        }
        self.lines.push(line);
        Ok(())
    }

    /// Set a line's quantity. Values below the line's minimum are rejected
    /// and leave the cart unchanged.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), CommerceError> {
        self.line_mut(product_id)?.set_quantity(quantity)
    }

    /// Add one unit.
    pub fn increment(&mut self, product_id: &ProductId) -> Result<u32, CommerceError> {
        let line = self.line_mut(product_id)?;
        let quantity = line
            .quantity
            .checked_add(1)
            .ok_or(CommerceError::Overflow("cart quantity"))?;
        line.set_quantity(quantity)?;
        Ok(quantity)
    }

    /// Remove one unit; rejected at the minimum.
    pub fn decrement(&mut self, product_id: &ProductId) -> Result<u32, CommerceError> {
        let line = self.line_mut(product_id)?;
        let quantity = line.quantity.saturating_sub(1);
        line.set_quantity(quantity)?;
        Ok(quantity)
    }

    /// Remove a line entirely.
    pub fn remove_line(&mut self, product_id: &ProductId) -> Result<CartLine, CommerceError> {
        let index = self
            .lines
            .iter()
            .position(|l| &l.product_id == product_id)
            .ok_or_else(|| CommerceError::ItemNotInCart(product_id.to_string()))?;
        Ok(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total weight; every unit weighs one.
    pub fn total_weight(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Σ unit price × quantity, in USD.
    pub fn subtotal_usd(&self) -> Result<Money, CommerceError> {
        self.lines.iter().try_fold(Money::zero(Currency::USD), |acc, line| {
            acc.checked_add(&line.line_total()?)
        })
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Result<&mut CartLine, CommerceError> {
        self.lines
            .iter_mut()
            .find(|l| &l.product_id == product_id)
            .ok_or_else(|| CommerceError::ItemNotInCart(product_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(id: &str, price: rust_decimal::Decimal, quantity: u32) -> CartLine {
        CartLine::new(id, id.to_uppercase(), Money::usd(price), quantity, "kg").unwrap()
    }

    #[test]
    fn test_rejects_quantity_below_minimum() {
        let result = CartLine::new("rice", "Rice", Money::usd(dec!(1)), 4, "kg");
        assert!(matches!(
            result,
            Err(CommerceError::BelowMinimumQuantity {
                requested: 4,
                minimum: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_non_usd_or_free_prices() {
        assert!(CartLine::new("rice", "Rice", Money::ves(dec!(10)), 5, "kg").is_err());
        assert!(CartLine::new("rice", "Rice", Money::usd(dec!(0)), 5, "kg").is_err());
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        cart.add_line(line("rice", dec!(1.20), 5)).unwrap();
        cart.add_line(line("rice", dec!(1.20), 7)).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity(), 12);
    }

    #[test]
    fn test_set_quantity_below_minimum_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add_line(line("beans", dec!(2), 6)).unwrap();
        let id = ProductId::new("beans");

        assert!(cart.set_quantity(&id, 3).is_err());
        assert_eq!(cart.lines()[0].quantity(), 6);

        assert_eq!(cart.decrement(&id).unwrap(), 5);
        assert!(cart.decrement(&id).is_err());
        assert_eq!(cart.lines()[0].quantity(), 5);
    }

    #[test]
    fn test_custom_minimum() {
        let mut cart = Cart::new();
        let oil = CartLine::with_minimum("oil", "Oil", Money::usd(dec!(3)), 12, "l", 12).unwrap();
        cart.add_line(oil).unwrap();
        assert!(cart.decrement(&ProductId::new("oil")).is_err());
    }

    #[test]
    fn test_unknown_product() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.increment(&ProductId::new("ghost")),
            Err(CommerceError::ItemNotInCart(_))
        ));
    }

    #[test]
    fn test_subtotal_is_exact_after_edits() {
        let mut cart = Cart::new();
        cart.add_line(line("rice", dec!(1.10), 5)).unwrap();
        cart.add_line(line("flour", dec!(0.35), 10)).unwrap();
        cart.add_line(line("sugar", dec!(0.99), 8)).unwrap();

        let rice = ProductId::new("rice");
        cart.increment(&rice).unwrap();
        cart.set_quantity(&ProductId::new("flour"), 21).unwrap();
        cart.remove_line(&ProductId::new("sugar")).unwrap();
        cart.add_line(line("sugar", dec!(0.99), 5)).unwrap();

        let expected: rust_decimal::Decimal = cart
            .lines()
            .iter()
            .map(|l| l.unit_price().amount * rust_decimal::Decimal::from(l.quantity()))
            .sum();
        assert_eq!(expected, dec!(6.60) + dec!(7.35) + dec!(4.95));
        assert_eq!(cart.subtotal_usd().unwrap().amount, expected);
        assert_eq!(cart.total_weight(), 6 + 21 + 5);
    }
}
