use super::money::Money;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// One selected service in the cart.
///
/// `line_subtotal` is not stored; it is always derived from price and quantity
/// so the two can never drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub service_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(
        service_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Self> {
        let line = Self {
            service_id: service_id.into(),
            name: name.into(),
            unit_price,
            quantity,
        };
        line.validate()?;
        Ok(line)
    }

    pub fn line_subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }

    /// Checks the line before it is allowed into a cart or into pricing.
    pub fn validate(&self) -> Result<()> {
        if self.service_id.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "Service id is required".to_string(),
            ));
        }
        if self.quantity == 0 {
            return Err(EngineError::ValidationError(format!(
                "Quantity for {} must be at least 1",
                self.service_id
            )));
        }
        if self.unit_price < Money::ZERO {
            return Err(EngineError::ValidationError(format!(
                "Unit price for {} must not be negative",
                self.service_id
            )));
        }
        Ok(())
    }
}

/// Ordered collection of cart lines, at most one line per service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_subtotal).sum()
    }

    /// Adds a line, merging quantities when the service is already present.
    pub fn add_line(&mut self, line: CartLine) -> Result<()> {
        line.validate()?;
        match self
            .lines
            .iter_mut()
            .find(|existing| existing.service_id == line.service_id)
        {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| {
                        EngineError::ValidationError("Quantity overflow".to_string())
                    })?;
            }
            None => self.lines.push(line),
        }
        Ok(())
    }

    pub fn update_quantity(&mut self, service_id: &str, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(EngineError::ValidationError(format!(
                "Quantity for {} must be at least 1",
                service_id
            )));
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.service_id == service_id)
            .ok_or_else(|| EngineError::NotFoundError(format!("cart line {}", service_id)))?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_line(&mut self, service_id: &str) -> Result<CartLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.service_id == service_id)
            .ok_or_else(|| EngineError::NotFoundError(format!("cart line {}", service_id)))?;
        Ok(self.lines.remove(idx))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl TryFrom<Vec<CartLine>> for Cart {
    type Error = EngineError;

    fn try_from(lines: Vec<CartLine>) -> Result<Self> {
        let mut cart = Cart::new();
        for line in lines {
            cart.add_line(line)?;
        }
        Ok(cart)
    }
}
