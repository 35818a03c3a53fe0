use crate::domain::cart::{Cart, CartLine};
use crate::domain::money::Money;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CartRow {
    service_id: String,
    name: String,
    unit_price: Decimal,
    quantity: u32,
}

/// Reads cart lines from a CSV source.
///
/// Expects a `service_id,name,unit_price,quantity` header. Whitespace is
/// trimmed and each row is validated as it is read.
pub struct CartReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CartReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes and validates each row.
    pub fn lines(self) -> impl Iterator<Item = Result<CartLine>> {
        self.reader.into_deserialize().map(|result| {
            let row: CartRow = result.map_err(EngineError::from)?;
            CartLine::new(row.service_id, row.name, Money::new(row.unit_price), row.quantity)
        })
    }

    /// Collects every row into a cart, merging repeated services.
    ///
    /// Fails on the first bad row; a half-read cart is never priced.
    pub fn into_cart(self) -> Result<Cart> {
        let mut cart = Cart::new();
        for line in self.lines() {
            cart.add_line(line?)?;
        }
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "service_id, name, unit_price, quantity\nfull-wash, Full wash, 55000, 1\nwax, Wax, 25000, 2";
        let cart = CartReader::new(data.as_bytes()).into_cart().unwrap();

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[1].service_id, "wax");
        assert_eq!(cart.subtotal(), Money::new(dec!(105000)));
    }

    #[test]
    fn test_reader_merges_repeated_service() {
        let data = "service_id,name,unit_price,quantity\nwax,Wax,10,1\nwax,Wax,10,2";
        let cart = CartReader::new(data.as_bytes()).into_cart().unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "service_id,name,unit_price,quantity\nwax,Wax,ten,1";
        let results: Vec<Result<CartLine>> = CartReader::new(data.as_bytes()).lines().collect();
        assert!(matches!(results[0], Err(EngineError::CsvError(_))));
    }

    #[test]
    fn test_reader_rejects_invalid_line() {
        let data = "service_id,name,unit_price,quantity\nwax,Wax,-5,1";
        assert!(matches!(
            CartReader::new(data.as_bytes()).into_cart(),
            Err(EngineError::ValidationError(_))
        ));
    }
}
