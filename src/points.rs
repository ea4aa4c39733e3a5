//! The rate table that converts waste categories into reward points.

use std::collections::HashMap;

use serde::Deserialize;

use crate::Error;

/// Maps waste categories to points earned per kilogram.
///
/// Category keys are matched case-insensitively. The table is an external
/// configuration input: [RateTable::default] provides the reference rates and
/// the server binary can load an override table from a JSON file, e.g.
/// `{"plastic": 11.0, "glass": 8.0}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            rates: HashMap::from([
                ("plastic".to_owned(), 11.0),
                ("electronic".to_owned(), 16.0),
                ("organic".to_owned(), 5.0),
                ("metal".to_owned(), 13.0),
                ("paper".to_owned(), 8.0),
                ("glass".to_owned(), 8.0),
            ]),
        }
    }
}

impl RateTable {
    /// The points earned per kilogram of `waste_type`.
    ///
    /// Unknown categories earn a rate of zero rather than an error.
    pub fn rate(&self, waste_type: &str) -> f64 {
        self.rates
            .get(&waste_type.to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }

    /// The points earned for `quantity` kilograms of `waste_type`.
    pub fn calculate_points(&self, waste_type: &str, quantity: f64) -> f64 {
        self.rate(waste_type) * quantity
    }
}

/// Convert a JSON value into a non-negative decimal.
///
/// Clients send quantities either as JSON numbers or as numeric strings, so
/// both forms are accepted here.
///
/// # Errors
/// Returns [Error::InvalidNumber] if `value` is not a number or a numeric
/// string, or [Error::NegativeQuantity] if the parsed number is negative.
pub fn parse_decimal(value: &serde_json::Value) -> Result<f64, Error> {
    let number = match value {
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| Error::InvalidNumber(value.to_string()))?,
        serde_json::Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidNumber(text.clone()))?,
        other => return Err(Error::InvalidNumber(other.to_string())),
    };

    if number < 0.0 {
        return Err(Error::NegativeQuantity(number));
    }

    Ok(number)
}
