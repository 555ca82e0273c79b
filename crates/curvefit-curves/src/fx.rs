//! FX spot matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

/// Spot FX rates between a set of currencies.
///
/// Every currency is stored as its value in the base currency, so any pair
/// is available as a cross rate. Currencies are added relative to one that
/// is already present.
///
/// # Example
///
/// ```rust
/// use curvefit_curves::FxMatrix;
///
/// let mut fx = FxMatrix::new("USD");
/// fx.add_rate("EUR", "USD", 1.10).unwrap(); // 1 EUR = 1.10 USD
/// fx.add_rate("GBP", "EUR", 1.15).unwrap(); // 1 GBP = 1.15 EUR
///
/// let gbp_usd = fx.fx_rate("GBP", "USD").unwrap();
/// assert!((gbp_usd - 1.265).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxMatrix {
    base: String,
    values: BTreeMap<String, f64>,
}

impl FxMatrix {
    /// Creates a matrix containing only `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let mut values = BTreeMap::new();
        values.insert(base.clone(), 1.0);
        Self { base, values }
    }

    /// Base currency.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Adds `currency`, where one unit of it is worth `rate` units of `existing`.
    ///
    /// # Errors
    ///
    /// - [`CurveError::UnknownCurrency`] if `existing` is not in the matrix
    /// - [`CurveError::InvalidArgument`] if `currency` is already present or
    ///   `rate` is not a positive finite number
    pub fn add_rate(
        &mut self,
        currency: impl Into<String>,
        existing: &str,
        rate: f64,
    ) -> CurveResult<()> {
        let currency = currency.into();
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "FX rate {currency}/{existing} must be positive, got {rate}"
            )));
        }
        if self.values.contains_key(&currency) {
            return Err(CurveError::invalid_argument(format!(
                "currency {currency} is already in the FX matrix"
            )));
        }
        let anchor = self.value(existing)?;
        self.values.insert(currency, rate * anchor);
        Ok(())
    }

    /// Units of `to` paid for one unit of `from`.
    pub fn fx_rate(&self, from: &str, to: &str) -> CurveResult<f64> {
        Ok(self.value(from)? / self.value(to)?)
    }

    /// Returns true if the currency is present.
    #[must_use]
    pub fn contains(&self, currency: &str) -> bool {
        self.values.contains_key(currency)
    }

    /// Currencies in the matrix, sorted.
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Adds the currencies of `other` that are missing here.
    ///
    /// `other`'s base currency must already be present. Currencies present
    /// in both keep the rates of `self`.
    pub fn merged_with(&self, other: &FxMatrix) -> CurveResult<FxMatrix> {
        let mut merged = self.clone();
        for currency in other.currencies() {
            if !merged.contains(currency) {
                let rate = other.fx_rate(currency, other.base())?;
                merged.add_rate(currency, other.base(), rate)?;
            }
        }
        Ok(merged)
    }

    fn value(&self, currency: &str) -> CurveResult<f64> {
        self.values
            .get(currency)
            .copied()
            .ok_or_else(|| CurveError::unknown_currency(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix() -> FxMatrix {
        let mut fx = FxMatrix::new("USD");
        fx.add_rate("EUR", "USD", 1.10).unwrap();
        fx.add_rate("JPY", "USD", 1.0 / 150.0).unwrap();
        fx
    }

    #[test]
    fn test_cross_rates() {
        let fx = matrix();
        assert_relative_eq!(fx.fx_rate("EUR", "USD").unwrap(), 1.10);
        assert_relative_eq!(fx.fx_rate("USD", "EUR").unwrap(), 1.0 / 1.10);
        assert_relative_eq!(fx.fx_rate("EUR", "JPY").unwrap(), 165.0, epsilon = 1e-10);
        assert_relative_eq!(fx.fx_rate("JPY", "JPY").unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_currency() {
        let fx = matrix();
        assert!(matches!(
            fx.fx_rate("CHF", "USD"),
            Err(CurveError::UnknownCurrency { currency }) if currency == "CHF"
        ));

        let mut fx = matrix();
        assert!(matches!(
            fx.add_rate("CHF", "GBP", 1.2),
            Err(CurveError::UnknownCurrency { .. })
        ));
    }

    #[test]
    fn test_rejects_duplicates_and_bad_rates() {
        let mut fx = matrix();
        assert!(fx.add_rate("EUR", "USD", 1.2).unwrap_err().is_invalid_argument());
        assert!(fx.add_rate("CHF", "USD", -1.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_merge() {
        let mut other = FxMatrix::new("EUR");
        other.add_rate("GBP", "EUR", 1.15).unwrap();

        let merged = matrix().merged_with(&other).unwrap();
        assert_relative_eq!(merged.fx_rate("GBP", "USD").unwrap(), 1.15 * 1.10, epsilon = 1e-12);

        let detached = FxMatrix::new("CHF");
        assert!(matrix().merged_with(&detached).is_err());
    }
}
