//! Calibration instruments.
//!
//! Times are year fractions from the curve origin. There are no calendars or
//! day counts: accrual factors are differences of payment times.

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

/// Times below this are treated as zero when building schedules.
const SCHEDULE_EPSILON: f64 = 1e-9;

/// Longest accepted instrument time, in years.
pub const MAX_MATURITY: f64 = 100.0;

/// Highest accepted payment frequency (daily).
pub const MAX_FREQUENCY: u32 = 365;

/// A calibration instrument.
///
/// Serialized with a `type` tag:
///
/// ```toml
/// type = "cash"
/// curve = "USD-OIS"
/// maturity = 0.5
/// rate = 0.031
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instrument {
    /// Money market deposit.
    Cash(Cash),
    /// Forward rate agreement.
    Fra(Fra),
    /// Fixed/floating interest rate swap.
    Swap(FixedFloatSwap),
    /// FX forward.
    FxForward(FxForward),
}

impl Instrument {
    /// The market quote carried by the instrument (rate, or strike for FX forwards).
    #[must_use]
    pub fn quote(&self) -> f64 {
        match self {
            Self::Cash(c) => c.rate,
            Self::Fra(f) => f.rate,
            Self::Swap(s) => s.fixed_rate,
            Self::FxForward(f) => f.strike,
        }
    }

    /// Copy of the instrument with a new market quote.
    #[must_use]
    pub fn with_quote(&self, quote: f64) -> Self {
        let mut instrument = self.clone();
        match &mut instrument {
            Self::Cash(c) => c.rate = quote,
            Self::Fra(f) => f.rate = quote,
            Self::Swap(s) => s.fixed_rate = quote,
            Self::FxForward(f) => f.strike = quote,
        }
        instrument
    }

    /// Last time at which the instrument depends on a curve.
    #[must_use]
    pub fn maturity(&self) -> f64 {
        match self {
            Self::Cash(c) => c.maturity,
            Self::Fra(f) => f.end,
            Self::Swap(s) => s.maturity,
            Self::FxForward(f) => f.maturity,
        }
    }

    /// The curve whose node at [`maturity`](Self::maturity) the instrument pins down.
    ///
    /// Projection curve for rate instruments, base currency curve for FX forwards.
    #[must_use]
    pub fn node_curve(&self) -> &str {
        match self {
            Self::Cash(c) => &c.curve,
            Self::Fra(f) => &f.forward_curve,
            Self::Swap(s) => &s.forward_curve,
            Self::FxForward(f) => &f.base_curve,
        }
    }

    /// Names of the curves the instrument is priced off.
    #[must_use]
    pub fn curve_names(&self) -> Vec<&str> {
        match self {
            Self::Cash(c) => vec![c.curve.as_str()],
            Self::Fra(f) => vec![f.discount_curve.as_str(), f.forward_curve.as_str()],
            Self::Swap(s) => vec![s.discount_curve.as_str(), s.forward_curve.as_str()],
            Self::FxForward(f) => vec![f.base_curve.as_str(), f.quote_curve.as_str()],
        }
    }

    /// Short label for reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Cash(c) => format!("Cash {}Y", c.maturity),
            Self::Fra(f) => format!("FRA {}x{}", f.start, f.end),
            Self::Swap(s) => format!("Swap {}Y", s.maturity),
            Self::FxForward(f) => {
                format!("FX {}/{} {}Y", f.base_currency, f.quote_currency, f.maturity)
            }
        }
    }

    /// Checks times, frequencies and quotes.
    pub fn validate(&self) -> CurveResult<()> {
        let positive = |what: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(CurveError::invalid_argument(format!(
                    "{}: {what} must be positive, got {v}",
                    self.label()
                )))
            }
        };
        if self.maturity() > MAX_MATURITY {
            return Err(CurveError::invalid_argument(format!(
                "{}: maturity {} is beyond {MAX_MATURITY} years",
                self.label(),
                self.maturity()
            )));
        }
        if !self.quote().is_finite() {
            return Err(CurveError::invalid_argument(format!(
                "{}: quote must be finite",
                self.label()
            )));
        }
        match self {
            Self::Cash(c) => positive("maturity", c.maturity),
            Self::Fra(f) => {
                if !(f.start.is_finite() && f.start >= 0.0 && f.end > f.start) {
                    return Err(CurveError::invalid_argument(format!(
                        "{}: need 0 <= start < end",
                        self.label()
                    )));
                }
                Ok(())
            }
            Self::Swap(s) => {
                positive("maturity", s.maturity)?;
                let frequencies = 1..=MAX_FREQUENCY;
                if !frequencies.contains(&s.fixed_frequency)
                    || !frequencies.contains(&s.floating_frequency)
                {
                    return Err(CurveError::invalid_argument(format!(
                        "{}: payment frequencies must be between 1 and {MAX_FREQUENCY}",
                        self.label()
                    )));
                }
                Ok(())
            }
            Self::FxForward(f) => {
                positive("maturity", f.maturity)?;
                positive("strike", f.strike)
            }
        }
    }
}

/// Money market deposit paying `1 + rate · maturity` at maturity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cash {
    /// Curve used to discount and project.
    pub curve: String,
    /// Maturity in years.
    pub maturity: f64,
    /// Simple deposit rate.
    pub rate: f64,
}

impl Cash {
    /// Creates a deposit.
    #[must_use]
    pub fn new(curve: impl Into<String>, maturity: f64, rate: f64) -> Self {
        Self {
            curve: curve.into(),
            maturity,
            rate,
        }
    }
}

/// Forward rate agreement on `[start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fra {
    /// Curve used to discount the settlement.
    pub discount_curve: String,
    /// Curve used to project the forward rate.
    pub forward_curve: String,
    /// Accrual start.
    pub start: f64,
    /// Accrual end.
    pub end: f64,
    /// Fixed rate.
    pub rate: f64,
}

impl Fra {
    /// Creates a FRA.
    #[must_use]
    pub fn new(
        discount_curve: impl Into<String>,
        forward_curve: impl Into<String>,
        start: f64,
        end: f64,
        rate: f64,
    ) -> Self {
        Self {
            discount_curve: discount_curve.into(),
            forward_curve: forward_curve.into(),
            start,
            end,
            rate,
        }
    }

    /// Accrual factor.
    #[must_use]
    pub fn accrual(&self) -> f64 {
        self.end - self.start
    }
}

/// Fixed/floating swap starting today.
///
/// Schedules are generated backwards from maturity, so a short stub, if
/// any, comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedFloatSwap {
    /// Curve used to discount both legs.
    pub discount_curve: String,
    /// Curve used to project floating coupons.
    pub forward_curve: String,
    /// Maturity in years.
    pub maturity: f64,
    /// Fixed payments per year.
    #[serde(default = "default_fixed_frequency")]
    pub fixed_frequency: u32,
    /// Floating payments per year.
    #[serde(default = "default_floating_frequency")]
    pub floating_frequency: u32,
    /// Fixed rate.
    pub fixed_rate: f64,
}

fn default_fixed_frequency() -> u32 {
    1
}

fn default_floating_frequency() -> u32 {
    2
}

impl FixedFloatSwap {
    /// Creates a swap with annual fixed and semi-annual floating payments.
    #[must_use]
    pub fn new(
        discount_curve: impl Into<String>,
        forward_curve: impl Into<String>,
        maturity: f64,
        fixed_rate: f64,
    ) -> Self {
        Self {
            discount_curve: discount_curve.into(),
            forward_curve: forward_curve.into(),
            maturity,
            fixed_frequency: default_fixed_frequency(),
            floating_frequency: default_floating_frequency(),
            fixed_rate,
        }
    }

    /// Sets the payment frequencies.
    #[must_use]
    pub fn with_frequencies(mut self, fixed: u32, floating: u32) -> Self {
        self.fixed_frequency = fixed;
        self.floating_frequency = floating;
        self
    }

    /// Fixed leg payment times.
    #[must_use]
    pub fn fixed_schedule(&self) -> Vec<f64> {
        schedule(self.maturity, self.fixed_frequency)
    }

    /// Floating leg payment times.
    #[must_use]
    pub fn floating_schedule(&self) -> Vec<f64> {
        schedule(self.maturity, self.floating_frequency)
    }
}

/// Payment times `..., T - 2/f, T - 1/f, T` down to (but excluding) zero.
fn schedule(maturity: f64, frequency: u32) -> Vec<f64> {
    if frequency == 0 || maturity <= 0.0 {
        return Vec::new();
    }
    let period = 1.0 / f64::from(frequency);
    let mut times = Vec::new();
    let mut k = 0u32;
    loop {
        let t = maturity - f64::from(k) * period;
        if t <= SCHEDULE_EPSILON {
            break;
        }
        times.push(t);
        k += 1;
    }
    times.reverse();
    times
}

/// FX forward: buy one unit of `base_currency` at `maturity` for `strike` units of `quote_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxForward {
    /// Discount curve of the base currency.
    pub base_curve: String,
    /// Discount curve of the quote currency.
    pub quote_curve: String,
    /// Base currency code.
    pub base_currency: String,
    /// Quote currency code.
    pub quote_currency: String,
    /// Delivery time.
    pub maturity: f64,
    /// Forward price in quote currency.
    pub strike: f64,
}

impl FxForward {
    /// Creates an FX forward.
    #[must_use]
    pub fn new(
        base_curve: impl Into<String>,
        quote_curve: impl Into<String>,
        base_currency: impl Into<String>,
        quote_currency: impl Into<String>,
        maturity: f64,
        strike: f64,
    ) -> Self {
        Self {
            base_curve: base_curve.into(),
            quote_curve: quote_curve.into(),
            base_currency: base_currency.into(),
            quote_currency: quote_currency.into(),
            maturity,
            strike,
        }
    }
}
