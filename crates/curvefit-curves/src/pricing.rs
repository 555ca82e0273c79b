//! Instrument calculators.
//!
//! A calculator maps an instrument and a bundle of curves to a number, and
//! reports how that number moves with the zero yields it read:
//!
//! ```text
//! sensitivities = { curve name -> [(t, ∂value / ∂zero_rate(t))] }
//! ```
//!
//! The calibration Jacobian distributes these onto curve nodes.

use std::collections::BTreeMap;

use crate::bundle::CurveBundle;
use crate::error::CurveResult;
use crate::instruments::{Cash, FixedFloatSwap, Fra, FxForward, Instrument};

/// Sensitivities of a value to zero yields, per curve.
pub type CurveSensitivities = BTreeMap<String, Vec<(f64, f64)>>;

/// Valuation capability used by calibration.
pub trait InstrumentCalculator: Send + Sync {
    /// Calculator name for logs and reports.
    fn name(&self) -> &'static str;

    /// Value of `instrument` on `curves`.
    fn value(&self, instrument: &Instrument, curves: &CurveBundle) -> CurveResult<f64>;

    /// Sensitivities of [`value`](Self::value) to the zero yields read.
    fn sensitivities(
        &self,
        instrument: &Instrument,
        curves: &CurveBundle,
    ) -> CurveResult<CurveSensitivities>;

    /// Whether [`sensitivities`](Self::sensitivities) is analytic and usable for Jacobians.
    fn supports_sensitivities(&self) -> bool {
        true
    }

    /// Market target for `instrument` under this calculator.
    fn target(&self, instrument: &Instrument) -> f64;
}

fn push(sens: &mut CurveSensitivities, curve: &str, t: f64, value: f64) {
    sens.entry(curve.to_string()).or_default().push((t, value));
}

/// Discount factor and its derivative with respect to the zero rate at `t`.
fn df(curves: &CurveBundle, curve: &str, t: f64) -> CurveResult<(f64, f64)> {
    let d = curves.get(curve)?.discount_factor(t)?;
    Ok((d, -t * d))
}

/// Market quote calculator: par rates, and forward prices for FX forwards.
///
/// The calibration target is the quote carried by the instrument.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParRateCalculator;

/// Present value calculator; the calibration target is zero.
///
/// Values are per unit notional, in the discount (quote) currency. Swaps
/// are valued from the fixed payer's side.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentValueCalculator;

/// Floating leg `P = Σ R_j D(t_j)` with `R_j = F(t_{j-1}) / F(t_j) - 1`, plus sensitivities.
fn floating_leg(
    swap: &FixedFloatSwap,
    curves: &CurveBundle,
    sens: Option<&mut CurveSensitivities>,
    scale: f64,
) -> CurveResult<f64> {
    let mut sens = sens;
    let mut total = 0.0;
    let mut start = 0.0;
    for end in swap.floating_schedule() {
        let (d, dd) = df(curves, &swap.discount_curve, end)?;
        let (f_start, _) = df(curves, &swap.forward_curve, start)?;
        let (f_end, _) = df(curves, &swap.forward_curve, end)?;
        let ratio = f_start / f_end;
        let coupon = ratio - 1.0;
        total += coupon * d;

        if let Some(s) = sens.as_deref_mut() {
            push(s, &swap.discount_curve, end, scale * coupon * dd);
            push(s, &swap.forward_curve, start, scale * d * (-start) * ratio);
            push(s, &swap.forward_curve, end, scale * d * end * ratio);
        }
        start = end;
    }
    Ok(total)
}

/// Fixed leg annuity `A = Σ α_i D(s_i)`, plus sensitivities.
fn annuity(
    swap: &FixedFloatSwap,
    curves: &CurveBundle,
    sens: Option<&mut CurveSensitivities>,
    scale: f64,
) -> CurveResult<f64> {
    let mut sens = sens;
    let mut total = 0.0;
    let mut previous = 0.0;
    for t in swap.fixed_schedule() {
        let alpha = t - previous;
        let (d, dd) = df(curves, &swap.discount_curve, t)?;
        total += alpha * d;
        if let Some(s) = sens.as_deref_mut() {
            push(s, &swap.discount_curve, t, scale * alpha * dd);
        }
        previous = t;
    }
    Ok(total)
}

fn fra_forward(fra: &Fra, curves: &CurveBundle) -> CurveResult<(f64, f64)> {
    let (f_start, _) = df(curves, &fra.forward_curve, fra.start)?;
    let (f_end, _) = df(curves, &fra.forward_curve, fra.end)?;
    let ratio = f_start / f_end;
    Ok(((ratio - 1.0) / fra.accrual(), ratio))
}

fn fx_forward_price(fx: &FxForward, curves: &CurveBundle) -> CurveResult<(f64, f64, f64)> {
    let spot = curves.fx_rate(&fx.base_currency, &fx.quote_currency)?;
    let (d_base, _) = df(curves, &fx.base_curve, fx.maturity)?;
    let (d_quote, _) = df(curves, &fx.quote_curve, fx.maturity)?;
    Ok((spot * d_base / d_quote, d_base, d_quote))
}

impl InstrumentCalculator for ParRateCalculator {
    fn name(&self) -> &'static str {
        "ParRate"
    }

    fn value(&self, instrument: &Instrument, curves: &CurveBundle) -> CurveResult<f64> {
        match instrument {
            Instrument::Cash(Cash {
                curve, maturity, ..
            }) => {
                let (d, _) = df(curves, curve, *maturity)?;
                Ok((1.0 / d - 1.0) / maturity)
            }
            Instrument::Fra(fra) => Ok(fra_forward(fra, curves)?.0),
            Instrument::Swap(swap) => {
                let floating = floating_leg(swap, curves, None, 0.0)?;
                let fixed = annuity(swap, curves, None, 0.0)?;
                Ok(floating / fixed)
            }
            Instrument::FxForward(fx) => Ok(fx_forward_price(fx, curves)?.0),
        }
    }

    fn sensitivities(
        &self,
        instrument: &Instrument,
        curves: &CurveBundle,
    ) -> CurveResult<CurveSensitivities> {
        let mut sens = CurveSensitivities::new();
        match instrument {
            Instrument::Cash(Cash {
                curve, maturity, ..
            }) => {
                let (d, _) = df(curves, curve, *maturity)?;
                // ∂/∂y of (exp(yT) - 1) / T
                push(&mut sens, curve, *maturity, 1.0 / d);
            }
            Instrument::Fra(fra) => {
                let (_, ratio) = fra_forward(fra, curves)?;
                let tau = fra.accrual();
                push(&mut sens, &fra.forward_curve, fra.start, -fra.start * ratio / tau);
                push(&mut sens, &fra.forward_curve, fra.end, fra.end * ratio / tau);
            }
            Instrument::Swap(swap) => {
                // S = P / A, dS = (dP - S dA) / A
                let a = annuity(swap, curves, None, 0.0)?;
                let p = floating_leg(swap, curves, None, 0.0)?;
                let rate = p / a;
                floating_leg(swap, curves, Some(&mut sens), 1.0 / a)?;
                annuity(swap, curves, Some(&mut sens), -rate / a)?;
            }
            Instrument::FxForward(fx) => {
                let (forward, _, _) = fx_forward_price(fx, curves)?;
                push(&mut sens, &fx.base_curve, fx.maturity, -fx.maturity * forward);
                push(&mut sens, &fx.quote_curve, fx.maturity, fx.maturity * forward);
            }
        }
        Ok(sens)
    }

    fn target(&self, instrument: &Instrument) -> f64 {
        instrument.quote()
    }
}

impl InstrumentCalculator for PresentValueCalculator {
    fn name(&self) -> &'static str {
        "PresentValue"
    }

    fn value(&self, instrument: &Instrument, curves: &CurveBundle) -> CurveResult<f64> {
        match instrument {
            Instrument::Cash(Cash {
                curve,
                maturity,
                rate,
            }) => {
                let (d, _) = df(curves, curve, *maturity)?;
                Ok((1.0 + rate * maturity) * d - 1.0)
            }
            Instrument::Fra(fra) => {
                let (forward, _) = fra_forward(fra, curves)?;
                let (d, _) = df(curves, &fra.discount_curve, fra.end)?;
                Ok(fra.accrual() * (forward - fra.rate) * d)
            }
            Instrument::Swap(swap) => {
                let floating = floating_leg(swap, curves, None, 0.0)?;
                let fixed = annuity(swap, curves, None, 0.0)?;
                Ok(floating - swap.fixed_rate * fixed)
            }
            Instrument::FxForward(fx) => {
                let (_, d_base, d_quote) = fx_forward_price(fx, curves)?;
                let spot = curves.fx_rate(&fx.base_currency, &fx.quote_currency)?;
                Ok(spot * d_base - fx.strike * d_quote)
            }
        }
    }

    fn sensitivities(
        &self,
        instrument: &Instrument,
        curves: &CurveBundle,
    ) -> CurveResult<CurveSensitivities> {
        let mut sens = CurveSensitivities::new();
        match instrument {
            Instrument::Cash(Cash {
                curve,
                maturity,
                rate,
            }) => {
                let (_, dd) = df(curves, curve, *maturity)?;
                push(&mut sens, curve, *maturity, (1.0 + rate * maturity) * dd);
            }
            Instrument::Fra(fra) => {
                let (forward, ratio) = fra_forward(fra, curves)?;
                let (d, dd) = df(curves, &fra.discount_curve, fra.end)?;
                push(&mut sens, &fra.forward_curve, fra.start, -fra.start * ratio * d);
                push(&mut sens, &fra.forward_curve, fra.end, fra.end * ratio * d);
                push(
                    &mut sens,
                    &fra.discount_curve,
                    fra.end,
                    fra.accrual() * (forward - fra.rate) * dd,
                );
            }
            Instrument::Swap(swap) => {
                floating_leg(swap, curves, Some(&mut sens), 1.0)?;
                annuity(swap, curves, Some(&mut sens), -swap.fixed_rate)?;
            }
            Instrument::FxForward(fx) => {
                let (_, d_base, d_quote) = fx_forward_price(fx, curves)?;
                let spot = curves.fx_rate(&fx.base_currency, &fx.quote_currency)?;
                let t = fx.maturity;
                push(&mut sens, &fx.base_curve, t, -t * spot * d_base);
                push(&mut sens, &fx.quote_curve, t, t * fx.strike * d_quote);
            }
        }
        Ok(sens)
    }

    fn target(&self, _instrument: &Instrument) -> f64 {
        0.0
    }
}
