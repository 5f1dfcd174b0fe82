//! Position sizing.
//!
//! Every method is capped at the fixed-fraction ceiling
//! `capital * max_position_fraction / price`. Division-by-zero inputs come back
//! as [`InvalidSizing`] instead of an infinite or NaN quantity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    FixedFraction,
    FixedRisk,
    RiskParity,
}

impl fmt::Display for SizingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingMethod::FixedFraction => write!(f, "fixed_fraction"),
            SizingMethod::FixedRisk => write!(f, "fixed_risk"),
            SizingMethod::RiskParity => write!(f, "risk_parity"),
        }
    }
}

impl FromStr for SizingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed_fraction" => Ok(SizingMethod::FixedFraction),
            "fixed_risk" => Ok(SizingMethod::FixedRisk),
            "risk_parity" => Ok(SizingMethod::RiskParity),
            other => Err(format!(
                "unknown sizing method '{other}' (expected fixed_fraction, fixed_risk or risk_parity)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Largest share of capital a single position may take, in (0, 1].
    pub max_position_fraction: f64,
    /// Share of capital put at risk per trade, in (0, 1].
    pub risk_per_trade: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters {
            max_position_fraction: 0.1,
            risk_per_trade: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum InvalidSizing {
    #[error("price {0} must be positive and finite")]
    InvalidPrice(f64),
    #[error("stop distance {0} must be positive")]
    NonPositiveStopDistance(f64),
    #[error("fixed-risk sizing needs a stop distance")]
    MissingStopDistance,
    #[error("volatility {0} must be positive")]
    NonPositiveVolatility(f64),
    #[error("risk-parity sizing needs a volatility estimate")]
    MissingVolatility,
    #[error("computed quantity {0} is negative or non-finite")]
    InvalidQuantity(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    pub method: SizingMethod,
    pub params: RiskParameters,
}

impl PositionSizer {
    pub fn new(method: SizingMethod, params: RiskParameters) -> Self {
        PositionSizer { method, params }
    }

    pub fn quantity(
        &self,
        price: f64,
        capital: f64,
        volatility: Option<f64>,
        stop_distance: Option<f64>,
    ) -> Result<f64, InvalidSizing> {
        let quantity = match self.method {
            SizingMethod::FixedFraction => fixed_fraction(price, capital, &self.params),
            SizingMethod::FixedRisk => fixed_risk(price, capital, &self.params, stop_distance),
            SizingMethod::RiskParity => risk_parity(price, capital, &self.params, volatility),
        }?;
        check_quantity(quantity)
    }
}

fn check_price(price: f64) -> Result<(), InvalidSizing> {
    if !price.is_finite() || price <= 0.0 {
        return Err(InvalidSizing::InvalidPrice(price));
    }
    Ok(())
}

fn check_quantity(quantity: f64) -> Result<f64, InvalidSizing> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(InvalidSizing::InvalidQuantity(quantity));
    }
    Ok(quantity)
}

/// quantity = capital * max_position_fraction / price
pub fn fixed_fraction(
    price: f64,
    capital: f64,
    params: &RiskParameters,
) -> Result<f64, InvalidSizing> {
    check_price(price)?;
    check_quantity(capital * params.max_position_fraction / price)
}

/// quantity = capital * risk_per_trade / stop_distance, capped at the fixed-fraction ceiling
pub fn fixed_risk(
    price: f64,
    capital: f64,
    params: &RiskParameters,
    stop_distance: Option<f64>,
) -> Result<f64, InvalidSizing> {
    let ceiling = fixed_fraction(price, capital, params)?;
    let distance = stop_distance.ok_or(InvalidSizing::MissingStopDistance)?;
    if distance.is_nan() || distance <= 0.0 {
        return Err(InvalidSizing::NonPositiveStopDistance(distance));
    }
    let quantity = capital * params.risk_per_trade / distance;
    Ok(check_quantity(quantity)?.min(ceiling))
}

/// quantity = capital * risk_per_trade / (price * volatility), capped at the fixed-fraction ceiling
pub fn risk_parity(
    price: f64,
    capital: f64,
    params: &RiskParameters,
    volatility: Option<f64>,
) -> Result<f64, InvalidSizing> {
    let ceiling = fixed_fraction(price, capital, params)?;
    let vol = volatility.ok_or(InvalidSizing::MissingVolatility)?;
    if vol.is_nan() || vol <= 0.0 {
        return Err(InvalidSizing::NonPositiveVolatility(vol));
    }
    let quantity = capital * params.risk_per_trade / (price * vol);
    Ok(check_quantity(quantity)?.min(ceiling))
}
