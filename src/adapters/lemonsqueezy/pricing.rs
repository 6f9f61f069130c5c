//! Lemon Squeezy price schemes.
//!
//! A price is `standard`, `package`, `graduated` or `volume`. Tiered schemes
//! list tiers in ascending `last_unit` order, the last one usually open
//! ended (`"inf"`).

use serde::Deserialize;

use crate::domain::billing::BillingError;

/// Upper bound of a tier: a unit count or `"inf"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LastUnit {
    Units(u64),
    Unbounded(String),
}

impl LastUnit {
    /// `None` for the open-ended tier.
    pub fn limit(&self) -> Option<u64> {
        match self {
            LastUnit::Units(n) => Some(*n),
            // "inf", or a numeric string some API versions send
            LastUnit::Unbounded(raw) => raw.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceTier {
    pub last_unit: LastUnit,
    #[serde(default)]
    pub unit_price: i64,
    #[serde(default)]
    pub fixed_fee: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceScheme {
    Standard,
    Package,
    Graduated,
    Volume,
}

/// `prices` resource attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct LsPrice {
    pub scheme: PriceScheme,
    #[serde(default)]
    pub unit_price: Option<i64>,
    #[serde(default)]
    pub package_size: Option<u64>,
    #[serde(default)]
    pub tiers: Option<Vec<PriceTier>>,
    pub renewal_interval_unit: Option<String>,
}

impl LsPrice {
    /// Amount in minor units charged for `quantity`.
    pub fn amount_for(&self, quantity: u64) -> Result<i64, BillingError> {
        let tiers = self.tiers.as_deref().unwrap_or_default();
        match self.scheme {
            PriceScheme::Standard => Ok(self.unit_price.unwrap_or(0)),
            PriceScheme::Package => {
                let package_size = self.package_size.unwrap_or(1);
                Ok(self.unit_price.unwrap_or(0) * to_i64(package_size)? * to_i64(quantity)?)
            }
            PriceScheme::Graduated => graduated_amount(tiers, quantity),
            PriceScheme::Volume => volume_amount(tiers, quantity),
        }
    }
}

/// Each tier bills the units that fall inside it plus its fixed fee.
pub fn graduated_amount(tiers: &[PriceTier], quantity: u64) -> Result<i64, BillingError> {
    if tiers.is_empty() {
        return Err(BillingError::parsing("graduated price without tiers"));
    }
    let mut total = 0i64;
    let mut remaining = quantity;
    let mut previous_limit = 0u64;

    for tier in tiers {
        if remaining == 0 {
            break;
        }
        let units = match tier.last_unit.limit() {
            Some(limit) => {
                let span = limit.saturating_sub(previous_limit);
                previous_limit = limit;
                span.min(remaining)
            }
            None => remaining,
        };
        if units > 0 {
            total += to_i64(units)? * tier.unit_price + tier.fixed_fee;
            remaining -= units;
        }
    }
    Ok(total)
}

/// The whole quantity is billed at the first tier that covers it.
pub fn volume_amount(tiers: &[PriceTier], quantity: u64) -> Result<i64, BillingError> {
    let tier = tiers
        .iter()
        .find(|t| t.last_unit.limit().is_some_and(|limit| limit >= quantity))
        .or_else(|| tiers.iter().find(|t| t.last_unit.limit().is_none()))
        .ok_or_else(|| BillingError::parsing("no volume tier covers quantity"))?;
    Ok(to_i64(quantity)? * tier.unit_price + tier.fixed_fee)
}

fn to_i64(value: u64) -> Result<i64, BillingError> {
    i64::try_from(value).map_err(|_| BillingError::parsing("quantity out of range"))
}
