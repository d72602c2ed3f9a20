//! Spending guard
//!
//! The cap belongs to one call. It travels as an explicit argument and is
//! evaluated strictly before any signing request is made.

use crate::error::{Error, Result, format_usd};

/// Caller-supplied ceiling for one request. `None` means uncapped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuardContext {
    pub max_cost_usd: Option<f64>,
}

/// Why a payment flow was stopped before signing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuardAbort {
    SpendingCapExceeded { cost_usd: f64, max_cost_usd: f64 },
}

impl std::fmt::Display for GuardAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardAbort::SpendingCapExceeded { cost_usd, max_cost_usd } => write!(
                f,
                "cost {} exceeds cap {}",
                format_usd(*cost_usd),
                format_usd(*max_cost_usd)
            ),
        }
    }
}

impl From<GuardAbort> for Error {
    fn from(abort: GuardAbort) -> Self {
        match abort {
            GuardAbort::SpendingCapExceeded { cost_usd, max_cost_usd } => {
                Error::SpendingCapExceeded { cost_usd, max_cost_usd }
            }
        }
    }
}

impl GuardContext {
    pub fn unlimited() -> Self {
        Self { max_cost_usd: None }
    }

    pub fn max_cost_usd(max_cost_usd: f64) -> Self {
        Self {
            max_cost_usd: Some(max_cost_usd),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.max_cost_usd {
            Some(cap) if !cap.is_finite() || cap < 0.0 => {
                Err(Error::Config(format!("Spending cap must be a non-negative amount, got {}", cap)))
            }
            _ => Ok(()),
        }
    }

    /// Check `amount` base units of a `decimals`-decimal asset against the cap.
    pub fn check(&self, amount: u128, decimals: u32) -> std::result::Result<(), GuardAbort> {
        let Some(cap) = self.max_cost_usd else {
            return Ok(());
        };

        if amount > usd_to_units(cap, decimals) {
            return Err(GuardAbort::SpendingCapExceeded {
                cost_usd: amount as f64 / 10f64.powi(decimals as i32),
                max_cost_usd: cap,
            });
        }
        Ok(())
    }
}

/// Convert a USD amount to base units, truncating digits beyond `decimals`.
///
/// Works on the shortest decimal rendering of the float so a cap of `0.29`
/// is exactly 290000 units rather than 289999.99...
fn usd_to_units(usd: f64, decimals: u32) -> u128 {
    if !usd.is_finite() || usd <= 0.0 {
        return 0;
    }
    let rendered = format!("{}", usd);
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));

    let scale = 10u128.saturating_pow(decimals);
    let whole: u128 = whole.parse().unwrap_or(u128::MAX);

    let mut digits: String = fraction.chars().take(decimals as usize).collect();
    while digits.len() < decimals as usize {
        digits.push('0');
    }
    let fraction: u128 = if digits.is_empty() { 0 } else { digits.parse().unwrap_or(0) };

    whole.saturating_mul(scale).saturating_add(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_to_units() {
        assert_eq!(usd_to_units(0.0001, 6), 100);
        assert_eq!(usd_to_units(0.02, 6), 20_000);
        assert_eq!(usd_to_units(0.29, 6), 290_000);
        assert_eq!(usd_to_units(1.0, 6), 1_000_000);
        assert_eq!(usd_to_units(12.5, 6), 12_500_000);
        assert_eq!(usd_to_units(0.0000006, 6), 0);
        assert_eq!(usd_to_units(0.0, 6), 0);
    }

    #[test]
    fn test_cap_below_cost_aborts() {
        // $1.00 requested, $0.0001 allowed
        let abort = GuardContext::max_cost_usd(0.0001).check(1_000_000, 6).unwrap_err();
        let GuardAbort::SpendingCapExceeded { cost_usd, max_cost_usd } = abort;
        assert_eq!(format_usd(cost_usd), "$1.0000");
        assert_eq!(max_cost_usd, 0.0001);
    }

    #[test]
    fn test_cap_at_or_above_cost_allows() {
        assert!(GuardContext::max_cost_usd(0.02).check(10_000, 6).is_ok());
        assert!(GuardContext::max_cost_usd(0.01).check(10_000, 6).is_ok());
        assert!(GuardContext::max_cost_usd(0.29).check(290_000, 6).is_ok());
        assert!(GuardContext::max_cost_usd(0.009999).check(10_000, 6).is_err());
    }

    #[test]
    fn test_sub_unit_cap_never_allows_a_unit() {
        assert!(GuardContext::max_cost_usd(0.0000006).check(1, 6).is_err());
    }

    #[test]
    fn test_unlimited_allows_anything() {
        assert!(GuardContext::unlimited().check(u128::MAX, 6).is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(GuardContext::max_cost_usd(-1.0).validate().is_err());
        assert!(GuardContext::max_cost_usd(f64::NAN).validate().is_err());
        assert!(GuardContext::max_cost_usd(0.0).validate().is_ok());
        assert!(GuardContext::unlimited().validate().is_ok());
    }

    #[test]
    fn test_abort_converts_to_error() {
        let err: Error = GuardAbort::SpendingCapExceeded {
            cost_usd: 1.0,
            max_cost_usd: 0.5,
        }
        .into();
        assert!(matches!(err, Error::SpendingCapExceeded { .. }));
    }
}
