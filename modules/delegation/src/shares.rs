//! Share and power conversions

use tidemark_core::{Amount, TidemarkError, TidemarkResult, Validator};

/// Exchange-rate arithmetic between delegated power and pool shares
pub trait ShareMath: Send + Sync {
    /// Power redeemable per share of `validator`'s pool
    fn exchange_rate(&self, validator: &Validator) -> f32;

    /// Shares minted for `power` at `rate`
    fn shares_for_power(&self, power: i64, rate: f32) -> f32;

    /// Power owed for `shares` at `rate`
    fn returns_for_shares(&self, shares: f32, rate: f32) -> f32;
}

/// Single-precision share math
#[derive(Debug, Clone, Copy, Default)]
pub struct F32ShareMath;

impl ShareMath for F32ShareMath {
    fn exchange_rate(&self, validator: &Validator) -> f32 {
        if validator.total_delegator_shares == 0.0 {
            return 1.0;
        }
        (validator.delegated_power as f32 + validator.delegator_reward_pool as f32)
            / validator.total_delegator_shares
    }

    fn shares_for_power(&self, power: i64, rate: f32) -> f32 {
        power as f32 / rate
    }

    fn returns_for_shares(&self, shares: f32, rate: f32) -> f32 {
        rate * shares
    }
}

/// Convert a root-chain token amount to whole power units
pub fn power_from_amount(amount: Amount) -> TidemarkResult<i64> {
    let power = amount.0 / Amount::ONE_TOKEN;
    i64::try_from(power).map_err(|_| {
        TidemarkError::PowerConversion(format!("amount {} does not fit in power units", amount))
    })
}
