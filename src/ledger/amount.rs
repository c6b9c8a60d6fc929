use crate::constants::{AMOUNT_DECIMALS, AMOUNT_SCALE};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Token amount in base units, 10^8 base units per whole token
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmountError {
    #[error("amount {0} is negative")]
    Negative(Decimal),

    #[error("amount {0} has more than {1} decimal places")]
    TooPrecise(Decimal, u32),

    #[error("amount {0} does not fit in 64 bits of base units")]
    Overflow(Decimal),

    #[error("invalid amount: {0}")]
    Parse(#[from] rust_decimal::Error),
}

impl Amount {
    /// Scales a decimal token amount to base units.
    ///
    /// Rejects anything that cannot be represented exactly rather than
    /// rounding it.
    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }
        if value.normalize().scale() > AMOUNT_DECIMALS {
            return Err(AmountError::TooPrecise(value, AMOUNT_DECIMALS));
        }

        value
            .checked_mul(Decimal::from(AMOUNT_SCALE))
            .and_then(|base_units| base_units.to_u64())
            .map(Self)
            .ok_or(AmountError::Overflow(value))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::from_i128_with_scale(self.0 as i128, AMOUNT_DECIMALS)
    }

    pub fn base_units(self) -> u64 {
        self.0
    }
}

/////////////////
// conversions //
/////////////////

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal(Decimal::from_str(s.trim())?)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Amount> for u64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

/////////////
// display //
/////////////

impl Display for Amount {
    /// Whole tokens, trailing zeros stripped
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}
