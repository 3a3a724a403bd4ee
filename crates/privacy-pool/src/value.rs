//! amounts carried by commitments and external io

use pool_primitives::field::{from_u128, to_u128};
use pool_primitives::FieldElement;

use crate::error::{PoolError, Result};

/// amount (u128, the protocol bound on a committed value)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(amount: u128) -> Self {
        Self(amount)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn to_field(self) -> FieldElement {
        from_u128(self.0)
    }

    /// field element back to an amount, `None` above u128
    pub fn from_field(value: &FieldElement) -> Option<Self> {
        to_u128(value).map(Self)
    }

    /// overflow-checked sum
    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(*a))
            .ok_or(PoolError::ValueOverflow)
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Self(v)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(v as u128)
    }
}

impl From<Amount> for u128 {
    fn from(v: Amount) -> Self {
        v.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// net deposit (input) or withdrawal (output) of a transaction
///
/// at most one side is non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ExternIo {
    pub input: Amount,
    pub output: Amount,
}

impl ExternIo {
    /// balance `existing` against `new`
    pub fn balance(existing: Amount, new: Amount) -> Self {
        if new >= existing {
            Self {
                input: Amount(new.0 - existing.0),
                output: Amount::ZERO,
            }
        } else {
            Self {
                input: Amount::ZERO,
                output: Amount(existing.0 - new.0),
            }
        }
    }

    /// check an explicit io against the sums it must balance
    pub fn validate(&self, existing: Amount, new: Amount) -> Result<()> {
        if !self.input.is_zero() && !self.output.is_zero() {
            return Err(PoolError::InvalidExternIo(
                "input and output are both non-zero".into(),
            ));
        }
        let lhs = new.checked_add(self.output).ok_or(PoolError::ValueOverflow)?;
        let rhs = existing.checked_add(self.input).ok_or(PoolError::ValueOverflow)?;
        if lhs != rhs {
            return Err(PoolError::InvalidExternIo(format!(
                "new {new} + output {} != existing {existing} + input {}",
                self.output, self.input
            )));
        }
        Ok(())
    }

    pub fn to_fields(self) -> [FieldElement; 2] {
        [self.input.to_field(), self.output.to_field()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_deposit() {
        let io = ExternIo::balance(Amount(0), Amount(100));
        assert_eq!(io.input, Amount(100));
        assert_eq!(io.output, Amount::ZERO);
    }

    #[test]
    fn test_balance_withdrawal() {
        let io = ExternIo::balance(Amount(300), Amount(120));
        assert_eq!(io.input, Amount::ZERO);
        assert_eq!(io.output, Amount(180));
    }

    #[test]
    fn test_validate_rejects_both_sides() {
        let io = ExternIo {
            input: Amount(1),
            output: Amount(1),
        };
        assert!(io.validate(Amount(5), Amount(5)).is_err());
    }

    #[test]
    fn test_validate_rejects_imbalance() {
        let io = ExternIo {
            input: Amount(10),
            output: Amount::ZERO,
        };
        assert!(io.validate(Amount(0), Amount(11)).is_err());
        assert!(io.validate(Amount(0), Amount(10)).is_ok());
    }

    #[test]
    fn test_sum_overflow() {
        let amounts = [Amount(u128::MAX), Amount(1)];
        assert!(matches!(Amount::sum(&amounts), Err(PoolError::ValueOverflow)));
    }

    #[test]
    fn test_field_round_trip() {
        let a = Amount(1_000_000_007);
        assert_eq!(Amount::from_field(&a.to_field()), Some(a));
    }
}
