//! Fixed-point token quantities.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A token amount stored in hundredths of a token.
///
/// Balances, prices and transaction amounts all use this type so that
/// fractional feature costs (e.g. `0.5`) stay exact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Tokens(i64);

impl Tokens {
    /// Number of stored units per whole token.
    pub const SCALE: i64 = 100;

    pub const ZERO: Tokens = Tokens(0);

    /// Build from raw hundredths.
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Build from a whole number of tokens.
    pub const fn whole(tokens: i64) -> Self {
        Self(tokens * Self::SCALE)
    }

    /// Raw hundredths.
    pub const fn units(self) -> i64 {
        self.0
    }

    /// Whole tokens, rounding toward zero.
    pub const fn whole_part(self) -> i64 {
        self.0 / Self::SCALE
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `floor(whole tokens / 2)`, the refund for a partial result.
    pub const fn half_floor(self) -> Self {
        Self::whole(self.whole_part() / 2)
    }

    pub fn checked_sub(self, other: Tokens) -> Option<Tokens> {
        self.0.checked_sub(other.0).map(Tokens)
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else if frac % 10 == 0 {
            write!(f, "{}{}.{}", sign, whole, frac / 10)
        } else {
            write!(f, "{}{}.{:02}", sign, whole, frac)
        }
    }
}

/// Error returned when a token string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid token amount: {0:?}")]
pub struct ParseTokensError(pub String);

impl FromStr for Tokens {
    type Err = ParseTokensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTokensError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > 2 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(err());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };

        let units = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(err)?;

        Ok(Tokens(if negative { -units } else { units }))
    }
}

impl Add for Tokens {
    type Output = Tokens;

    fn add(self, rhs: Tokens) -> Tokens {
        Tokens(self.0 + rhs.0)
    }
}

impl AddAssign for Tokens {
    fn add_assign(&mut self, rhs: Tokens) {
        self.0 += rhs.0;
    }
}

impl Sub for Tokens {
    type Output = Tokens;

    fn sub(self, rhs: Tokens) -> Tokens {
        Tokens(self.0 - rhs.0)
    }
}

impl SubAssign for Tokens {
    fn sub_assign(&mut self, rhs: Tokens) {
        self.0 -= rhs.0;
    }
}

impl Neg for Tokens {
    type Output = Tokens;

    fn neg(self) -> Tokens {
        Tokens(-self.0)
    }
}

impl Sum for Tokens {
    fn sum<I: Iterator<Item = Tokens>>(iter: I) -> Tokens {
        iter.fold(Tokens::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("3".parse::<Tokens>().unwrap(), Tokens::whole(3));
        assert_eq!("0.5".parse::<Tokens>().unwrap(), Tokens::from_units(50));
        assert_eq!("2.25".parse::<Tokens>().unwrap(), Tokens::from_units(225));
        assert_eq!(" 7 ".parse::<Tokens>().unwrap(), Tokens::whole(7));
        assert_eq!("-1.5".parse::<Tokens>().unwrap(), Tokens::from_units(-150));
        assert!("".parse::<Tokens>().is_err());
        assert!("abc".parse::<Tokens>().is_err());
        assert!("1.234".parse::<Tokens>().is_err());
        assert!("1.2.3".parse::<Tokens>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Tokens::whole(10).to_string(), "10");
        assert_eq!(Tokens::from_units(50).to_string(), "0.5");
        assert_eq!(Tokens::from_units(225).to_string(), "2.25");
        assert_eq!(Tokens::from_units(-150).to_string(), "-1.5");
        assert_eq!(Tokens::from_units(5).to_string(), "0.05");
    }

    #[test]
    fn test_half_floor() {
        assert_eq!(Tokens::whole(5).half_floor(), Tokens::whole(2));
        assert_eq!(Tokens::whole(4).half_floor(), Tokens::whole(2));
        assert_eq!(Tokens::whole(1).half_floor(), Tokens::ZERO);
        assert_eq!(Tokens::from_units(250).half_floor(), Tokens::whole(1));
    }

    #[test]
    fn test_arithmetic() {
        let mut t = Tokens::whole(10);
        t -= Tokens::whole(3);
        t += Tokens::from_units(50);
        assert_eq!(t, Tokens::from_units(750));
        assert_eq!(Tokens::whole(1).checked_sub(Tokens::whole(2)), Some(Tokens::whole(-1)));
        let total: Tokens = vec![Tokens::whole(1), Tokens::whole(2)].into_iter().sum();
        assert_eq!(total, Tokens::whole(3));
    }
}
