use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{GeotagError, Result};

/// Unsigned EXIF RATIONAL: two 32-bit integers, always stored reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub const ZERO: Rational = Rational {
        numerator: 0,
        denominator: 1,
    };

    /// Parse a plain decimal literal ("48.343", "12", ".5") into an exact,
    /// reduced fraction. Signs and exponents are rejected.
    pub fn from_decimal_str(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let fail = |reason: &str| GeotagError::RationalEncoding {
            value: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let (int_part, frac_part) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(fail("empty literal"));
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(fail("not an unsigned decimal literal"));
        }

        // Trailing fractional zeros only inflate the denominator
        let frac_part = frac_part.trim_end_matches('0');

        let mut numerator: u64 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            numerator = numerator
                .checked_mul(10)
                .and_then(|n| n.checked_add(u64::from(digit - b'0')))
                .ok_or_else(|| fail("too many significant digits"))?;
        }
        let denominator = u32::try_from(frac_part.len())
            .ok()
            .and_then(|places| 10u64.checked_pow(places))
            .ok_or_else(|| fail("too many decimal places"))?;

        let divisor = gcd(numerator, denominator);
        let numerator = numerator / divisor;
        let denominator = denominator / divisor;

        Ok(Rational {
            numerator: u32::try_from(numerator).map_err(|_| fail("numerator exceeds 32 bits"))?,
            denominator: u32::try_from(denominator)
                .map_err(|_| fail("denominator exceeds 32 bits"))?,
        })
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Exact rational for the decimal text of `value`.
///
/// `f64`'s `Display` prints the shortest decimal that round-trips, so 48.343
/// becomes "48.343" and reduces to 48343/1000 rather than the binary
/// expansion 48.342999999999996...
pub fn to_rational(value: f64) -> Result<Rational> {
    if !value.is_finite() || value < 0.0 {
        return Err(GeotagError::RationalEncoding {
            value: value.to_string(),
            reason: "must be finite and non-negative".to_string(),
        });
    }
    if value == 0.0 {
        // Also covers -0.0, which would print a sign
        return Ok(Rational::ZERO);
    }
    Rational::from_decimal_str(&value.to_string())
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}
