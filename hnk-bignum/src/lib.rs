//! Arbitrary-precision non-negative integer façade used to memoise combinatorial counts.
//!
//! Backed by [`num_bigint::BigUint`]. All arithmetic here is exact and
//! infallible; the only fallible surface is the raw byte encoding used by
//! the persistence layer.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use std::fmt;
use std::io::{self, Read, Write};
use std::ops::{Add, AddAssign, Mul};

/// A non-negative arbitrary-precision integer.
///
/// `Count` only ever holds values that have actually been computed; the
/// "not yet memoised" sentinel used by the original C implementation is
/// represented in this port as `Option<Count>`, not as a negative value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Count(BigUint);

impl Count {
    pub fn zero() -> Self {
        Count(BigUint::zero())
    }

    pub fn one() -> Self {
        Count(BigUint::from(1u32))
    }

    pub fn from_u64(n: u64) -> Self {
        Count(BigUint::from(n))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Approximate double-precision value, standing in for the original's
    /// conversion through an intermediate arbitrary-precision float.
    pub fn to_f64_approx(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::INFINITY)
    }

    /// Writes a native-endian `u32` byte length (0 for zero) followed by
    /// that many little-endian magnitude bytes.
    pub fn write_raw(&self, sink: &mut impl Write) -> io::Result<()> {
        if self.0.is_zero() {
            sink.write_all(&0u32.to_ne_bytes())?;
            return Ok(());
        }
        let bytes = self.0.to_bytes_le();
        let len = u32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "count too large to persist"))?;
        sink.write_all(&len.to_ne_bytes())?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    /// Inverse of [`Count::write_raw`].
    pub fn read_raw(source: &mut impl Read) -> io::Result<Self> {
        let mut len_bytes = [0u8; 4];
        source.read_exact(&mut len_bytes)?;
        let len = u32::from_ne_bytes(len_bytes) as usize;
        if len == 0 {
            return Ok(Count::zero());
        }
        let mut bytes = vec![0u8; len];
        source.read_exact(&mut bytes)?;
        Ok(Count(BigUint::from_bytes_le(&bytes)))
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Count {
    type Output = Count;
    fn add(self, rhs: Count) -> Count {
        Count(self.0 + rhs.0)
    }
}

impl Add for &Count {
    type Output = Count;
    fn add(self, rhs: &Count) -> Count {
        Count(&self.0 + &rhs.0)
    }
}

impl AddAssign for Count {
    fn add_assign(&mut self, rhs: Count) {
        self.0 += rhs.0;
    }
}

impl AddAssign<&Count> for Count {
    fn add_assign(&mut self, rhs: &Count) {
        self.0 += &rhs.0;
    }
}

impl Mul for &Count {
    type Output = Count;
    fn mul(self, rhs: &Count) -> Count {
        Count(&self.0 * &rhs.0)
    }
}

impl Mul for Count {
    type Output = Count;
    fn mul(self, rhs: Count) -> Count {
        Count(self.0 * rhs.0)
    }
}

impl From<u64> for Count {
    fn from(n: u64) -> Self {
        Count::from_u64(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_round_trips_through_raw_io() {
        let mut buf = Vec::new();
        Count::zero().write_raw(&mut buf).unwrap();
        let restored = Count::read_raw(&mut &buf[..]).unwrap();
        assert_eq!(restored, Count::zero());
    }

    #[test]
    fn large_value_round_trips_through_raw_io() {
        let value = Count::from_u64(u64::MAX) * Count::from_u64(u64::MAX);
        let mut buf = Vec::new();
        value.write_raw(&mut buf).unwrap();
        let restored = Count::read_raw(&mut &buf[..]).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn add_and_mul_are_exact() {
        let a = Count::from_u64(3);
        let b = Count::from_u64(4);
        assert_eq!(&a * &b, Count::from_u64(12));
        assert_eq!(a + b, Count::from_u64(7));
    }

    #[test]
    fn to_f64_approx_matches_small_values() {
        let c = Count::from_u64(1024);
        assert_eq!(c.to_f64_approx(), 1024.0);
    }
}
