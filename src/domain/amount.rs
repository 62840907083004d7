use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// A monetary value in minor currency units.
///
/// Wraps a `u64` so amounts can't be confused with pulse counts, and so the
/// only arithmetic available is the one the ledger needs: accumulation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// What is still owed against `self` as a target once `paid` has been inserted.
    pub fn remainder_after(self, paid: Amount) -> Remainder {
        Remainder(self.0 as i128 - paid.0 as i128)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target minus inserted. Negative means overpaid, positive means still due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Remainder(i128);

impl Remainder {
    pub fn value(&self) -> i128 {
        self.0
    }

    /// Exact or overpaid.
    pub fn is_settled(&self) -> bool {
        self.0 <= 0
    }

    pub fn due(&self) -> Amount {
        Amount(self.0.max(0) as u64)
    }

    pub fn overpaid(&self) -> Amount {
        Amount((-self.0).max(0) as u64)
    }
}

impl fmt::Display for Remainder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
