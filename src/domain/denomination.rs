use super::amount::Amount;
use crate::error::TableError;
use serde::{Deserialize, Serialize};

/// One accepted note: the pulse count the acceptor emits for it, and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denomination {
    pub pulses: u32,
    pub amount: Amount,
}

/// Forces every raw count in `min_pulses..=max_pulses` onto `pulses`.
///
/// Covers readers that are known to stretch a note's pulse train far enough
/// that nearest-match would resolve it to the next denomination up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub min_pulses: u32,
    pub max_pulses: u32,
    pub pulses: u32,
}

impl OverrideRule {
    fn covers(&self, raw_count: u32) -> bool {
        (self.min_pulses..=self.max_pulses).contains(&raw_count)
    }
}

/// Maps raw burst pulse counts onto known denominations.
///
/// Immutable once built. Entries are kept sorted by pulse count so the
/// nearest-match scan resolves ties toward the smaller denomination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenominationTable {
    entries: Vec<Denomination>,
    tolerance: u32,
    overrides: Vec<OverrideRule>,
}

impl DenominationTable {
    pub fn new(
        mut entries: Vec<Denomination>,
        tolerance: u32,
        overrides: Vec<OverrideRule>,
    ) -> Result<Self, TableError> {
        if entries.is_empty() {
            return Err(TableError::Empty);
        }
        entries.sort_by_key(|d| d.pulses);
        for pair in entries.windows(2) {
            if pair[0].pulses == pair[1].pulses {
                return Err(TableError::DuplicatePulses(pair[0].pulses));
            }
        }
        for d in &entries {
            if d.pulses == 0 {
                return Err(TableError::ZeroPulses);
            }
            if d.amount.is_zero() {
                return Err(TableError::ZeroAmount { pulses: d.pulses });
            }
        }
        for rule in &overrides {
            if rule.min_pulses > rule.max_pulses {
                return Err(TableError::EmptyBand {
                    min: rule.min_pulses,
                    max: rule.max_pulses,
                });
            }
            if rule.min_pulses <= 1 {
                return Err(TableError::BandCoversExactMatch {
                    min: rule.min_pulses,
                    max: rule.max_pulses,
                });
            }
            if !entries.iter().any(|d| d.pulses == rule.pulses) {
                return Err(TableError::UnknownOverrideTarget(rule.pulses));
            }
        }

        Ok(Self {
            entries,
            tolerance,
            overrides,
        })
    }

    pub fn tolerance(&self) -> u32 {
        self.tolerance
    }

    pub fn entries(&self) -> &[Denomination] {
        &self.entries
    }

    pub fn amount_for(&self, pulses: u32) -> Option<Amount> {
        self.entries
            .iter()
            .find(|d| d.pulses == pulses)
            .map(|d| d.amount)
    }

    /// Corrects a raw burst count to a denomination amount.
    ///
    /// A single pulse must match exactly. Everything else goes through the
    /// override bands first, then the nearest entry within `tolerance`.
    /// Returns `None` when the burst can't be credited.
    pub fn correct(&self, raw_count: u32) -> Option<Amount> {
        match raw_count {
            0 => None,
            1 => self.amount_for(1),
            _ => {
                if let Some(rule) = self.overrides.iter().find(|r| r.covers(raw_count)) {
                    return self.amount_for(rule.pulses);
                }
                self.nearest(raw_count)
                    .filter(|(_, distance)| *distance <= self.tolerance)
                    .map(|(d, _)| d.amount)
            }
        }
    }

    fn nearest(&self, raw_count: u32) -> Option<(&Denomination, u32)> {
        let mut best: Option<(&Denomination, u32)> = None;
        for d in self.entries.iter().filter(|d| d.pulses != 1) {
            let distance = d.pulses.abs_diff(raw_count);
            // Strict comparison keeps the first (smaller) entry on a tie.
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((d, distance));
            }
        }
        best
    }
}
