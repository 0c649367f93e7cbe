//! Memory pressure levels and the trim policy applied to them
//!
//! The embedding application reports how constrained the process is; the
//! pool looks the level up in its [`TrimPolicy`] and either does nothing,
//! shrinks to a fraction of its current maximum, or drops everything.

use serde::{Deserialize, Serialize};

/// Memory pressure level reported by the embedding application
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    /// Memory usage is low (< 50% utilization)
    Low,
    /// Memory usage is moderate (50-75% utilization)
    Moderate,
    /// Memory usage is high (75-90% utilization)
    High,
    /// Memory usage is critical (> 90% utilization)
    Critical,
}

impl MemoryPressure {
    /// Get the memory pressure level from a utilization ratio (0.0 to 1.0)
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.5 {
            MemoryPressure::Low
        } else if utilization < 0.75 {
            MemoryPressure::Moderate
        } else if utilization < 0.90 {
            MemoryPressure::High
        } else {
            MemoryPressure::Critical
        }
    }
}

/// What the pool does in response to a pressure level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimAction {
    /// Leave the pool alone
    None,
    /// Evict until the pool holds at most this fraction of its maximum size
    TrimToFraction(f64),
    /// Evict everything
    Clear,
}

impl TrimAction {
    /// Byte target this action trims to for a pool of `max_size`
    ///
    /// `None` means no trimming at all.
    pub fn target_size(&self, max_size: usize) -> Option<usize> {
        match *self {
            TrimAction::None => None,
            TrimAction::TrimToFraction(fraction) => {
                Some((max_size as f64 * fraction.clamp(0.0, 1.0)) as usize)
            }
            TrimAction::Clear => Some(0),
        }
    }
}

/// Mapping from pressure level to trim action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimPolicy {
    pub low: TrimAction,
    pub moderate: TrimAction,
    pub high: TrimAction,
    pub critical: TrimAction,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self {
            low: TrimAction::None,
            moderate: TrimAction::TrimToFraction(0.5),
            high: TrimAction::TrimToFraction(0.5),
            critical: TrimAction::Clear,
        }
    }
}

impl TrimPolicy {
    /// Action configured for `level`
    pub fn action_for(&self, level: MemoryPressure) -> TrimAction {
        match level {
            MemoryPressure::Low => self.low,
            MemoryPressure::Moderate => self.moderate,
            MemoryPressure::High => self.high,
            MemoryPressure::Critical => self.critical,
        }
    }

    /// Replace the action for a single level
    pub fn with_action(mut self, level: MemoryPressure, action: TrimAction) -> Self {
        match level {
            MemoryPressure::Low => self.low = action,
            MemoryPressure::Moderate => self.moderate = action,
            MemoryPressure::High => self.high = action,
            MemoryPressure::Critical => self.critical = action,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pressure_levels() {
        assert_eq!(
            MemoryPressure::from_utilization(0.3),
            MemoryPressure::Low
        );
        assert_eq!(
            MemoryPressure::from_utilization(0.6),
            MemoryPressure::Moderate
        );
        assert_eq!(
            MemoryPressure::from_utilization(0.8),
            MemoryPressure::High
        );
        assert_eq!(
            MemoryPressure::from_utilization(0.95),
            MemoryPressure::Critical
        );
    }

    #[test]
    fn test_pressure_ordering() {
        assert!(MemoryPressure::Low < MemoryPressure::Moderate);
        assert!(MemoryPressure::High < MemoryPressure::Critical);
    }

    #[test]
    fn test_default_policy() {
        let policy = TrimPolicy::default();
        assert_eq!(policy.action_for(MemoryPressure::Low), TrimAction::None);
        assert_eq!(
            policy.action_for(MemoryPressure::Moderate),
            TrimAction::TrimToFraction(0.5)
        );
        assert_eq!(
            policy.action_for(MemoryPressure::High),
            TrimAction::TrimToFraction(0.5)
        );
        assert_eq!(policy.action_for(MemoryPressure::Critical), TrimAction::Clear);
    }

    #[test]
    fn test_action_targets() {
        assert_eq!(TrimAction::None.target_size(1000), None);
        assert_eq!(TrimAction::TrimToFraction(0.5).target_size(1000), Some(500));
        assert_eq!(TrimAction::TrimToFraction(3.0).target_size(1000), Some(1000));
        assert_eq!(TrimAction::Clear.target_size(1000), Some(0));
    }

    #[test]
    fn test_with_action_overrides_single_level() {
        let policy = TrimPolicy::default().with_action(MemoryPressure::High, TrimAction::Clear);

        assert_eq!(policy.action_for(MemoryPressure::High), TrimAction::Clear);
        assert_eq!(
            policy.action_for(MemoryPressure::Moderate),
            TrimAction::TrimToFraction(0.5)
        );
    }
}
