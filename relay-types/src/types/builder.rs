use ethereum_consensus::primitives::U256;

/// A builder's trust level. Only `OptimisticActive` permits the optimistic
/// branch; `Blacklisted` rejects all submissions; `OptimisticDemoted` and
/// `LowPrio` both use the pessimistic branch.
///
/// Kept as a plain enum rather than a bitset: the admin HTTP boundary is the
/// only place that translates boolean query flags into this type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuilderStatus {
    #[default]
    LowPrio,
    HighPrio,
    OptimisticActive,
    OptimisticDemoted,
    Blacklisted,
}

impl BuilderStatus {
    pub fn is_blacklisted(&self) -> bool {
        matches!(self, Self::Blacklisted)
    }

    pub fn is_optimistic_active(&self) -> bool {
        matches!(self, Self::OptimisticActive)
    }

    /// Admin-facing boolean shortcuts translate to/from this enum only at
    /// the admin API boundary.
    pub fn from_admin_flags(high_prio: bool, optimistic: bool, demoted: bool, blacklisted: bool) -> Self {
        if blacklisted {
            Self::Blacklisted
        } else if demoted {
            Self::OptimisticDemoted
        } else if optimistic {
            Self::OptimisticActive
        } else if high_prio {
            Self::HighPrio
        } else {
            Self::LowPrio
        }
    }
}

impl std::fmt::Display for BuilderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LowPrio => "low-prio",
            Self::HighPrio => "high-prio",
            Self::OptimisticActive => "optimistic-active",
            Self::OptimisticDemoted => "optimistic-demoted",
            Self::Blacklisted => "blacklisted",
        };
        write!(f, "{s}")
    }
}

/// Counters incremented by the core but not read by it.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuilderStats {
    pub submissions_total: u64,
    pub submissions_simulation_failed: u64,
    pub payloads_delivered: u64,
    pub demotions_total: u64,
}

/// Created on first submission (`status := LowPrio`, `collateral := 0`),
/// mutated by the admin interface and [`crate::types::DemotionRecord`]
/// production, never deleted.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Builder {
    pub public_key: ethereum_consensus::primitives::BlsPublicKey,
    pub status: BuilderStatus,
    pub collateral_value: U256,
    pub collateral_id: String,
    pub stats: BuilderStats,
}

impl Builder {
    pub fn new(public_key: ethereum_consensus::primitives::BlsPublicKey) -> Self {
        Self {
            public_key,
            status: BuilderStatus::LowPrio,
            collateral_value: U256::default(),
            collateral_id: String::new(),
            stats: BuilderStats::default(),
        }
    }

    pub fn has_collateral_group(&self) -> bool {
        !self.collateral_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_flags_precedence_is_blacklist_then_demoted_then_optimistic_then_high_prio() {
        assert_eq!(BuilderStatus::from_admin_flags(true, true, true, true), BuilderStatus::Blacklisted);
        assert_eq!(BuilderStatus::from_admin_flags(true, true, true, false), BuilderStatus::OptimisticDemoted);
        assert_eq!(BuilderStatus::from_admin_flags(true, true, false, false), BuilderStatus::OptimisticActive);
        assert_eq!(BuilderStatus::from_admin_flags(true, false, false, false), BuilderStatus::HighPrio);
        assert_eq!(BuilderStatus::from_admin_flags(false, false, false, false), BuilderStatus::LowPrio);
    }

    #[test]
    fn new_builder_starts_low_prio_with_no_collateral_group() {
        let builder = Builder::new(ethereum_consensus::primitives::BlsPublicKey::default());
        assert_eq!(builder.status, BuilderStatus::LowPrio);
        assert!(!builder.has_collateral_group());
    }
}
