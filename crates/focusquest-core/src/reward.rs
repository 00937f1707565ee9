//! Reward engine -- XP and level arithmetic.
//!
//! Stateless pure functions converting completed work cycles and quest
//! completion into XP deltas and level numbers. The server-confirmed award
//! is authoritative; these values double as the local fallback when the
//! progress recorder is unreachable.

use serde::{Deserialize, Serialize};

/// XP awarded per completed work cycle.
pub const XP_PER_CYCLE: u64 = 200;

/// Bonus XP awarded once when every cycle of a quest completes.
pub const XP_QUEST_BONUS: u64 = 500;

/// Linear progression: 1000 XP per level.
pub const XP_PER_LEVEL: u64 = 1000;

/// Kind of progress-recording action a quest run can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// A single work interval finished.
    Cycle,
    /// All cycles of a quest finished.
    Quest,
}

/// Local fallback XP for an action, used when the recorder fails.
pub fn xp_for_action(kind: ActionKind) -> u64 {
    match kind {
        ActionKind::Cycle => XP_PER_CYCLE,
        ActionKind::Quest => XP_QUEST_BONUS,
    }
}

/// Level for a total XP amount. Level 1: 0-999, level 2: 1000-1999, etc.
pub fn level_for_xp(total_xp: u64) -> u32 {
    (total_xp / XP_PER_LEVEL) as u32 + 1
}

/// Total XP needed to reach the level after `current_level`.
pub fn xp_for_next_level(current_level: u32) -> u64 {
    u64::from(current_level) * XP_PER_LEVEL
}

/// Progress through the current level, 0.0 to 100.0.
pub fn level_progress(total_xp: u64) -> f64 {
    let xp_into_level = total_xp % XP_PER_LEVEL;
    (xp_into_level as f64 / XP_PER_LEVEL as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn action_fallbacks() {
        assert_eq!(xp_for_action(ActionKind::Cycle), 200);
        assert_eq!(xp_for_action(ActionKind::Quest), 500);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(999), 1);
        assert_eq!(level_for_xp(1000), 2);
        assert_eq!(level_for_xp(1999), 2);
        assert_eq!(level_for_xp(10_000), 11);
    }

    #[test]
    fn next_level_threshold() {
        assert_eq!(xp_for_next_level(1), 1000);
        assert_eq!(xp_for_next_level(5), 5000);
    }

    #[test]
    fn progress_within_level() {
        assert_eq!(level_progress(0), 0.0);
        assert_eq!(level_progress(500), 50.0);
        assert_eq!(level_progress(1000), 0.0);
        assert_eq!(level_progress(1250), 25.0);
    }

    proptest! {
        #[test]
        fn level_is_monotonic(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            if a <= b {
                prop_assert!(level_for_xp(a) <= level_for_xp(b));
            }
        }

        #[test]
        fn progress_stays_in_range(xp in 0u64..10_000_000) {
            let p = level_progress(xp);
            prop_assert!((0.0..=100.0).contains(&p));
        }
    }
}
