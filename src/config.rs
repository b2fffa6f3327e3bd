/// How the closure computation treats a cycle of epsilon arcs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpsilonCycles {
    /// Sum only the paths inside the cycle that are no longer than the
    /// number of states on it. Every state reachable through the cycle is
    /// kept.
    Break,
    /// Fail with [`crate::RmEpsilonError::EpsilonCycle`].
    Reject,
}

impl Default for EpsilonCycles {
    fn default() -> Self {
        EpsilonCycles::Break
    }
}

/// Options for [`crate::remove_epsilons_with_config`].
///
/// # Example
///
/// ```
/// use rmeps::{EpsilonCycles, RmEpsilonConfig};
///
/// let config = RmEpsilonConfig {
///     cycles: EpsilonCycles::Reject,
///     ..RmEpsilonConfig::default()
/// };
/// assert!(config.connect && config.sort);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmEpsilonConfig {
    pub cycles: EpsilonCycles,
    /// Trim states that are not on a path from the start to a final state.
    pub connect: bool,
    /// Sort the transitions of every state by input label.
    pub sort: bool,
}

impl Default for RmEpsilonConfig {
    fn default() -> Self {
        RmEpsilonConfig {
            cycles: EpsilonCycles::default(),
            connect: true,
            sort: true,
        }
    }
}
