//! PRACH configuration index lookup (36.211 table 5.7.1-2, FDD subset).
//!
//! The core only needs to decide, per `(sfn, subframe)`, whether this is a
//! PRACH opportunity; actual preamble detection is the excluded PHY DSP
//! library's job. Only the FDD preamble-format-0 rows the scheduler reads
//! are kept (the full table also covers TDD, which is a spec Non-goal).

#[derive(Debug, Clone, Copy)]
pub struct PrachConfig {
    /// PRACH opportunities occur only when `sfn % sfn_mod == 0`
    /// (`sfn_mod == 1` means every frame).
    pub sfn_mod: u32,
    /// Within a qualifying frame, opportunities occur on subframes where
    /// `subframe % subframe_period == subframe_check`.
    pub subframe_period: u32,
    pub subframe_check: u32,
    /// Whether a zero-correlation-zone PRACH (restricted set) is allowed.
    pub zero_allowed: bool,
}

/// Configuration indices 0..15, FDD preamble format 0.
pub const PRACH_CONFIG_TABLE: [PrachConfig; 16] = [
    PrachConfig { sfn_mod: 2, subframe_period: 10, subframe_check: 1, zero_allowed: false },
    PrachConfig { sfn_mod: 2, subframe_period: 10, subframe_check: 4, zero_allowed: false },
    PrachConfig { sfn_mod: 2, subframe_period: 10, subframe_check: 7, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 10, subframe_check: 1, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 10, subframe_check: 4, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 10, subframe_check: 7, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 5, subframe_check: 1, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 5, subframe_check: 2, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 5, subframe_check: 3, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 3, subframe_check: 1, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 2, subframe_check: 1, zero_allowed: false },
    PrachConfig { sfn_mod: 1, subframe_period: 1, subframe_check: 0, zero_allowed: false },
    PrachConfig { sfn_mod: 2, subframe_period: 10, subframe_check: 1, zero_allowed: true },
    PrachConfig { sfn_mod: 2, subframe_period: 10, subframe_check: 4, zero_allowed: true },
    PrachConfig { sfn_mod: 1, subframe_period: 10, subframe_check: 1, zero_allowed: true },
    PrachConfig { sfn_mod: 1, subframe_period: 5, subframe_check: 1, zero_allowed: true },
];

impl PrachConfig {
    pub fn is_opportunity(&self, sfn: u32, subframe: u32) -> bool {
        sfn % self.sfn_mod == 0 && subframe % self.subframe_period == self.subframe_check
    }
}

pub fn lookup(index: u8) -> Option<&'static PrachConfig> {
    PRACH_CONFIG_TABLE.get(index as usize)
}
