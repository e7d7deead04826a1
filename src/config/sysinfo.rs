//! The immutable `SysInfo` snapshot and the SIBs it packs.

use bytes::Bytes;
use smallvec::SmallVec;

/// Maximum number of further SIBs one scheduling-info entry can carry
/// beyond entry 0 (which implicitly carries SIB2).
pub const MAX_SIBS_PER_SCHED_ENTRY: usize = 2;
/// Maximum number of scheduling-info entries SIB1 can enumerate.
pub const MAX_SCHED_INFO: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlBandwidth {
    Rb6,
    Rb15,
    Rb25,
    Rb50,
    Rb75,
    Rb100,
}

impl DlBandwidth {
    pub fn from_n_rb(n_rb: u32) -> Option<Self> {
        Some(match n_rb {
            6 => DlBandwidth::Rb6,
            15 => DlBandwidth::Rb15,
            25 => DlBandwidth::Rb25,
            50 => DlBandwidth::Rb50,
            75 => DlBandwidth::Rb75,
            100 => DlBandwidth::Rb100,
            _ => return None,
        })
    }

    pub fn n_rb(self) -> u32 {
        match self {
            DlBandwidth::Rb6 => 6,
            DlBandwidth::Rb15 => 15,
            DlBandwidth::Rb25 => 25,
            DlBandwidth::Rb50 => 50,
            DlBandwidth::Rb75 => 75,
            DlBandwidth::Rb100 => 100,
        }
    }
}

/// Master information block (broadcast on the BCH every radio frame).
#[derive(Debug, Clone, PartialEq)]
pub struct Mib {
    pub dl_bandwidth: DlBandwidth,
    pub phich_duration_extended: bool,
    pub phich_resource_half: bool,
    pub system_frame_number: u32,
}

/// One `SchedulingInfo` entry of SIB1: the SIBs broadcast in this entry's
/// periodic window, beyond the implicit SIB2 on entry 0.
#[derive(Debug, Clone, Default)]
pub struct SchedulingInfoEntry {
    pub sib_mapping: SmallVec<[u8; MAX_SIBS_PER_SCHED_ENTRY]>,
    /// si-Periodicity in radio frames (the original always uses 8).
    pub si_periodicity_rf: u32,
}

/// Presence + content placeholders for SIB3..SIB8. The core only needs to
/// know whether each is present (to place it in a scheduling-info entry);
/// RRC message contents are out of scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SibPresence {
    pub sib3: bool,
    pub sib4: bool,
    pub sib5: bool,
    pub sib6: bool,
    pub sib7: bool,
    pub sib8: bool,
}

impl SibPresence {
    /// SIB numbers (3..=8) present, in ascending order.
    pub fn present_sibs(&self) -> SmallVec<[u8; 6]> {
        let mut v = SmallVec::new();
        if self.sib3 {
            v.push(3);
        }
        if self.sib4 {
            v.push(4);
        }
        if self.sib5 {
            v.push(5);
        }
        if self.sib6 {
            v.push(6);
        }
        if self.sib7 {
            v.push(7);
        }
        if self.sib8 {
            v.push(8);
        }
        v
    }
}

/// The immutable, value-typed snapshot every layer swaps in on
/// `update_sys_info`. Never mutated in place; a fresh one replaces the old.
#[derive(Debug, Clone)]
pub struct SysInfo {
    pub mib: Mib,
    pub sibs_present: SibPresence,
    pub scheduling_info: SmallVec<[SchedulingInfoEntry; MAX_SCHED_INFO]>,

    /// Packed over-the-air bit image of SIB1, as the PHY packer would emit it.
    pub sib1_image: Bytes,
    /// Packed over-the-air bit image per scheduling-info entry (index 0 is
    /// the SIB2(+ optionally nothing else) message, etc).
    pub sched_info_images: SmallVec<[Bytes; MAX_SCHED_INFO]>,

    pub n_ant: u8,
    pub n_id_cell: u16,
    pub n_id_1: u16,
    pub n_id_2: u8,
    pub n_rb_dl: u32,
    pub n_rb_ul: u32,
    pub n_sc_rb_dl: u32,
    pub n_sc_rb_ul: u32,
    /// si-Periodicity of the SIB1-scheduled entries, in radio frames.
    pub si_periodicity_t: u32,
    /// SI window length, in subframes.
    pub si_win_len: u32,
    pub ra_response_window_size: u32,
}

impl SysInfo {
    /// A minimal, internally-consistent default snapshot (10MHz, cell id 0,
    /// no optional SIBs), used before the first `construct_sys_info()`.
    pub fn default_for_bandwidth(n_rb: u32) -> Self {
        SysInfo {
            mib: Mib {
                dl_bandwidth: DlBandwidth::from_n_rb(n_rb).expect("valid n_rb"),
                phich_duration_extended: false,
                phich_resource_half: false,
                system_frame_number: 0,
            },
            sibs_present: SibPresence::default(),
            scheduling_info: SmallVec::new(),
            sib1_image: Bytes::new(),
            sched_info_images: SmallVec::new(),
            n_ant: 1,
            n_id_cell: 0,
            n_id_1: 0,
            n_id_2: 0,
            n_rb_dl: n_rb,
            n_rb_ul: n_rb,
            n_sc_rb_dl: 12,
            n_sc_rb_ul: 12,
            si_periodicity_t: 8,
            si_win_len: 1,
            ra_response_window_size: 7,
        }
    }
}
