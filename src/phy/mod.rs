//! PHY: per-subframe DL assembly and UL PRACH-opportunity detection.
//!
//! The actual OFDM modulation/demodulation, turbo coding, and PRACH
//! correlation (`liblte_phy_*` in the original) are excluded PHY DSP work;
//! [`PhyCodec`] is the seam a collaborator library fills in, with
//! [`NullCodec`] standing in for development and the composition-root
//! binary — deterministic placeholder TX buffers, no PRACH detections,
//! enough to drive MAC end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::sysinfo::SysInfo;
use crate::mac::{DlScheduleMsg, UlScheduleMsg};
use crate::msgbus::{PrachDecode, ReadyToSend};
use crate::pdu::{prach, sib};
use crate::radio::Cplx;
use crate::tti::{self, Tti};

/// What [`PhyCodec::encode_dl`] needs to turn a subframe's payload bytes
/// into per-antenna baseband samples.
pub struct DlEncodeRequest<'a> {
    pub current_tti: Tti,
    pub n_samps_per_subfr: u32,
    pub n_ant: u8,
    pub n_id_cell: u16,
    pub n_id_1: u16,
    pub n_id_2: u8,
    /// Packed transport blocks to place this subframe: MIB/SIB/SI images
    /// and MAC PDUs, in no particular PRB order (PRB placement is DSP work).
    pub payloads: &'a [Vec<u8>],
}

/// Preambles and timing advances a PRACH correlator detected in one
/// subframe's RX samples.
#[derive(Debug, Clone, Default)]
pub struct UlDetection {
    pub preambles: Vec<u32>,
    pub timing_adv: Vec<u32>,
}

/// The excluded PHY DSP boundary: OFDM subframe synthesis/analysis.
pub trait PhyCodec: Send + Sync {
    fn encode_dl(&self, req: &DlEncodeRequest<'_>) -> Vec<Vec<Cplx>>;
    fn decode_ul(&self, samples: &[Cplx]) -> UlDetection;
    /// Number of control-channel elements available for PDCCH, a function
    /// of bandwidth/antenna count/PHICH config in the real DSP; the core
    /// only needs a number to budget DCIs against.
    fn n_cce(&self, n_rb_dl: u32, n_ant: u8) -> u32;
}

/// No-DSP codec: emits silence sized to the subframe and never detects a
/// preamble. Enough to exercise the MAC scheduler's timing without a real
/// PHY library linked in.
pub struct NullCodec;

impl PhyCodec for NullCodec {
    fn encode_dl(&self, req: &DlEncodeRequest<'_>) -> Vec<Vec<Cplx>> {
        vec![vec![Cplx::default(); req.n_samps_per_subfr as usize]; req.n_ant.max(1) as usize]
    }

    fn decode_ul(&self, _samples: &[Cplx]) -> UlDetection {
        UlDetection::default()
    }

    fn n_cce(&self, n_rb_dl: u32, _n_ant: u8) -> u32 {
        (n_rb_dl / 2).max(1)
    }
}

/// Per-subframe MAC→PHY state machine: holds the sys-info snapshot, the
/// DL/UL TTI cursors, and the most recently received schedule from MAC.
pub struct Phy {
    codec: Arc<dyn PhyCodec>,
    sys_info: RwLock<Arc<SysInfo>>,
    started: AtomicBool,
    dl_current_tti: Mutex<Tti>,
    ul_current_tti: Mutex<Tti>,
    last_rts_tti: Mutex<Option<Tti>>,
    late_subfr: AtomicBool,
    pending_dl: Mutex<Option<DlScheduleMsg>>,
    pending_ul: Mutex<Option<UlScheduleMsg>>,
    last_ul_schedule_applied: Mutex<Option<Tti>>,
    prach_config_index: AtomicU8,
}

impl Phy {
    pub fn new(codec: Arc<dyn PhyCodec>, sys_info: Arc<SysInfo>) -> Self {
        Phy {
            codec,
            sys_info: RwLock::new(sys_info),
            started: AtomicBool::new(false),
            dl_current_tti: Mutex::new(0),
            ul_current_tti: Mutex::new(0),
            last_rts_tti: Mutex::new(None),
            late_subfr: AtomicBool::new(false),
            pending_dl: Mutex::new(None),
            pending_ul: Mutex::new(None),
            last_ul_schedule_applied: Mutex::new(None),
            prach_config_index: AtomicU8::new(0),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.started.store(false, Ordering::Release);
    }

    pub fn update_sys_info(&self, sys_info: Arc<SysInfo>) {
        *self.sys_info.write() = sys_info;
    }

    pub fn set_prach_config_index(&self, idx: u8) {
        self.prach_config_index.store(idx, Ordering::Relaxed);
    }

    pub fn n_cce(&self) -> u32 {
        let sys_info = self.sys_info.read();
        self.codec.n_cce(sys_info.n_rb_dl, sys_info.n_ant)
    }

    /// Stores a DL schedule from MAC for the next matching `process_dl`
    /// call. A schedule for a TTI already passed PHY — and not the one PHY
    /// most recently requested via `ReadyToSend` — is late: PHY suppresses
    /// its next `ReadyToSend` rather than let MAC's cursor fall further
    /// behind (verbatim from `LTE_fdd_enb_phy.cc::handle_pdsch_schedule`).
    pub fn handle_dl_schedule(&self, msg: DlScheduleMsg) {
        let current = *self.dl_current_tti.lock();
        let last_rts = *self.last_rts_tti.lock();
        if msg.current_tti != current && tti::precedes(msg.current_tti, current) {
            let is_the_requested_one = Some(msg.current_tti) == last_rts;
            self.late_subfr.store(!is_the_requested_one, Ordering::Relaxed);
        } else {
            self.late_subfr.store(false, Ordering::Relaxed);
            *self.pending_dl.lock() = Some(msg);
        }
    }

    /// Stores a UL schedule from MAC for the matching `process_ul` call,
    /// which logs and records the grants/decode instructions it carries
    /// (the actual PUSCH demodulation against those instructions is the
    /// excluded PHY DSP collaborator's job).
    pub fn handle_ul_schedule(&self, msg: UlScheduleMsg) {
        *self.pending_ul.lock() = Some(msg);
    }

    /// TTI at which PHY last folded in a UL schedule from MAC, if any.
    pub fn last_ul_schedule_applied(&self) -> Option<Tti> {
        *self.last_ul_schedule_applied.lock()
    }

    /// Assembles one DL subframe: MIB at subframe 0, SIB1 at subframe 5 of
    /// even frames, scheduling-info images on their `si_win_len`/`si_periodicity_T`
    /// windows (same placement rule MAC uses to reserve PRBs for them), plus
    /// whatever MAC scheduled for this TTI. Returns the encoded samples and,
    /// unless the last schedule arrived late, the `ReadyToSend` PHY owes MAC
    /// two subframes ahead.
    pub fn process_dl(&self) -> (Tti, Vec<Vec<Cplx>>, Option<ReadyToSend>) {
        let sys_info = self.sys_info.read().clone();
        let mut dl_tti = self.dl_current_tti.lock();
        let current = *dl_tti;
        let sfn = tti::sfn(current);
        let subframe = tti::subframe(current);

        let mut payloads: Vec<Vec<u8>> = Vec::new();
        if subframe == 0 {
            let mib = crate::config::sysinfo::Mib { system_frame_number: sfn, ..sys_info.mib.clone() };
            payloads.push(sib::pack_mib(&mib));
        }
        if subframe == 5 && sfn % 2 == 0 {
            payloads.push(sys_info.sib1_image.to_vec());
        }
        for (i, image) in sys_info.sched_info_images.iter().enumerate() {
            let i = i as u32;
            if !image.is_empty()
                && (i * sys_info.si_win_len) % 10 == subframe
                && (i * sys_info.si_win_len) / 10 == sfn % sys_info.si_periodicity_t
            {
                payloads.push(image.to_vec());
            }
        }

        if let Some(pending) = self.pending_dl.lock().take_if(|p| p.current_tti == current) {
            payloads.extend(pending.payloads);
        }

        let req = DlEncodeRequest {
            current_tti: current,
            n_samps_per_subfr: crate::radio::sample_rate_for_n_rb(sys_info.n_rb_dl).1,
            n_ant: sys_info.n_ant,
            n_id_cell: sys_info.n_id_cell,
            n_id_1: sys_info.n_id_1,
            n_id_2: sys_info.n_id_2,
            payloads: &payloads,
        };
        let samples = self.codec.encode_dl(&req);

        *dl_tti = tti::add(current, 1);
        let next_dl = *dl_tti;
        let ul_tti = *self.ul_current_tti.lock();
        drop(dl_tti);

        let rts = if self.late_subfr.load(Ordering::Relaxed) {
            None
        } else {
            let rts = ReadyToSend { dl_current_tti: tti::add(next_dl, 2), ul_current_tti: tti::add(ul_tti, 2) };
            *self.last_rts_tti.lock() = Some(rts.dl_current_tti);
            Some(rts)
        };

        (current, samples, rts)
    }

    /// Resyncs the UL cursor to `rx_tti` (jumping both DL and UL cursors by
    /// the same skipped amount, matching the original's "jump the DL and UL
    /// fn_combos" behavior), then checks whether this subframe is a PRACH
    /// opportunity for the configured PRACH configuration index.
    pub fn process_ul(&self, rx_tti: Tti, samples: &[Cplx]) -> Option<PrachDecode> {
        let mut ul_tti = self.ul_current_tti.lock();
        if rx_tti != *ul_tti {
            let n_skipped = (rx_tti + tti::FN_COMBO_MODULUS - *ul_tti) % tti::FN_COMBO_MODULUS;
            let mut dl_tti = self.dl_current_tti.lock();
            *dl_tti = tti::add(*dl_tti, n_skipped);
            *ul_tti = rx_tti;
        }
        let current = *ul_tti;
        let sfn = tti::sfn(current);
        let subframe = tti::subframe(current);
        *ul_tti = tti::add(current, 1);
        drop(ul_tti);

        if let Some(pending) = self.pending_ul.lock().take_if(|p| p.current_tti == current) {
            log::debug!(
                "ul schedule at tti {current}: {} grant(s), {} decode instruction(s)",
                pending.grants.len(),
                pending.decodes.len()
            );
            *self.last_ul_schedule_applied.lock() = Some(current);
        }

        let idx = self.prach_config_index.load(Ordering::Relaxed);
        let Some(cfg) = prach::lookup(idx) else { return None };
        if !cfg.is_opportunity(sfn, subframe) || (subframe == 0 && !cfg.zero_allowed) {
            return None;
        }

        let detection = self.codec.decode_ul(samples);
        if detection.preambles.is_empty() {
            return None;
        }
        Some(PrachDecode { current_tti: current, preambles: detection.preambles, timing_adv: detection.timing_adv })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sysinfo::SysInfo;

    fn phy_at(n_rb: u32) -> Phy {
        Phy::new(Arc::new(NullCodec), Arc::new(SysInfo::default_for_bandwidth(n_rb)))
    }

    #[test]
    fn process_dl_places_mib_at_subframe_zero() {
        let phy = phy_at(50);
        let (tti, samples, rts) = phy.process_dl();
        assert_eq!(tti, 0);
        assert_eq!(samples.len(), 1); // n_ant default 1
        assert!(rts.is_some());
    }

    #[test]
    fn process_dl_advances_tti_each_call() {
        let phy = phy_at(50);
        let (first, _, _) = phy.process_dl();
        let (second, _, _) = phy.process_dl();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[test]
    fn null_codec_never_detects_prach() {
        let phy = phy_at(50);
        phy.set_prach_config_index(11); // every subframe is an opportunity
        let samples = vec![Cplx::default(); 100];
        assert!(phy.process_ul(1, &samples).is_none());
    }

    #[test]
    fn handle_ul_schedule_is_applied_at_its_matching_tti() {
        let phy = phy_at(50);
        assert!(phy.last_ul_schedule_applied().is_none());
        phy.handle_ul_schedule(UlScheduleMsg { current_tti: 0, ..Default::default() });
        phy.process_ul(0, &[]);
        assert_eq!(phy.last_ul_schedule_applied(), Some(0));
    }

    #[test]
    fn late_dl_schedule_suppresses_ready_to_send() {
        let phy = phy_at(50);
        let (_, _, rts) = phy.process_dl(); // dl_current_tti now 1, last_rts = 3
        assert!(rts.is_some());
        // A schedule for a TTI already behind current, and not the one we
        // last requested, is late.
        phy.handle_dl_schedule(DlScheduleMsg { current_tti: 0, ..Default::default() });
        let (_, _, rts2) = phy.process_dl();
        assert!(rts2.is_none());
    }

    #[test]
    fn matching_dl_schedule_payload_is_folded_into_the_next_subframe() {
        use std::sync::Mutex as StdMutex;

        struct RecordingCodec {
            n_payloads: StdMutex<Vec<usize>>,
        }
        impl PhyCodec for RecordingCodec {
            fn encode_dl(&self, req: &DlEncodeRequest<'_>) -> Vec<Vec<Cplx>> {
                self.n_payloads.lock().unwrap().push(req.payloads.len());
                vec![vec![Cplx::default(); req.n_samps_per_subfr as usize]]
            }
            fn decode_ul(&self, _samples: &[Cplx]) -> UlDetection {
                UlDetection::default()
            }
            fn n_cce(&self, n_rb_dl: u32, _n_ant: u8) -> u32 {
                n_rb_dl / 2
            }
        }

        let codec = Arc::new(RecordingCodec { n_payloads: StdMutex::new(Vec::new()) });
        let phy = Phy::new(codec.clone(), Arc::new(SysInfo::default_for_bandwidth(50)));
        phy.handle_dl_schedule(DlScheduleMsg { current_tti: 0, payloads: vec![vec![0xAB]], ..Default::default() });
        phy.process_dl();
        // MIB (subframe 0) plus the one MAC-scheduled payload.
        assert_eq!(codec.n_payloads.lock().unwrap()[0], 2);
    }
}
