//! MAC: the three sliding ring buffers and the scheduler that fills them.
//!
//! The scheduler's pass order (RAR, then DL, then UL) and its headroom
//! arithmetic (`N_avail_dcis = N_cce - (dl.n_alloc + ul.n_alloc)`, drained
//! once per queue per `ReadyToSend`) are taken verbatim from
//! `LTE_fdd_enb_mac.cc::scheduler`. The actual TBS/MCS tables (36.213
//! table 7.1.7.2.1-1) belong to the excluded PHY DSP collaborator; PRB
//! sizing here uses a documented simplified surrogate.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::config::sysinfo::SysInfo;
use crate::error::{Error, Result};
use crate::msgbus::PrachDecode;
use crate::pdu::rar::{RandomAccessResponse, TpcCommand, pack_random_access_response};
use crate::pdu::riv;
use crate::tti::{self, Tti};
use crate::users::UserRegistry;

pub const MAX_PRB: usize = 110;
/// Bits a single PRB carries in one subframe, a fixed placeholder standing
/// in for the real MCS-dependent TBS lookup (36.213 table 7.1.7.2.1-1),
/// which belongs to the excluded PHY collaborator.
const BITS_PER_PRB: u32 = 144;

fn n_prb_for_bits(n_bits: u32, n_rb_avail: u32) -> (u32, u8, u32) {
    let n_prb = n_bits.div_ceil(BITS_PER_PRB).max(1).min(n_rb_avail.max(1));
    let tbs = n_prb * BITS_PER_PRB;
    (tbs, 0, n_prb)
}

/// RA-RNTI addressing the PDCCH/PDSCH carrying a RAR, per `LTE_fdd_enb_mac.cc`:
/// `1 + fn_combo%10 + 10*f_id`, with `f_id` fixed at 0 (the original itself
/// leaves `f_id` a `// FIXME`; this core has one PRACH resource per subframe).
/// This is distinct from the UL grant inside the RAR payload, which is
/// addressed to the newly allocated temporary C-RNTI.
fn ra_rnti_for(fn_combo: Tti) -> u16 {
    1 + (fn_combo % 10) as u16
}

/// PRBs reserved for MIB/SIB1/SI traffic in the subframe at `fn_combo`,
/// verbatim from `LTE_fdd_enb_mac.cc::get_n_reserved_prbs`.
fn n_reserved_prbs(fn_combo: Tti, sys_info: &SysInfo) -> u32 {
    let mut reserved = 0u32;
    if fn_combo % 10 == 0 {
        reserved += 6;
    }
    if fn_combo % 10 == 5 && (fn_combo / 10) % 2 == 0 {
        let (_, _, n_prb) = n_prb_for_bits(sys_info.sib1_image.len() as u32 * 8, sys_info.n_rb_dl);
        reserved += n_prb;
    }
    for (i, image) in sys_info.sched_info_images.iter().enumerate() {
        let i = i as u32;
        if !image.is_empty()
            && (i * sys_info.si_win_len) % 10 == fn_combo % 10
            && (i * sys_info.si_win_len) / 10 == (fn_combo / 10) % sys_info.si_periodicity_t
        {
            let (_, _, n_prb) = n_prb_for_bits(image.len() as u32 * 8, sys_info.n_rb_dl);
            reserved += n_prb;
        }
    }
    reserved
}

#[derive(Debug, Clone, Default)]
pub struct Allocation {
    pub rnti: u16,
    pub n_prb: u32,
    pub prb: SmallVec<[u32; MAX_PRB]>,
    pub mcs: u8,
    pub tbs: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DlScheduleMsg {
    pub allocations: Vec<Allocation>,
    /// Packed transport-block bytes, one per entry in `allocations`, same order.
    pub payloads: Vec<Vec<u8>>,
    pub n_avail_prbs: u32,
    pub n_sched_prbs: u32,
    pub current_tti: Tti,
}

#[derive(Debug, Clone, Default)]
pub struct UlScheduleMsg {
    pub grants: Vec<Allocation>,
    pub decodes: Vec<Allocation>,
    pub n_avail_prbs: u32,
    pub n_sched_prbs: u32,
    pub next_prb: u32,
    pub current_tti: Tti,
}

struct RarSchedEntry {
    target_tti: Tti,
    dl_alloc: Allocation,
    ul_alloc: Allocation,
    rar: RandomAccessResponse,
}

struct DlSchedEntry {
    alloc: Allocation,
    payload: Vec<u8>,
}

struct UlSchedEntry {
    alloc: Allocation,
}

#[derive(Default)]
struct DlSlot {
    fn_combo: Tti,
    allocations: Vec<Allocation>,
    payloads: Vec<Vec<u8>>,
    n_avail_prbs: u32,
    n_sched_prbs: u32,
}

#[derive(Default)]
struct UlSlot {
    fn_combo: Tti,
    grants: Vec<Allocation>,
    decodes: Vec<Allocation>,
    n_avail_prbs: u32,
    n_sched_prbs: u32,
    next_prb: u32,
}

struct MacState {
    rar_queue: VecDeque<RarSchedEntry>,
    dl_queue: VecDeque<DlSchedEntry>,
    ul_queue: VecDeque<UlSchedEntry>,
    dl_subfr: [DlSlot; 10],
    ul_subfr: [UlSlot; 10],
    cur_dl: usize,
    cur_ul: usize,
}

impl MacState {
    fn new() -> Self {
        MacState {
            rar_queue: VecDeque::new(),
            dl_queue: VecDeque::new(),
            ul_queue: VecDeque::new(),
            dl_subfr: Default::default(),
            ul_subfr: Default::default(),
            cur_dl: 0,
            cur_ul: 0,
        }
    }
}

pub struct Mac {
    state: Mutex<MacState>,
    sys_info: RwLock<Arc<SysInfo>>,
}

impl Default for Mac {
    fn default() -> Self {
        Self::new(Arc::new(SysInfo::default_for_bandwidth(50)))
    }
}

impl Mac {
    pub fn new(sys_info: Arc<SysInfo>) -> Self {
        Mac { state: Mutex::new(MacState::new()), sys_info: RwLock::new(sys_info) }
    }

    pub fn update_sys_info(&self, sys_info: Arc<SysInfo>) {
        *self.sys_info.write() = sys_info;
    }

    /// Constructs one RAR per decoded preamble, allocates a placeholder
    /// user/C-RNTI for each, and queues the RAR for scheduling.
    pub fn handle_prach_decode(&self, decode: &PrachDecode, users: &UserRegistry) -> Result<()> {
        let sys_info = self.sys_info.read().clone();
        let mut state = self.state.lock();
        for (preamble, timing_adv) in decode.preambles.iter().zip(decode.timing_adv.iter()) {
            let c_rnti = users.get_free_c_rnti()?;
            users.add_placeholder_user(c_rnti, decode.current_tti)?;

            let rar = RandomAccessResponse {
                rapid: *preamble as u8,
                timing_adv_cmd: *timing_adv as u16,
                hopping_flag: false,
                rba: 0,
                mcs: 0,
                tpc_command: TpcCommand::Zero0dB,
                ul_delay: false,
                csi_req: false,
                temp_crnti: c_rnti,
            };
            let packed = pack_random_access_response(&rar);
            let (_, _, dl_n_prb) = n_prb_for_bits(packed.len() as u32 * 8, sys_info.n_rb_dl);
            let (_, _, ul_n_prb) = n_prb_for_bits(56, sys_info.n_rb_ul); // msg3 placeholder TBS

            state.rar_queue.push_back(RarSchedEntry {
                target_tti: decode.current_tti,
                dl_alloc: Allocation {
                    rnti: ra_rnti_for(decode.current_tti),
                    n_prb: dl_n_prb,
                    prb: SmallVec::new(),
                    mcs: 0,
                    tbs: 0,
                },
                ul_alloc: Allocation { rnti: c_rnti, n_prb: ul_n_prb, prb: SmallVec::new(), mcs: 0, tbs: 0 },
                rar,
            });
        }
        Ok(())
    }

    /// Queues a downlink MAC PDU (already packed by the caller) for a user.
    pub fn enqueue_dl_pdu(&self, c_rnti: u16, payload: Vec<u8>) -> Result<()> {
        let sys_info = self.sys_info.read().clone();
        let (_, _, n_prb) = n_prb_for_bits(payload.len() as u32 * 8, sys_info.n_rb_dl);
        self.state.lock().dl_queue.push_back(DlSchedEntry {
            alloc: Allocation { rnti: c_rnti, n_prb, prb: SmallVec::new(), mcs: 0, tbs: 0 },
            payload,
        });
        Ok(())
    }

    /// Queues an uplink grant for `requested_tbs` bits of UL data.
    pub fn sched_ul(&self, c_rnti: u16, requested_tbs: u32) -> Result<()> {
        let sys_info = self.sys_info.read().clone();
        let (_, _, n_prb) = n_prb_for_bits(requested_tbs, sys_info.n_rb_ul);
        self.state.lock().ul_queue.push_back(UlSchedEntry {
            alloc: Allocation { rnti: c_rnti, n_prb, prb: SmallVec::new(), mcs: 0, tbs: 0 },
        });
        Ok(())
    }

    /// Handles a `ReadyToSend`: resyncs the ring cursors to the requested
    /// TTIs (advancing and clearing stale slots along the way), commits the
    /// now-current DL/UL slot content into messages bound for PHY, advances
    /// the cursors once more to open the next future slot, and runs the
    /// scheduler to fill it.
    pub fn handle_ready_to_send(&self, dl_tti: Tti, ul_tti: Tti, n_cce: u32) -> (DlScheduleMsg, UlScheduleMsg) {
        let sys_info = self.sys_info.read().clone();
        let mut state = self.state.lock();

        resync_dl(&mut state, dl_tti, &sys_info);
        resync_ul(&mut state, ul_tti, &sys_info);

        let dl_msg = {
            let slot = &state.dl_subfr[state.cur_dl];
            DlScheduleMsg {
                allocations: slot.allocations.clone(),
                payloads: slot.payloads.clone(),
                n_avail_prbs: slot.n_avail_prbs,
                n_sched_prbs: slot.n_sched_prbs,
                current_tti: slot.fn_combo,
            }
        };
        let ul_msg = {
            let slot = &state.ul_subfr[state.cur_ul];
            UlScheduleMsg {
                grants: slot.grants.clone(),
                decodes: slot.decodes.clone(),
                n_avail_prbs: slot.n_avail_prbs,
                n_sched_prbs: slot.n_sched_prbs,
                next_prb: slot.next_prb,
                current_tti: slot.fn_combo,
            }
        };

        advance_and_clear_dl(&mut state, &sys_info);
        advance_and_clear_ul(&mut state);

        self.run_scheduler(&mut state, &sys_info, n_cce);

        (dl_msg, ul_msg)
    }

    fn run_scheduler(&self, state: &mut MacState, sys_info: &SysInfo, n_cce: u32) {
        // RAR pass.
        loop {
            let Some(front) = state.rar_queue.front() else { break };
            let resp_win_start = tti::add(front.target_tti, 3);
            let resp_win_stop = tti::add(resp_win_start, sys_info.ra_response_window_size);
            let now = state.dl_subfr[state.cur_dl].fn_combo;

            if tti::le(resp_win_start, now) && tti::le(now, resp_win_stop) {
                let cur_dl = state.cur_dl;
                let ul_idx_6 = (state.cur_ul + 6) % 10;
                let ul_idx_cur = state.cur_ul;

                let n_avail_dl_prbs =
                    state.dl_subfr[cur_dl].n_avail_prbs as i64 - state.dl_subfr[cur_dl].n_sched_prbs as i64;
                let n_avail_ul_prbs =
                    state.ul_subfr[ul_idx_6].n_avail_prbs as i64 - state.ul_subfr[ul_idx_6].n_sched_prbs as i64;
                let n_avail_dcis = n_cce as i64
                    - (state.dl_subfr[cur_dl].allocations.len() as i64 + state.ul_subfr[ul_idx_cur].grants.len() as i64);

                let entry = state.rar_queue.front().unwrap();
                if (entry.dl_alloc.n_prb as i64) <= n_avail_dl_prbs
                    && (entry.ul_alloc.n_prb as i64) <= n_avail_ul_prbs
                    && 1 <= n_avail_dcis
                {
                    let mut entry = state.rar_queue.pop_front().unwrap();
                    let rb_start = state.ul_subfr[ul_idx_6].next_prb;
                    state.ul_subfr[ul_idx_6].next_prb += entry.ul_alloc.n_prb;
                    entry.ul_alloc.prb = (rb_start..rb_start + entry.ul_alloc.n_prb).collect();

                    let riv = riv::encode(sys_info.n_rb_ul, entry.ul_alloc.n_prb, rb_start);
                    entry.rar.rba = (riv & 0x3FF) as u16;
                    let packed = pack_random_access_response(&entry.rar);

                    state.dl_subfr[cur_dl].n_sched_prbs += entry.dl_alloc.n_prb;
                    state.dl_subfr[cur_dl].allocations.push(entry.dl_alloc);
                    state.dl_subfr[cur_dl].payloads.push(packed);
                    state.ul_subfr[ul_idx_6].decodes.push(entry.ul_alloc);
                } else {
                    break;
                }
            } else if tti::le(resp_win_stop, now) && resp_win_stop != now {
                state.rar_queue.pop_front();
            } else {
                break;
            }
        }

        // DL pass.
        loop {
            let Some(front) = state.dl_queue.front() else { break };
            let cur_dl = state.cur_dl;
            let n_avail_dl_prbs =
                state.dl_subfr[cur_dl].n_avail_prbs as i64 - state.dl_subfr[cur_dl].n_sched_prbs as i64;
            let n_avail_dcis = n_cce as i64
                - (state.dl_subfr[cur_dl].allocations.len() as i64 + state.ul_subfr[state.cur_ul].grants.len() as i64);

            if (front.alloc.n_prb as i64) <= n_avail_dl_prbs && 1 <= n_avail_dcis {
                let entry = state.dl_queue.pop_front().unwrap();
                state.dl_subfr[cur_dl].n_sched_prbs += entry.alloc.n_prb;
                state.dl_subfr[cur_dl].allocations.push(entry.alloc);
                state.dl_subfr[cur_dl].payloads.push(entry.payload);
            } else {
                break;
            }
        }

        // UL pass.
        loop {
            let Some(front) = state.ul_queue.front() else { break };
            let ul_idx_4 = (state.cur_ul + 4) % 10;
            let cur_ul = state.cur_ul;
            let n_avail_ul_prbs =
                state.ul_subfr[ul_idx_4].n_avail_prbs as i64 - state.ul_subfr[ul_idx_4].n_sched_prbs as i64;
            let n_avail_dcis = n_cce as i64
                - (state.dl_subfr[state.cur_dl].allocations.len() as i64 + state.ul_subfr[cur_ul].grants.len() as i64);

            if (front.alloc.n_prb as i64) <= n_avail_ul_prbs && 1 <= n_avail_dcis {
                let entry = state.ul_queue.pop_front().unwrap();
                state.ul_subfr[ul_idx_4].n_sched_prbs += entry.alloc.n_prb;
                state.ul_subfr[ul_idx_4].decodes.push(entry.alloc.clone());
                state.ul_subfr[cur_ul].grants.push(entry.alloc);
            } else {
                break;
            }
        }
    }
}

fn resync_dl(state: &mut MacState, target: Tti, sys_info: &SysInfo) {
    while target != state.dl_subfr[state.cur_dl].fn_combo {
        let next_fn_combo = tti::add(state.dl_subfr[state.cur_dl].fn_combo, 10);
        state.dl_subfr[state.cur_dl] = DlSlot {
            fn_combo: next_fn_combo,
            allocations: Vec::new(),
            payloads: Vec::new(),
            n_avail_prbs: sys_info.n_rb_dl - n_reserved_prbs(next_fn_combo, sys_info),
            n_sched_prbs: 0,
        };
        state.cur_dl = (state.cur_dl + 1) % 10;
    }
}

fn resync_ul(state: &mut MacState, target: Tti, sys_info: &SysInfo) {
    while target != state.ul_subfr[state.cur_ul].fn_combo {
        let next_fn_combo = tti::add(state.ul_subfr[state.cur_ul].fn_combo, 10);
        state.ul_subfr[state.cur_ul] = UlSlot {
            fn_combo: next_fn_combo,
            grants: Vec::new(),
            decodes: Vec::new(),
            n_avail_prbs: sys_info.n_rb_ul,
            n_sched_prbs: 0,
            next_prb: 0,
        };
        state.cur_ul = (state.cur_ul + 1) % 10;
    }
}

fn advance_and_clear_dl(state: &mut MacState, sys_info: &SysInfo) {
    let idx = state.cur_dl;
    let next_fn_combo = tti::add(state.dl_subfr[idx].fn_combo, 10);
    state.dl_subfr[idx] = DlSlot {
        fn_combo: next_fn_combo,
        allocations: Vec::new(),
        payloads: Vec::new(),
        n_avail_prbs: sys_info.n_rb_dl - n_reserved_prbs(next_fn_combo, sys_info),
        n_sched_prbs: 0,
    };
    state.cur_dl = (idx + 1) % 10;
}

fn advance_and_clear_ul(state: &mut MacState) {
    let idx = state.cur_ul;
    let next_fn_combo = tti::add(state.ul_subfr[idx].fn_combo, 10);
    state.ul_subfr[idx] = UlSlot {
        fn_combo: next_fn_combo,
        grants: Vec::new(),
        decodes: Vec::new(),
        n_avail_prbs: state.ul_subfr[idx].n_avail_prbs,
        n_sched_prbs: 0,
        next_prb: 0,
    };
    state.cur_ul = (idx + 1) % 10;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sysinfo::SysInfo;

    fn mac_at(n_rb: u32) -> Mac {
        let mut sys_info = SysInfo::default_for_bandwidth(n_rb);
        sys_info.ra_response_window_size = 7;
        Mac::new(Arc::new(sys_info))
    }

    #[test]
    fn prach_decode_queues_one_rar_per_preamble() {
        let mac = mac_at(50);
        let users = UserRegistry::new();
        let decode = PrachDecode { current_tti: 0, preambles: vec![3, 9], timing_adv: vec![1, 2] };
        mac.handle_prach_decode(&decode, &users).unwrap();
        assert_eq!(mac.state.lock().rar_queue.len(), 2);
    }

    #[test]
    fn rar_dl_allocation_uses_ra_rnti_not_the_temp_c_rnti() {
        let mac = mac_at(50);
        let users = UserRegistry::new();
        let decode = PrachDecode { current_tti: 13, preambles: vec![4], timing_adv: vec![0] };
        mac.handle_prach_decode(&decode, &users).unwrap();

        let state = mac.state.lock();
        let entry = &state.rar_queue[0];
        assert_eq!(entry.dl_alloc.rnti, 1 + (13 % 10) as u16);
        assert_eq!(entry.ul_alloc.rnti, entry.rar.temp_crnti);
        assert_ne!(entry.dl_alloc.rnti, entry.ul_alloc.rnti);
    }

    #[test]
    fn ready_to_send_drains_queued_rar_once_in_response_window() {
        let mac = mac_at(50);
        let users = UserRegistry::new();
        let decode = PrachDecode { current_tti: 0, preambles: vec![1], timing_adv: vec![0] };
        mac.handle_prach_decode(&decode, &users).unwrap();

        // Advance the ring until the response window at target+3 is current.
        for step in 1..=3 {
            mac.handle_ready_to_send(step, step, 50);
        }
        assert!(mac.state.lock().rar_queue.is_empty(), "RAR should have been scheduled by tti 3");
    }

    #[test]
    fn scheduled_prbs_never_exceed_available_prbs() {
        let mac = mac_at(6); // 1.4 MHz: very little headroom
        let users = UserRegistry::new();
        for preamble in 0..20u32 {
            let decode = PrachDecode { current_tti: 0, preambles: vec![preamble], timing_adv: vec![0] };
            let _ = mac.handle_prach_decode(&decode, &users);
        }
        for step in 1..=10 {
            mac.handle_ready_to_send(step, step, 4);
        }
        let state = mac.state.lock();
        for slot in &state.dl_subfr {
            assert!(slot.n_sched_prbs <= slot.n_avail_prbs);
        }
    }

    #[test]
    fn dl_queue_headroom_respected_against_n_cce() {
        let mac = mac_at(100);
        mac.enqueue_dl_pdu(5, vec![0u8; 4]).unwrap();
        mac.enqueue_dl_pdu(6, vec![0u8; 4]).unwrap();
        // n_cce == 0 leaves no DCI headroom at all.
        let (dl_msg, _) = mac.handle_ready_to_send(1, 1, 0);
        assert!(dl_msg.allocations.is_empty());
        assert_eq!(mac.state.lock().dl_queue.len(), 2);
    }
}
