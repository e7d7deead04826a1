//! ConfigDB: the process-wide typed parameter store and `SysInfo` builder.

pub mod params;
pub mod sysinfo;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::RandomState;
use crossbeam_channel::{Receiver, Sender};
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::pdu::sib;

pub use params::{Bounds, BoundsKind, ParamName, Value};
pub use sysinfo::{DlBandwidth, Mib, SchedulingInfoEntry, SibPresence, SysInfo};

/// A read-only capability the composition root hands to `ConfigDb` so an
/// `DL_EARFCN`/`FreqBand` write can retune the radio without ConfigDb
/// holding a reference to the `Radio` layer itself (design note: break
/// cyclic layer references with a capability, not a pointer).
pub trait RadioTuner: Send + Sync {
    fn retune(&self, dl_earfcn: u32, ul_earfcn: u32);
}

/// First DL EARFCN of each band's range (36.101 table 5.7.3-1, abridged to
/// the entries the core's `FreqBand` parameter exposes).
const FIRST_DL_EARFCN_BY_BAND: &[(u8, u32)] =
    &[(1, 0), (2, 600), (3, 1200), (4, 1950), (5, 2400), (7, 2750), (8, 3450), (20, 6150), (28, 9210)];

fn ul_earfcn_for_dl(dl_earfcn: u32) -> u32 {
    // Simplified one-to-one band offset consistent with the bands above;
    // a full implementation would consult the per-band UL/DL offset table.
    dl_earfcn + 18_000
}

pub struct ConfigDb {
    started: AtomicBool,
    values: RwLock<HashMap<ParamName, Value, RandomState>>,
    n_id_1: RwLock<u16>,
    n_id_2: RwLock<u8>,
    sys_info: RwLock<Arc<SysInfo>>,
    subscribers: RwLock<Vec<Sender<Arc<SysInfo>>>>,
    tuner: Option<Arc<dyn RadioTuner>>,
}

impl ConfigDb {
    pub fn new(tuner: Option<Arc<dyn RadioTuner>>) -> Self {
        let mut values = HashMap::with_hasher(RandomState::new());
        values.insert(ParamName::Bandwidth, Value::Double(10.0));
        values.insert(ParamName::DlEarfcn, Value::Int64(1575));
        values.insert(ParamName::UlEarfcn, Value::Int64(ul_earfcn_for_dl(1575) as i64));
        values.insert(ParamName::FreqBand, Value::Int64(3));
        values.insert(ParamName::NAnt, Value::Int64(1));
        values.insert(ParamName::NIdCell, Value::Int64(0));
        values.insert(ParamName::Mcc, Value::Int64(1));
        values.insert(ParamName::Mnc, Value::Int64(1));
        values.insert(ParamName::CellId, Value::Int64(1));
        values.insert(ParamName::Tac, Value::Int64(1));
        values.insert(ParamName::QRxLevMin, Value::Int64(-70));
        values.insert(ParamName::P0NominalPusch, Value::Int64(-96));
        values.insert(ParamName::P0NominalPucch, Value::Int64(-110));
        for sib in [
            ParamName::Sib3Present,
            ParamName::Sib4Present,
            ParamName::Sib5Present,
            ParamName::Sib6Present,
            ParamName::Sib7Present,
            ParamName::Sib8Present,
        ] {
            values.insert(sib, Value::Uint32(0));
        }
        values.insert(ParamName::QHyst, Value::Int64(0));
        values.insert(ParamName::SearchWinSize, Value::Int64(4));
        values.insert(ParamName::RaResponseWindowSize, Value::Int64(5)); // index -> 7 subframes
        values.insert(ParamName::DebugType, Value::Int64(0));
        values.insert(ParamName::DebugLevel, Value::Int64(0));
        values.insert(ParamName::EnablePcap, Value::Uint32(0));
        values.insert(ParamName::RadioIdx, Value::Int64(0));
        values.insert(ParamName::TxGain, Value::Int64(40));
        values.insert(ParamName::RxGain, Value::Int64(40));

        Self {
            started: AtomicBool::new(false),
            values: RwLock::new(values),
            n_id_1: RwLock::new(0),
            n_id_2: RwLock::new(0),
            sys_info: RwLock::new(Arc::new(SysInfo::default_for_bandwidth(50))),
            subscribers: RwLock::new(Vec::new()),
            tuner,
        }
    }

    pub fn mark_started(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn mark_stopped(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    /// Registers a layer to receive future `SysInfo` snapshots. Returns the
    /// receiving end of a dedicated bounded channel (broadcast fan-out: one
    /// sender stored per subscriber, all fired together on `construct_sys_info`).
    pub fn subscribe(&self) -> Receiver<Arc<SysInfo>> {
        let (tx, rx) = crossbeam_channel::bounded(4);
        self.subscribers.write().push(tx);
        rx
    }

    pub fn get(&self, name: ParamName) -> Result<Value> {
        match name {
            ParamName::NId1 => return Ok(Value::Uint32(u32::from(*self.n_id_1.read()))),
            ParamName::NId2 => return Ok(Value::Uint32(u32::from(*self.n_id_2.read()))),
            _ => {}
        }
        self.values.read().get(&name).cloned().ok_or(Error::InvalidParam)
    }

    pub fn set(&self, name: ParamName, value: Value) -> Result<()> {
        if matches!(name, ParamName::NId1 | ParamName::NId2) {
            return Err(Error::InvalidParam);
        }
        let bounds = params::bounds_of(name);
        self.check_bounds(name, &value, &bounds)?;
        if self.started.load(Ordering::SeqCst) && !bounds.dynamic {
            return Err(Error::VariableNotDynamic);
        }

        self.values.write().insert(name, value.clone());
        self.apply_coupling(name, &value)?;
        Ok(())
    }

    fn check_bounds(&self, name: ParamName, value: &Value, bounds: &Bounds) -> Result<()> {
        match bounds.kind {
            BoundsKind::IntRange(lo, hi) => {
                let v = value.as_i64().ok_or(Error::InvalidParam)?;
                if v < lo || v > hi {
                    return Err(Error::OutOfBounds);
                }
            }
            BoundsKind::DoubleSet(set) => {
                let v = value.as_f64().ok_or(Error::InvalidParam)?;
                if !set.iter().any(|candidate| (candidate - v).abs() < 1e-6) {
                    return Err(Error::OutOfBounds);
                }
            }
            BoundsKind::BoolFlag => {
                value.as_u32().ok_or(Error::InvalidParam)?;
            }
        }
        let _ = name;
        Ok(())
    }

    /// Applies the coupled-parameter rules of spec §3/§4.1.
    fn apply_coupling(&self, name: ParamName, value: &Value) -> Result<()> {
        match name {
            ParamName::Bandwidth => {
                let bw = value.as_f64().ok_or(Error::InvalidParam)?;
                let n_rb = params::n_rb_for_bandwidth(bw).ok_or(Error::OutOfBounds)?;
                // N_rb and DL_Bandwidth take effect immediately (read through
                // `get_sys_info()`); the rest of the snapshot is rebuilt lazily
                // by the next `construct_sys_info()` call.
                let mut sys_info = self.sys_info.write();
                let mut next = (**sys_info).clone();
                next.n_rb_dl = n_rb;
                next.n_rb_ul = n_rb;
                next.mib.dl_bandwidth = DlBandwidth::from_n_rb(n_rb).expect("table-checked");
                *sys_info = Arc::new(next);
            }
            ParamName::NIdCell => {
                let v = value.as_i64().ok_or(Error::InvalidParam)? as u16;
                *self.n_id_1.write() = v / 3;
                *self.n_id_2.write() = (v % 3) as u8;
            }
            ParamName::DlEarfcn => {
                let dl = value.as_i64().ok_or(Error::InvalidParam)? as u32;
                let ul = ul_earfcn_for_dl(dl);
                self.values.write().insert(ParamName::UlEarfcn, Value::Int64(ul as i64));
                if let Some(tuner) = &self.tuner {
                    tuner.retune(dl, ul);
                }
            }
            ParamName::FreqBand => {
                let band = value.as_i64().ok_or(Error::InvalidParam)? as u8;
                let first_dl = FIRST_DL_EARFCN_BY_BAND
                    .iter()
                    .find(|(b, _)| *b == band)
                    .map(|(_, earfcn)| *earfcn)
                    .ok_or(Error::OutOfBounds)?;
                self.set(ParamName::DlEarfcn, Value::Int64(first_dl as i64))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Rebuilds `SysInfo`: packs MIB + SIB1, distributes SIB3..8 into
    /// scheduling-info entries, and broadcasts the snapshot to subscribers.
    pub fn construct_sys_info(&self) -> Result<Arc<SysInfo>> {
        let values = self.values.read();
        let n_id_cell = values.get(&ParamName::NIdCell).and_then(Value::as_i64).ok_or(Error::InvalidParam)? as u16;
        let mcc = values.get(&ParamName::Mcc).and_then(Value::as_i64).unwrap_or(1) as u32;
        let mnc = values.get(&ParamName::Mnc).and_then(Value::as_i64).unwrap_or(1) as u32;
        let tac = values.get(&ParamName::Tac).and_then(Value::as_i64).unwrap_or(1) as u32;
        let cell_id = values.get(&ParamName::CellId).and_then(Value::as_i64).unwrap_or(1) as u32;
        let q_rx_lev_min = values.get(&ParamName::QRxLevMin).and_then(Value::as_i64).unwrap_or(-70) as i8;
        let ra_window_idx = values.get(&ParamName::RaResponseWindowSize).and_then(Value::as_i64).unwrap_or(5) as usize;
        let n_ant = values.get(&ParamName::NAnt).and_then(Value::as_i64).unwrap_or(1) as u8;
        let sibs_present = SibPresence {
            sib3: values.get(&ParamName::Sib3Present).and_then(Value::as_u32).unwrap_or(0) != 0,
            sib4: values.get(&ParamName::Sib4Present).and_then(Value::as_u32).unwrap_or(0) != 0,
            sib5: values.get(&ParamName::Sib5Present).and_then(Value::as_u32).unwrap_or(0) != 0,
            sib6: values.get(&ParamName::Sib6Present).and_then(Value::as_u32).unwrap_or(0) != 0,
            sib7: values.get(&ParamName::Sib7Present).and_then(Value::as_u32).unwrap_or(0) != 0,
            sib8: values.get(&ParamName::Sib8Present).and_then(Value::as_u32).unwrap_or(0) != 0,
        };
        drop(values);

        let prev = self.sys_info.read().clone();

        // Distribute SIB3..8 into scheduling-info entries: entry 0 carries
        // the implicit SIB2 (no mapping-info of its own); each later entry
        // carries up to two further SIBs, in ascending SIB-number order.
        let present = sibs_present.present_sibs();
        let mut scheduling_info: SmallVec<[SchedulingInfoEntry; sysinfo::MAX_SCHED_INFO]> = SmallVec::new();
        scheduling_info.push(SchedulingInfoEntry { sib_mapping: SmallVec::new(), si_periodicity_rf: 8 });
        for chunk in present.chunks(sysinfo::MAX_SIBS_PER_SCHED_ENTRY) {
            scheduling_info.push(SchedulingInfoEntry {
                sib_mapping: SmallVec::from_slice(chunk),
                si_periodicity_rf: 8,
            });
        }

        // Pack the SIB2 placeholder (entry 0) and one placeholder per later
        // entry's mapped SIBs (concatenated into a single transport-block
        // image per entry, matching `mac_pdsch_schedule`'s one-TB-per-SI model).
        let mut sched_info_images: SmallVec<[bytes::Bytes; sysinfo::MAX_SCHED_INFO]> = SmallVec::new();
        sched_info_images.push(bytes::Bytes::from(sib::pack_placeholder_sib(2, 8)));
        for entry in scheduling_info.iter().skip(1) {
            let mut buf = Vec::new();
            for &sib_type in &entry.sib_mapping {
                buf.extend(sib::pack_placeholder_sib(sib_type, 8));
            }
            sched_info_images.push(bytes::Bytes::from(buf));
        }

        let sib1_fields = sib::Sib1Fields {
            plmn: sib::pack_plmn(mcc_digits(mcc), &mnc_digits(mnc)),
            tac,
            cell_id,
            cell_barred: false,
            intra_freq_reselection: true,
            q_rx_lev_min,
            si_window_len_idx: 0,
            si_periodicity_idx: 0,
            n_sched_info: scheduling_info.len() as u8,
        };
        let sib1_image = bytes::Bytes::from(sib::pack_sib1(&sib1_fields));

        let next = SysInfo {
            mib: Mib {
                dl_bandwidth: prev.mib.dl_bandwidth,
                phich_duration_extended: prev.mib.phich_duration_extended,
                phich_resource_half: prev.mib.phich_resource_half,
                system_frame_number: prev.mib.system_frame_number,
            },
            sibs_present,
            scheduling_info,
            sib1_image,
            sched_info_images,
            n_ant,
            n_id_cell,
            n_id_1: *self.n_id_1.read(),
            n_id_2: *self.n_id_2.read(),
            n_rb_dl: prev.n_rb_dl,
            n_rb_ul: prev.n_rb_ul,
            n_sc_rb_dl: 12,
            n_sc_rb_ul: 12,
            si_periodicity_t: 8,
            si_win_len: 1,
            ra_response_window_size: params::RA_RESPONSE_WINDOW_SIZE_NUM
                .get(ra_window_idx)
                .copied()
                .unwrap_or(7),
        };
        let snapshot = Arc::new(next);
        *self.sys_info.write() = snapshot.clone();

        let subs = self.subscribers.read();
        for tx in subs.iter() {
            // A full queue here means a layer has stalled; non-blocking send
            // preserves the "no silent drops, but also no stalled ConfigDB"
            // balance — construct_si() itself must never block on a reader.
            let _ = tx.try_send(snapshot.clone());
        }

        Ok(snapshot)
    }

    pub fn get_sys_info(&self) -> Arc<SysInfo> {
        self.sys_info.read().clone()
    }
}

fn mcc_digits(mcc: u32) -> [u8; 3] {
    [(mcc / 100 % 10) as u8, (mcc / 10 % 10) as u8, (mcc % 10) as u8]
}

fn mnc_digits(mnc: u32) -> SmallVec<[u8; 3]> {
    if mnc >= 100 {
        SmallVec::from_slice(&[(mnc / 100 % 10) as u8, (mnc / 10 % 10) as u8, (mnc % 10) as u8])
    } else {
        SmallVec::from_slice(&[(mnc / 10 % 10) as u8, (mnc % 10) as u8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_20_implies_100_prbs() {
        let db = ConfigDb::new(None);
        db.set(ParamName::Bandwidth, Value::Double(20.0)).unwrap();
        let info = db.get_sys_info();
        assert_eq!(info.n_rb_dl, 100);
        assert_eq!(info.n_rb_ul, 100);
        assert_eq!(info.mib.dl_bandwidth, DlBandwidth::Rb100);
    }

    #[test]
    fn bandwidth_10_then_n_id_cell_7() {
        let db = ConfigDb::new(None);
        db.set(ParamName::Bandwidth, Value::Double(10.0)).unwrap();
        db.set(ParamName::NIdCell, Value::Int64(7)).unwrap();
        assert_eq!(db.get(ParamName::NId1).unwrap().as_u32(), Some(2));
        assert_eq!(db.get(ParamName::NId2).unwrap().as_u32(), Some(1));
        assert_eq!(db.get_sys_info().n_rb_dl, 50);
    }

    #[test]
    fn n_id_cell_derives_n_id_1_and_2() {
        let db = ConfigDb::new(None);
        db.set(ParamName::NIdCell, Value::Int64(500)).unwrap();
        assert_eq!(db.get(ParamName::NId2).unwrap().as_u32(), Some(500 % 3));
        assert_eq!(db.get(ParamName::NId1).unwrap().as_u32(), Some(500 / 3));
    }

    #[test]
    fn not_dynamic_rejected_once_started() {
        let db = ConfigDb::new(None);
        db.mark_started();
        let err = db.set(ParamName::Bandwidth, Value::Double(5.0)).unwrap_err();
        assert_eq!(err, Error::VariableNotDynamic);
    }

    #[test]
    fn out_of_bounds_rejected() {
        let db = ConfigDb::new(None);
        let err = db.set(ParamName::Bandwidth, Value::Double(7.0)).unwrap_err();
        assert_eq!(err, Error::OutOfBounds);
    }

    #[test]
    fn narrow_bandwidth_yields_single_schedule_entry_with_empty_mapping() {
        let db = ConfigDb::new(None);
        db.set(ParamName::Bandwidth, Value::Double(1.4)).unwrap();
        let info = db.construct_sys_info().unwrap();
        assert_eq!(info.scheduling_info.len(), 1);
        assert_eq!(info.scheduling_info[0].sib_mapping.len(), 0);
        assert_eq!(info.sched_info_images[0].len(), 8);
    }

    #[test]
    fn n_ant_round_trips_through_construct_sys_info() {
        let db = ConfigDb::new(None);
        db.set(ParamName::NAnt, Value::Int64(4)).unwrap();
        let info = db.construct_sys_info().unwrap();
        assert_eq!(info.n_ant, 4);
    }
}
