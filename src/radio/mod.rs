//! Radio: the SDR device boundary and the per-subframe TX/RX handoff.
//!
//! `LTE_fdd_enb_radio.cc` drives a UHD USRP directly; here [`SdrDevice`] is
//! the seam a real SDR driver fills in, and [`NullSdr`] stands in for the
//! original's `no_rf` path (`selected_radio_idx == 0`): no hardware, just
//! the same subframe-cadence bookkeeping, so the rest of the core exercises
//! identical timing whether or not a radio is attached.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::RadioTuner;
use crate::error::{Error, Result};
use crate::tti::{FN_COMBO_MODULUS, Tti};

pub mod align;
pub use align::{RxAligner, RxOutcome};

/// One interleaved I/Q sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cplx {
    pub i: f32,
    pub q: f32,
}

/// One subframe's RX capture (single antenna; the original only ever
/// captures one RX stream regardless of `N_ant`).
#[derive(Debug, Clone)]
pub struct RxSubframe {
    pub fn_combo: Tti,
    pub samples: Vec<Cplx>,
}

/// The SDR hardware boundary: blocking send/recv of one subframe of
/// baseband samples. A real implementation wraps a UHD/SoapySDR device;
/// [`NullSdr`] is the `no_rf` stand-in used for development and the
/// composition-root binary.
pub trait SdrDevice: Send + Sync {
    fn send(&self, samples: &[Cplx]);
    fn recv(&self, n_samps: usize) -> Vec<Cplx>;
    /// EARFCN→frequency conversion is a PHY/RF collaborator concern; this
    /// passes the raw EARFCN pair through and lets the device interpret it.
    fn set_freq(&self, dl_earfcn: u32, ul_earfcn: u32);
    fn set_gain(&self, tx_gain: u32, rx_gain: u32);
}

/// No-RF device: sleeps the subframe period on transmit (pacing the loop to
/// 1kHz the way a real device's blocking `send` would) and returns silence
/// on receive.
pub struct NullSdr;

impl SdrDevice for NullSdr {
    fn send(&self, _samples: &[Cplx]) {
        thread::sleep(Duration::from_millis(1));
    }

    fn recv(&self, n_samps: usize) -> Vec<Cplx> {
        vec![Cplx::default(); n_samps]
    }

    fn set_freq(&self, _dl_earfcn: u32, _ul_earfcn: u32) {}

    fn set_gain(&self, _tx_gain: u32, _rx_gain: u32) {}
}

/// Sample rate (Hz) and samples per 1ms subframe for a DL bandwidth,
/// verbatim from `LTE_fdd_enb_radio.cc::get_sample_rate`.
pub fn sample_rate_for_n_rb(n_rb: u32) -> (u32, u32) {
    match n_rb {
        100 | 75 => (30_720_000, 30_720),
        50 => (15_360_000, 15_360),
        25 => (7_680_000, 7_680),
        15 => (3_840_000, 3_840),
        _ => (1_920_000, 1_920),
    }
}

/// Mixes per-antenna TX samples into the single stream a device accepts:
/// each antenna's I/Q is scaled by 1/50 (baseband headroom, verbatim from
/// `LTE_fdd_enb_radio.cc::send`) and the per-antenna sums are averaged.
pub fn mix_antennas(antennas: &[Vec<Cplx>]) -> Vec<Cplx> {
    let Some(n_samps) = antennas.first().map(Vec::len) else { return Vec::new() };
    let n_ant = antennas.len().max(1) as f32;
    let mut out = vec![Cplx::default(); n_samps];
    for ant in antennas {
        for (acc, s) in out.iter_mut().zip(ant.iter()) {
            acc.i += s.i / 50.0;
            acc.q += s.q / 50.0;
        }
    }
    for s in &mut out {
        s.i /= n_ant;
        s.q /= n_ant;
    }
    out
}

/// Drives one [`SdrDevice`] at the subframe cadence, tracking the expected
/// next TX `fn_combo` so a late or skipped transmit is detected and logged
/// rather than silently misordering the air interface.
pub struct Radio {
    device: Arc<dyn SdrDevice>,
    fs: AtomicU32,
    n_samps_per_subfr: AtomicU32,
    n_ant: AtomicU32,
    tx_gain: AtomicU32,
    rx_gain: AtomicU32,
    started: AtomicBool,
    next_tx_fn_combo: Mutex<Option<Tti>>,
    next_rx_fn_combo: Mutex<Tti>,
}

impl Radio {
    pub fn new(device: Arc<dyn SdrDevice>, n_rb: u32, n_ant: u32) -> Self {
        let (fs, n_samps_per_subfr) = sample_rate_for_n_rb(n_rb);
        Radio {
            device,
            fs: AtomicU32::new(fs),
            n_samps_per_subfr: AtomicU32::new(n_samps_per_subfr),
            n_ant: AtomicU32::new(n_ant),
            tx_gain: AtomicU32::new(0),
            rx_gain: AtomicU32::new(0),
            started: AtomicBool::new(false),
            next_tx_fn_combo: Mutex::new(None),
            next_rx_fn_combo: Mutex::new(0),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        *self.next_tx_fn_combo.lock() = None;
        *self.next_rx_fn_combo.lock() = 0;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        if !self.started.swap(false, Ordering::AcqRel) {
            return Err(Error::AlreadyStopped);
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.fs.load(Ordering::Relaxed)
    }

    pub fn n_samps_per_subfr(&self) -> u32 {
        self.n_samps_per_subfr.load(Ordering::Relaxed)
    }

    /// Recomputes the sample rate for a new bandwidth. Matches the
    /// original: only takes effect while stopped, otherwise the radio keeps
    /// running at its current rate.
    pub fn update_bandwidth(&self, n_rb: u32) {
        if self.is_started() {
            return;
        }
        let (fs, n_samps_per_subfr) = sample_rate_for_n_rb(n_rb);
        self.fs.store(fs, Ordering::Relaxed);
        self.n_samps_per_subfr.store(n_samps_per_subfr, Ordering::Relaxed);
    }

    pub fn set_n_ant(&self, n_ant: u32) {
        self.n_ant.store(n_ant.max(1), Ordering::Relaxed);
    }

    pub fn tx_gain(&self) -> u32 {
        self.tx_gain.load(Ordering::Relaxed)
    }

    pub fn rx_gain(&self) -> u32 {
        self.rx_gain.load(Ordering::Relaxed)
    }

    pub fn set_tx_gain(&self, gain: u32) {
        self.tx_gain.store(gain, Ordering::Relaxed);
        self.device.set_gain(gain, self.rx_gain());
    }

    pub fn set_rx_gain(&self, gain: u32) {
        self.rx_gain.store(gain, Ordering::Relaxed);
        self.device.set_gain(self.tx_gain(), gain);
    }

    /// Mixes `antennas` down to one stream and hands it to the device,
    /// warning (not failing — the original only adjusted its TX timeline)
    /// if `fn_combo` skipped ahead of the expected next transmit.
    pub fn transmit(&self, fn_combo: Tti, antennas: &[Vec<Cplx>]) {
        let mut next = self.next_tx_fn_combo.lock();
        if let Some(expected) = *next {
            if fn_combo != expected {
                let n_skipped = (fn_combo + FN_COMBO_MODULUS - expected) % FN_COMBO_MODULUS;
                log::warn!("radio TX skipped {n_skipped} subframe(s), resyncing to {fn_combo}");
            }
        }
        *next = Some((fn_combo + 1) % FN_COMBO_MODULUS);
        drop(next);

        let mixed = mix_antennas(antennas);
        self.device.send(&mixed);
    }

    /// Pulls one subframe's RX samples and tags them with the next expected
    /// `fn_combo`. A real driver backing [`SdrDevice`] would instead report
    /// a wallclock timestamp here for [`align::RxAligner`] to reconcile
    /// against; `NullSdr` has no such notion of drift, so this simply
    /// advances in lock-step with the TX side.
    pub fn receive(&self) -> RxSubframe {
        let samples = self.device.recv(self.n_samps_per_subfr() as usize);
        let mut next_rx = self.next_rx_fn_combo.lock();
        let fn_combo = *next_rx;
        *next_rx = (fn_combo + 1) % FN_COMBO_MODULUS;
        RxSubframe { fn_combo, samples }
    }
}

impl RadioTuner for Radio {
    fn retune(&self, dl_earfcn: u32, ul_earfcn: u32) {
        self.device.set_freq(dl_earfcn, ul_earfcn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rate_table_matches_bandwidth() {
        assert_eq!(sample_rate_for_n_rb(100), (30_720_000, 30_720));
        assert_eq!(sample_rate_for_n_rb(50), (15_360_000, 15_360));
        assert_eq!(sample_rate_for_n_rb(6), (1_920_000, 1_920));
    }

    #[test]
    fn mixing_two_antennas_averages_scaled_sums() {
        let ant0 = vec![Cplx { i: 100.0, q: 0.0 }];
        let ant1 = vec![Cplx { i: 0.0, q: 100.0 }];
        let mixed = mix_antennas(&[ant0, ant1]);
        assert_eq!(mixed.len(), 1);
        assert!((mixed[0].i - 1.0).abs() < 1e-6);
        assert!((mixed[0].q - 1.0).abs() < 1e-6);
    }

    #[test]
    fn single_antenna_mix_is_just_scaled() {
        let ant0 = vec![Cplx { i: 50.0, q: -50.0 }];
        let mixed = mix_antennas(&[ant0]);
        assert!((mixed[0].i - 1.0).abs() < 1e-6);
        assert!((mixed[0].q + 1.0).abs() < 1e-6);
    }

    #[test]
    fn transmit_tracks_expected_next_fn_combo_without_panicking_on_skip() {
        let radio = Radio::new(Arc::new(NullSdr), 50, 1);
        radio.start().unwrap();
        radio.transmit(0, &[vec![Cplx::default(); 4]]);
        // Skip ahead a few subframes; should just warn, not fail.
        radio.transmit(5, &[vec![Cplx::default(); 4]]);
    }

    #[test]
    fn double_start_is_rejected() {
        let radio = Radio::new(Arc::new(NullSdr), 50, 1);
        radio.start().unwrap();
        assert_eq!(radio.start(), Err(Error::AlreadyStarted));
    }

    #[test]
    fn update_bandwidth_is_noop_once_started() {
        let radio = Radio::new(Arc::new(NullSdr), 50, 1);
        radio.start().unwrap();
        radio.update_bandwidth(6);
        assert_eq!(radio.sample_rate(), 15_360_000);
    }
}
