//! Bit-level packing for the MIB and SIB1, and a placeholder packer for the
//! SIBs the core does not parse the contents of (SIB2..SIB8 are owned by
//! the excluded RRC/NAS collaborator; the core only needs a stable-length
//! transport-block image per scheduling-info entry to size allocations).
//!
//! This is a simplified, internally-consistent encoding (field widths
//! chosen to match 36.331's bit budget where practical), not a full ASN.1
//! PER codec — the same simplification the retrieval pack's own from-scratch
//! LTE/NR Rust reference takes for the same reason (no ASN.1 tooling in
//! scope here either).

use super::bits::{BitReader, BitWriter};
use crate::config::sysinfo::{DlBandwidth, Mib};

/// Packs the 24-bit MIB carried on the BCH.
pub fn pack_mib(mib: &Mib) -> Vec<u8> {
    let bw_code = match mib.dl_bandwidth {
        DlBandwidth::Rb6 => 0,
        DlBandwidth::Rb15 => 1,
        DlBandwidth::Rb25 => 2,
        DlBandwidth::Rb50 => 3,
        DlBandwidth::Rb75 => 4,
        DlBandwidth::Rb100 => 5,
    };
    let mut w = BitWriter::with_capacity(3);
    w.put_bits(bw_code, 3);
    w.put_bool(mib.phich_duration_extended);
    w.put_bool(mib.phich_resource_half);
    w.put_bits((mib.system_frame_number >> 2) & 0xFF, 8); // 8 MSBs of the 10-bit SFN
    w.put_bits(0, 11); // spare
    w.into_bytes()
}

pub fn unpack_mib(buf: &[u8]) -> Option<Mib> {
    let mut r = BitReader::new(buf);
    let bw_code = r.get_bits(3)?;
    let dl_bandwidth = match bw_code {
        0 => DlBandwidth::Rb6,
        1 => DlBandwidth::Rb15,
        2 => DlBandwidth::Rb25,
        3 => DlBandwidth::Rb50,
        4 => DlBandwidth::Rb75,
        5 => DlBandwidth::Rb100,
        _ => return None,
    };
    let phich_duration_extended = r.get_bool()?;
    let phich_resource_half = r.get_bool()?;
    let sfn_msb = r.get_bits(8)?;
    Some(Mib {
        dl_bandwidth,
        phich_duration_extended,
        phich_resource_half,
        system_frame_number: sfn_msb << 2,
    })
}

/// Packs a PLMN identity (MCC + MNC, 36.331 `PLMN-Identity`) into 3 octets
/// of 4-bit BCD digits, `0xF`-padded when the MNC has only 2 digits.
/// Nibble order grounded on the retrieval pack's from-scratch SIB1 encoder.
pub fn pack_plmn(mcc: [u8; 3], mnc: &[u8]) -> [u8; 3] {
    let mut out = [0u8; 3];
    out[0] = (mcc[1] << 4) | mcc[0];
    if mnc.len() == 3 {
        out[1] = (mnc[2] << 4) | mcc[2];
    } else {
        out[1] = (0xF << 4) | mcc[2];
    }
    out[2] = (mnc.first().copied().unwrap_or(0xF) << 4) | mnc.get(1).copied().unwrap_or(0xF);
    out
}

/// Fields of SIB1 the core itself needs to place on the air, i.e. the
/// subset `ConfigDb` owns (cell access + scheduling-info list). Everything
/// else in a real SIB1 belongs to the excluded RRC collaborator.
#[derive(Debug, Clone)]
pub struct Sib1Fields {
    pub plmn: [u8; 3],
    pub tac: u32,
    pub cell_id: u32,
    pub cell_barred: bool,
    pub intra_freq_reselection: bool,
    pub q_rx_lev_min: i8,
    pub si_window_len_idx: u8,
    pub si_periodicity_idx: u8,
    pub n_sched_info: u8,
}

pub fn pack_sib1(f: &Sib1Fields) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(12);
    w.put_bits(1, 3); // N_plmns (core only ever configures one)
    for byte in f.plmn {
        w.put_u8(byte);
    }
    w.put_bits(f.tac, 16);
    w.put_bits(f.cell_id, 28);
    w.put_bool(f.cell_barred);
    w.put_bool(f.intra_freq_reselection);
    w.put_bits((f.q_rx_lev_min as i32 & 0x3F) as u32, 6);
    w.put_bits(f.si_window_len_idx as u32, 3);
    w.put_bits(f.si_periodicity_idx as u32, 3);
    w.put_bits(f.n_sched_info as u32, 4);
    w.into_bytes()
}

/// Deterministic placeholder transport-block image for a SIB whose content
/// this core does not own (SIB2..SIB8). `len_bytes` is chosen by the caller
/// to reflect that SIB's nominal size so downstream PRB sizing is realistic.
pub fn pack_placeholder_sib(sib_type: u8, len_bytes: usize) -> Vec<u8> {
    let mut buf = vec![sib_type; len_bytes.max(1)];
    buf[0] = sib_type;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mib_roundtrip_preserves_bandwidth_and_sfn_msbs() {
        let mib = Mib {
            dl_bandwidth: DlBandwidth::Rb100,
            phich_duration_extended: true,
            phich_resource_half: false,
            system_frame_number: 1000,
        };
        let packed = pack_mib(&mib);
        assert_eq!(packed.len(), 3);
        let unpacked = unpack_mib(&packed).unwrap();
        assert_eq!(unpacked.dl_bandwidth, mib.dl_bandwidth);
        assert_eq!(unpacked.phich_duration_extended, mib.phich_duration_extended);
        assert_eq!(unpacked.system_frame_number, mib.system_frame_number & !0b11);
    }

    #[test]
    fn plmn_encoding_matches_two_digit_mnc_convention() {
        let encoded = pack_plmn([0, 0, 1], &[0, 1]);
        assert_eq!(encoded, [0x00, 0xF1, 0x10]);
    }
}
