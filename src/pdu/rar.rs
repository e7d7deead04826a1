//! Random Access Response PDU packing (36.321 §6.2.2/6.2.3).
//!
//! A RAR subheader is one byte: `E(1) T(1)` then either `R(2) BI(4)`
//! (backoff-indicator header) or `RAPID(6)` (a real RAR follows). A RAPID
//! header is followed by a 48-bit (6 byte) RAR payload.

use super::bits::{BitReader, BitWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpcCommand {
    Minus6dB,
    Minus4dB,
    Minus2dB,
    Zero0dB,
    Plus2dB,
    Plus4dB,
    Plus6dB,
    Plus8dB,
}

impl TpcCommand {
    fn to_bits(self) -> u32 {
        match self {
            TpcCommand::Minus6dB => 0,
            TpcCommand::Minus4dB => 1,
            TpcCommand::Minus2dB => 2,
            TpcCommand::Zero0dB => 3,
            TpcCommand::Plus2dB => 4,
            TpcCommand::Plus4dB => 5,
            TpcCommand::Plus6dB => 6,
            TpcCommand::Plus8dB => 7,
        }
    }

    fn from_bits(v: u32) -> Self {
        match v {
            0 => TpcCommand::Minus6dB,
            1 => TpcCommand::Minus4dB,
            2 => TpcCommand::Minus2dB,
            3 => TpcCommand::Zero0dB,
            4 => TpcCommand::Plus2dB,
            5 => TpcCommand::Plus4dB,
            6 => TpcCommand::Plus6dB,
            _ => TpcCommand::Plus8dB,
        }
    }
}

/// The RAR payload fields carried after a RAPID-type header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomAccessResponse {
    pub rapid: u8,
    pub timing_adv_cmd: u16,
    pub hopping_flag: bool,
    /// Resource block assignment, 10 bits (the packed RIV, see [`super::riv`]).
    pub rba: u16,
    pub mcs: u8,
    pub tpc_command: TpcCommand,
    pub ul_delay: bool,
    pub csi_req: bool,
    pub temp_crnti: u16,
}

/// A backoff-indicator-only header (no payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffIndicator {
    pub bi: u8,
}

/// Packs a single RAR: a RAPID-type header (`E=0`, final subheader in this
/// PDU) followed by its 48-bit payload. Returns the packed bytes.
pub fn pack_random_access_response(rar: &RandomAccessResponse) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(7);
    // header: E(1)=0, T(1)=1 (RAPID type), RAPID(6)
    w.put_bool(false);
    w.put_bool(true);
    w.put_bits(rar.rapid as u32, 6);
    // payload
    w.put_bool(false); // R
    w.put_bits(rar.timing_adv_cmd as u32, 11);
    w.put_bool(rar.hopping_flag);
    w.put_bits(rar.rba as u32, 10);
    w.put_bits(rar.mcs as u32, 4);
    w.put_bits(rar.tpc_command.to_bits(), 3);
    w.put_bool(rar.ul_delay);
    w.put_bool(rar.csi_req);
    w.put_bits(rar.temp_crnti as u32, 16);
    w.into_bytes()
}

/// Unpacks a single RAPID-type RAR (header + payload) from the front of
/// `buf`. Returns `None` if the header indicates a backoff indicator or the
/// buffer is too short.
pub fn unpack_random_access_response(buf: &[u8]) -> Option<RandomAccessResponse> {
    let mut r = BitReader::new(buf);
    let _e = r.get_bool()?;
    let t = r.get_bool()?;
    if !t {
        return None;
    }
    let rapid = r.get_bits(6)? as u8;
    let _reserved = r.get_bool()?;
    let timing_adv_cmd = r.get_bits(11)? as u16;
    let hopping_flag = r.get_bool()?;
    let rba = r.get_bits(10)? as u16;
    let mcs = r.get_bits(4)? as u8;
    let tpc_command = TpcCommand::from_bits(r.get_bits(3)?);
    let ul_delay = r.get_bool()?;
    let csi_req = r.get_bool()?;
    let temp_crnti = r.get_bits(16)? as u16;
    Some(RandomAccessResponse {
        rapid,
        timing_adv_cmd,
        hopping_flag,
        rba,
        mcs,
        tpc_command,
        ul_delay,
        csi_req,
        temp_crnti,
    })
}

/// Packs a backoff-indicator-only header (`E=0, T=0, R(2)=0, BI(4)`).
pub fn pack_backoff_indicator(bi: BackoffIndicator) -> [u8; 1] {
    let mut w = BitWriter::with_capacity(1);
    w.put_bool(false);
    w.put_bool(false);
    w.put_bits(0, 2);
    w.put_bits(bi.bi as u32, 4);
    let bytes = w.into_bytes();
    [bytes[0]]
}

pub fn unpack_backoff_indicator(buf: &[u8]) -> Option<BackoffIndicator> {
    let mut r = BitReader::new(buf);
    let _e = r.get_bool()?;
    let t = r.get_bool()?;
    if t {
        return None;
    }
    let _r_bits = r.get_bits(2)?;
    let bi = r.get_bits(4)? as u8;
    Some(BackoffIndicator { bi })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RandomAccessResponse {
        RandomAccessResponse {
            rapid: 12,
            timing_adv_cmd: 45,
            hopping_flag: false,
            rba: 0x155,
            mcs: 7,
            tpc_command: TpcCommand::Zero0dB,
            ul_delay: false,
            csi_req: false,
            temp_crnti: 0xBEEF,
        }
    }

    #[test]
    fn rar_roundtrip() {
        let rar = sample();
        let packed = pack_random_access_response(&rar);
        assert_eq!(packed.len(), 7);
        let unpacked = unpack_random_access_response(&packed).unwrap();
        assert_eq!(unpacked, rar);
    }

    #[test]
    fn backoff_indicator_roundtrip() {
        let bi = BackoffIndicator { bi: 9 };
        let packed = pack_backoff_indicator(bi);
        let unpacked = unpack_backoff_indicator(&packed).unwrap();
        assert_eq!(unpacked, bi);
    }
}
