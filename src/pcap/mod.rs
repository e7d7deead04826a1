//! MAC-LTE pcap framing (§6), generic over any [`std::io::Write`].
//!
//! The original writes directly to `/tmp/<name>.pcap`; a real file (or a
//! network pipe) is the excluded collaborator's concern (§1). This module
//! only knows the tcpdump global header, the per-record MAC-LTE context
//! header, and the record framing around a packed MAC PDU.

use std::io::{self, Write};

/// tcpdump global header magic for a standard (not nanosecond-resolution)
/// capture.
const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
/// `LIBLTE_MAX_MSG_SIZE / 4`, the snap length the original uses for its
/// MAC-LTE capture.
const SNAP_LEN: u32 = 1024;
/// Wireshark's "MAC-LTE" DLT (`LINKTYPE_MAC_LTE`).
const DLT_MAC_LTE: u32 = 147;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Uplink,
    Downlink,
}

/// Which RNTI space a captured PDU's RNTI lives in (MAC-LTE context header
/// `rnti_type` tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RntiType {
    NoRnti,
    P,
    Ra,
    C,
    Si,
    M,
}

impl RntiType {
    fn code(self) -> u8 {
        match self {
            RntiType::NoRnti => 0,
            RntiType::P => 1,
            RntiType::Ra => 2,
            RntiType::C => 3,
            RntiType::Si => 4,
            RntiType::M => 5,
        }
    }
}

/// The fields of one 15-byte MAC-LTE context header (§6).
#[derive(Debug, Clone, Copy)]
pub struct MacLteContext {
    pub direction: Direction,
    pub rnti_type: RntiType,
    pub rnti: u16,
    pub subfn: u16,
}

/// Writes a tcpdump "Link Type 147" (MAC-LTE) capture: one global header
/// followed by one MAC-LTE context header + payload per record.
pub struct MacLteWriter<W: Write> {
    out: W,
    wrote_header: bool,
}

impl<W: Write> MacLteWriter<W> {
    pub fn new(out: W) -> Self {
        MacLteWriter { out, wrote_header: false }
    }

    fn write_global_header(&mut self) -> io::Result<()> {
        self.out.write_all(&PCAP_MAGIC.to_le_bytes())?;
        self.out.write_all(&PCAP_VERSION_MAJOR.to_le_bytes())?;
        self.out.write_all(&PCAP_VERSION_MINOR.to_le_bytes())?;
        self.out.write_all(&0i32.to_le_bytes())?; // thiszone
        self.out.write_all(&0u32.to_le_bytes())?; // sigfigs
        self.out.write_all(&SNAP_LEN.to_le_bytes())?;
        self.out.write_all(&DLT_MAC_LTE.to_le_bytes())?;
        self.wrote_header = true;
        Ok(())
    }

    /// Appends one record: the global header (lazily, once), the 15-byte
    /// MAC-LTE context header, then `payload` verbatim.
    pub fn write_record(&mut self, ts_sec: u32, ts_usec: u32, ctx: &MacLteContext, payload: &[u8]) -> io::Result<()> {
        if !self.wrote_header {
            self.write_global_header()?;
        }
        let context = encode_context(ctx);
        let record_len = (context.len() + payload.len()) as u32;

        self.out.write_all(&ts_sec.to_le_bytes())?;
        self.out.write_all(&ts_usec.to_le_bytes())?;
        self.out.write_all(&record_len.to_le_bytes())?; // incl_len
        self.out.write_all(&record_len.to_le_bytes())?; // orig_len
        self.out.write_all(&context)?;
        self.out.write_all(payload)
    }
}

/// Packs the 15-byte MAC-LTE context header: `radio_type=1`, direction,
/// rnti_type, `rnti_tag=2` + RNTI (big-endian), `ueid_tag=3` + `ueid=0`,
/// `subfn_tag=4` + subframe number (big-endian), `crc_tag=7` + `crc=1`,
/// `payload_tag=1`.
fn encode_context(ctx: &MacLteContext) -> [u8; 15] {
    let mut buf = [0u8; 15];
    buf[0] = 1; // radio_type: FDD
    buf[1] = match ctx.direction {
        Direction::Uplink => 0,
        Direction::Downlink => 1,
    };
    buf[2] = ctx.rnti_type.code();
    buf[3] = 2; // rnti_tag
    buf[4..6].copy_from_slice(&ctx.rnti.to_be_bytes());
    buf[6] = 3; // ueid_tag
    buf[7..9].copy_from_slice(&0u16.to_be_bytes());
    buf[9] = 4; // subfn_tag
    buf[10..12].copy_from_slice(&ctx.subfn.to_be_bytes());
    buf[12] = 7; // crc_tag
    buf[13] = 1; // crc (assumed OK)
    buf[14] = 1; // payload_tag
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_header_carries_the_mac_lte_dlt() {
        let mut buf = Vec::new();
        {
            let mut writer = MacLteWriter::new(&mut buf);
            writer
                .write_record(
                    0,
                    0,
                    &MacLteContext { direction: Direction::Downlink, rnti_type: RntiType::Ra, rnti: 5, subfn: 3 },
                    &[0xAB],
                )
                .unwrap();
        }
        assert_eq!(u32::from_le_bytes(buf[0..4].try_into().unwrap()), PCAP_MAGIC);
        assert_eq!(u32::from_le_bytes(buf[20..24].try_into().unwrap()), DLT_MAC_LTE);
    }

    #[test]
    fn context_header_is_exactly_fifteen_bytes_before_the_payload() {
        let ctx = MacLteContext { direction: Direction::Uplink, rnti_type: RntiType::C, rnti: 0xBEEF, subfn: 7 };
        let encoded = encode_context(&ctx);
        assert_eq!(encoded.len(), 15);
        assert_eq!(encoded[3], 2);
        assert_eq!(u16::from_be_bytes([encoded[4], encoded[5]]), 0xBEEF);
        assert_eq!(encoded[14], 1);
    }

    #[test]
    fn second_record_does_not_repeat_the_global_header() {
        let mut buf = Vec::new();
        let ctx = MacLteContext { direction: Direction::Downlink, rnti_type: RntiType::Si, rnti: 0xFFFF, subfn: 0 };
        {
            let mut writer = MacLteWriter::new(&mut buf);
            writer.write_record(0, 0, &ctx, &[1]).unwrap();
            writer.write_record(0, 1000, &ctx, &[2, 3]).unwrap();
        }
        // global header (24) + record1 (16 + 15 + 1) + record2 (16 + 15 + 2)
        assert_eq!(buf.len(), 24 + (16 + 15 + 1) + (16 + 15 + 2));
    }
}
