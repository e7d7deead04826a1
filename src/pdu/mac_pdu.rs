//! Generic DL-SCH/UL-SCH MAC PDU packing (36.321 §6.1.2).
//!
//! A MAC PDU is a run of subheaders (`R R E LCID[5]`, plus `F L[7|15]` on
//! every subheader but the last) followed by the concatenated payload of
//! every subheader in the same order: control elements first, then SDUs.
//! The last subheader carries no length field — its payload runs to the end
//! of the message. Callers are responsible for ordering CEs before SDUs;
//! this module only encodes/decodes the framing.

use super::bits::{BitReader, BitWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacSubPdu {
    pub lcid: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacPdu {
    pub sub_pdus: Vec<MacSubPdu>,
}

impl MacPdu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a PDU from control elements followed by SDUs, the ordering
    /// the air interface requires.
    pub fn from_ces_and_sdus(ces: Vec<(u8, Vec<u8>)>, sdus: Vec<(u8, Vec<u8>)>) -> Self {
        let sub_pdus = ces
            .into_iter()
            .chain(sdus)
            .map(|(lcid, payload)| MacSubPdu { lcid, payload })
            .collect();
        MacPdu { sub_pdus }
    }
}

pub fn pack_mac_pdu(pdu: &MacPdu) -> Vec<u8> {
    let mut w = BitWriter::with_capacity(pdu.sub_pdus.iter().map(|s| s.payload.len() + 2).sum());
    let n = pdu.sub_pdus.len();
    for (i, sub) in pdu.sub_pdus.iter().enumerate() {
        let has_more = i + 1 < n;
        w.put_bool(false); // R
        w.put_bool(false); // R
        w.put_bool(has_more); // E
        w.put_bits(sub.lcid as u32, 5);
        if has_more {
            let len = sub.payload.len();
            if len <= 127 {
                w.put_bool(false);
                w.put_bits(len as u32, 7);
            } else {
                w.put_bool(true);
                w.put_bits(len as u32, 15);
            }
        }
    }
    let mut bytes = w.into_bytes();
    for sub in &pdu.sub_pdus {
        bytes.extend_from_slice(&sub.payload);
    }
    bytes
}

pub fn unpack_mac_pdu(buf: &[u8]) -> Option<MacPdu> {
    let mut r = BitReader::new(buf);
    let mut headers: Vec<(u8, Option<usize>)> = Vec::new();
    loop {
        let _r0 = r.get_bool()?;
        let _r1 = r.get_bool()?;
        let e = r.get_bool()?;
        let lcid = r.get_bits(5)? as u8;
        if !e {
            headers.push((lcid, None));
            break;
        }
        let f = r.get_bool()?;
        let len = if f { r.get_bits(15)? } else { r.get_bits(7)? } as usize;
        headers.push((lcid, Some(len)));
    }

    let mut body = r.remaining_bytes();
    let mut sub_pdus = Vec::with_capacity(headers.len());
    for (idx, (lcid, len)) in headers.iter().enumerate() {
        let take = match len {
            Some(l) => *l,
            None => {
                debug_assert_eq!(idx, headers.len() - 1);
                body.len()
            }
        };
        if take > body.len() {
            return None;
        }
        let (payload, rest) = body.split_at(take);
        sub_pdus.push(MacSubPdu { lcid: *lcid, payload: payload.to_vec() });
        body = rest;
    }
    Some(MacPdu { sub_pdus })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_subheaders_and_sdus() {
        let pdu = MacPdu::from_ces_and_sdus(
            vec![(26, vec![0xAA, 0xBB])],
            vec![(3, vec![1, 2, 3, 4, 5]), (0, vec![9, 9])],
        );
        let packed = pack_mac_pdu(&pdu);
        let unpacked = unpack_mac_pdu(&packed).unwrap();
        assert_eq!(unpacked, pdu);
    }

    #[test]
    fn long_sdu_uses_15_bit_length() {
        let long_sdu = vec![7u8; 200];
        let pdu = MacPdu::from_ces_and_sdus(vec![], vec![(5, long_sdu.clone()), (5, vec![1])]);
        let packed = pack_mac_pdu(&pdu);
        let unpacked = unpack_mac_pdu(&packed).unwrap();
        assert_eq!(unpacked.sub_pdus[0].payload, long_sdu);
    }
}
