//! Bit-level 3GPP PDU formats: RAR, generic MAC PDU framing, RIV encoding,
//! PRACH opportunity lookup, and MIB/SIB1 packing.

pub mod bits;
pub mod mac_pdu;
pub mod prach;
pub mod rar;
pub mod riv;
pub mod sib;
