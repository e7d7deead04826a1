//! RLC/PDCP/RRC/MME: thin message routers.
//!
//! Each layer sits between two MsgBus queues (the layer below, the layer
//! above) and applies the same rule on both sides: a message addressed to
//! this layer is dispatched by kind; anything else is forwarded unchanged
//! to the other queue (`crate::msgbus::route`). Dispatch itself is
//! application-specific and out of scope here except for RLC's TM mode,
//! which the scheduler and tests both depend on.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::sysinfo::SysInfo;
use crate::error::Result;
use crate::msgbus::{BearerRef, Destination, Message, MessageKind};
use crate::users::{RlcMode, UserRegistry};

/// RLC: the one layer with real per-bearer behavior in this core's scope.
/// TM is pass-through (SDU becomes a PDU verbatim and vice versa); UM/AM
/// are placeholders whose segmentation/retransmission contract belongs to
/// a fuller RLC implementation.
pub struct Rlc {
    users: Arc<UserRegistry>,
    sys_info: RwLock<Arc<SysInfo>>,
}

impl Rlc {
    pub fn new(users: Arc<UserRegistry>, sys_info: Arc<SysInfo>) -> Self {
        Rlc { users, sys_info: RwLock::new(sys_info) }
    }

    pub fn update_sys_info(&self, sys_info: Arc<SysInfo>) {
        *self.sys_info.write() = sys_info;
    }

    /// Handles a message already routed to RLC, returning the follow-on
    /// message (if any) to post toward the neighbor it concerns.
    pub fn handle(&self, kind: &MessageKind) -> Result<Option<Message>> {
        match kind {
            MessageKind::RlcSduReady(bearer) => self.handle_sdu_ready(*bearer),
            MessageKind::RlcPduReady(bearer) => self.handle_pdu_ready(*bearer),
            _ => Ok(None),
        }
    }

    fn handle_sdu_ready(&self, bearer: BearerRef) -> Result<Option<Message>> {
        let mode = self.users.find_by_c_rnti(bearer.c_rnti, |u| u.bearer(bearer.rb).map(|rb| rb.mode))??;
        if mode != Some(RlcMode::Tm) {
            return Ok(None); // UM/AM: out of scope
        }
        self.users.find_by_c_rnti_mut(bearer.c_rnti, |u| -> Result<()> {
            let rb = u.bearer_mut(bearer.rb)?;
            if let Some(sdu) = rb.pop_sdu() {
                rb.push_pdu(sdu);
            }
            Ok(())
        })??;
        Ok(Some(Message::new(Destination::Mac, MessageKind::MacSduReady(bearer))))
    }

    fn handle_pdu_ready(&self, bearer: BearerRef) -> Result<Option<Message>> {
        let mode = self.users.find_by_c_rnti(bearer.c_rnti, |u| u.bearer(bearer.rb).map(|rb| rb.mode))??;
        if mode != Some(RlcMode::Tm) {
            return Ok(None);
        }
        self.users.find_by_c_rnti_mut(bearer.c_rnti, |u| -> Result<()> {
            let rb = u.bearer_mut(bearer.rb)?;
            if let Some(pdu) = rb.pop_pdu() {
                rb.push_sdu(pdu);
            }
            Ok(())
        })??;
        Ok(Some(Message::new(Destination::Pdcp, MessageKind::PdcpPduReady(bearer))))
    }
}

/// Generates a trivial thin-router layer: holds its own `sys_info`
/// snapshot and nothing else, since the dispatch logic PDCP/RRC/MME would
/// apply to a handled message is out of this core's scope (§4.7).
macro_rules! thin_router {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            sys_info: RwLock<Arc<SysInfo>>,
        }

        impl $name {
            pub fn new(sys_info: Arc<SysInfo>) -> Self {
                $name { sys_info: RwLock::new(sys_info) }
            }

            pub fn update_sys_info(&self, sys_info: Arc<SysInfo>) {
                *self.sys_info.write() = sys_info;
            }

            /// A message routed to this layer is acknowledged and dropped:
            /// its handler contract is an excluded collaborator's concern.
            pub fn handle(&self, _kind: &MessageKind) -> Option<Message> {
                None
            }
        }
    };
}

thin_router!(
    /// PDCP: header (de)compression and ciphering live here in a full
    /// stack; both are Non-goals of this core.
    Pdcp
);
thin_router!(
    /// RRC: connection/mobility procedures and NAS relay live here; parsing
    /// RRC PDUs is an excluded collaborator's job.
    Rrc
);
thin_router!(
    /// MME: the core only forwards NAS messages to/from it, never parses them.
    Mme
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::RbId;

    fn rlc_with_tm_bearer() -> (Rlc, u16) {
        let users = Arc::new(UserRegistry::new());
        users.add_user("imsi-1").unwrap();
        let c_rnti = users.find_by_imsi("imsi-1", |u| u.c_rnti).unwrap();
        let rlc = Rlc::new(users.clone(), Arc::new(SysInfo::default_for_bandwidth(50)));
        (rlc, c_rnti)
    }

    #[test]
    fn tm_sdu_becomes_a_pdu_and_signals_mac() {
        let (rlc, c_rnti) = rlc_with_tm_bearer();
        rlc.users.find_by_c_rnti_mut(c_rnti, |u| u.bearer_mut(RbId::Srb0).unwrap().push_sdu(vec![1, 2, 3])).unwrap();

        let bearer = BearerRef { c_rnti, rb: RbId::Srb0 };
        let follow_on = rlc.handle(&MessageKind::RlcSduReady(bearer)).unwrap();
        assert!(matches!(follow_on, Some(Message { dest: Destination::Mac, kind: MessageKind::MacSduReady(_) })));

        let pdu = rlc.users.find_by_c_rnti_mut(c_rnti, |u| u.bearer_mut(RbId::Srb0).unwrap().pop_pdu()).unwrap();
        assert_eq!(pdu, Some(vec![1, 2, 3]));
    }

    #[test]
    fn tm_pdu_becomes_an_sdu_and_signals_pdcp() {
        let (rlc, c_rnti) = rlc_with_tm_bearer();
        rlc.users.find_by_c_rnti_mut(c_rnti, |u| u.bearer_mut(RbId::Srb0).unwrap().push_pdu(vec![9])).unwrap();

        let bearer = BearerRef { c_rnti, rb: RbId::Srb0 };
        let follow_on = rlc.handle(&MessageKind::RlcPduReady(bearer)).unwrap();
        assert!(matches!(follow_on, Some(Message { dest: Destination::Pdcp, kind: MessageKind::PdcpPduReady(_) })));
    }

    #[test]
    fn um_bearer_sdu_is_a_noop_placeholder() {
        let users = Arc::new(UserRegistry::new());
        users.add_user("imsi-2").unwrap();
        let c_rnti = users.find_by_imsi("imsi-2", |u| u.c_rnti).unwrap();
        users.find_by_c_rnti_mut(c_rnti, |u| u.setup_drb(0, RlcMode::Um)).unwrap().unwrap();
        let rlc = Rlc::new(users.clone(), Arc::new(SysInfo::default_for_bandwidth(50)));

        let bearer = BearerRef { c_rnti, rb: RbId::Drb(0) };
        let follow_on = rlc.handle(&MessageKind::RlcSduReady(bearer)).unwrap();
        assert!(follow_on.is_none());
    }

    #[test]
    fn thin_routers_acknowledge_without_a_follow_on() {
        let pdcp = Pdcp::new(Arc::new(SysInfo::default_for_bandwidth(50)));
        let bearer = BearerRef { c_rnti: 7, rb: RbId::Srb1 };
        assert!(pdcp.handle(&MessageKind::PdcpSduReady(bearer)).is_none());
    }
}
