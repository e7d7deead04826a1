//! MsgBus: the named, bounded, typed queues between adjacent layer pairs.
//!
//! Each queue is a two-hop relay, not a broadcast bus: a message posted
//! anywhere carries its intended [`Destination`], and every layer that sees
//! it either handles it (destination is itself or `Any`) or forwards it
//! unchanged onto the queue that leads further toward that destination.

use crossbeam_channel::{Receiver, RecvError, SendError, Sender};

/// Bound applied to every named queue (generous against the 1ms cadence; a
/// full queue blocks the sender, matching the backpressure point of a
/// bounded mpsc channel).
pub const QUEUE_BOUND: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Phy,
    Mac,
    Rlc,
    Pdcp,
    Rrc,
    Mme,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyToSend {
    pub dl_current_tti: u32,
    pub ul_current_tti: u32,
}

#[derive(Debug, Clone)]
pub struct PrachDecode {
    pub current_tti: u32,
    pub preambles: Vec<u32>,
    pub timing_adv: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchDecode {
    pub current_tti: u32,
}

#[derive(Debug, Clone)]
pub struct PuschDecode {
    pub current_tti: u32,
    pub rnti: u16,
    pub msg: Vec<u8>,
}

/// A (user, radio bearer) reference carried by the RLC/PDCP/RRC/MME
/// routing messages. Identity-only: the thin layers resolve it against
/// `UserRegistry` themselves rather than the bus owning user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerRef {
    pub c_rnti: u16,
    pub rb: crate::users::RbId,
}

#[derive(Debug, Clone)]
pub enum MessageKind {
    Kill,
    DlSchedule(crate::mac::DlScheduleMsg),
    UlSchedule(crate::mac::UlScheduleMsg),
    ReadyToSend(ReadyToSend),
    PrachDecode(PrachDecode),
    PucchDecode(PucchDecode),
    PuschDecode(PuschDecode),
    MacSduReady(BearerRef),
    RlcPduReady(BearerRef),
    RlcSduReady(BearerRef),
    PdcpPduReady(BearerRef),
    PdcpSduReady(BearerRef),
    RrcPduReady(BearerRef),
    RrcNasMsgReady(BearerRef),
    MmeNasMsgReady(BearerRef),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub dest: Destination,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(dest: Destination, kind: MessageKind) -> Self {
        Message { dest, kind }
    }
}

/// Outcome of applying the routing rule for a layer that received a message
/// off one of its queues.
pub enum Routed {
    /// `dest == this layer || dest == Any`: handle it locally.
    Handle(Message),
    /// Any other destination: forward unchanged on the other-side queue.
    Forward(Message),
    /// A `Kill` message: the receiving task should exit.
    Shutdown,
}

/// Applies the routing rule of §4.3: local layers handle messages addressed
/// to themselves or to `Any`; anything else is forwarded unchanged.
pub fn route(this_layer: Destination, msg: Message) -> Routed {
    if matches!(msg.kind, MessageKind::Kill) {
        return Routed::Shutdown;
    }
    if msg.dest == this_layer || msg.dest == Destination::Any {
        Routed::Handle(msg)
    } else {
        Routed::Forward(msg)
    }
}

struct Queue {
    tx: Sender<Message>,
    rx: Option<Receiver<Message>>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(QUEUE_BOUND);
        Queue { tx, rx: Some(rx) }
    }
}

/// Owns the five named queues of the fabric: `phy_mac`, `mac_rlc`,
/// `rlc_pdcp`, `pdcp_rrc`, `rrc_mme`. Each queue's receiver may be taken
/// exactly once, by the layer that owns the corresponding receive task;
/// its sender may be cloned freely by any layer that needs to post or
/// forward onto it.
pub struct MsgBus {
    phy_mac: Queue,
    mac_rlc: Queue,
    rlc_pdcp: Queue,
    pdcp_rrc: Queue,
    rrc_mme: Queue,
}

impl Default for MsgBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MsgBus {
    pub fn new() -> Self {
        MsgBus {
            phy_mac: Queue::new(),
            mac_rlc: Queue::new(),
            rlc_pdcp: Queue::new(),
            pdcp_rrc: Queue::new(),
            rrc_mme: Queue::new(),
        }
    }

    pub fn phy_mac_sender(&self) -> Sender<Message> {
        self.phy_mac.tx.clone()
    }
    pub fn mac_rlc_sender(&self) -> Sender<Message> {
        self.mac_rlc.tx.clone()
    }
    pub fn rlc_pdcp_sender(&self) -> Sender<Message> {
        self.rlc_pdcp.tx.clone()
    }
    pub fn pdcp_rrc_sender(&self) -> Sender<Message> {
        self.pdcp_rrc.tx.clone()
    }
    pub fn rrc_mme_sender(&self) -> Sender<Message> {
        self.rrc_mme.tx.clone()
    }

    pub fn take_phy_mac_receiver(&mut self) -> Option<Receiver<Message>> {
        self.phy_mac.rx.take()
    }
    pub fn take_mac_rlc_receiver(&mut self) -> Option<Receiver<Message>> {
        self.mac_rlc.rx.take()
    }
    pub fn take_rlc_pdcp_receiver(&mut self) -> Option<Receiver<Message>> {
        self.rlc_pdcp.rx.take()
    }
    pub fn take_pdcp_rrc_receiver(&mut self) -> Option<Receiver<Message>> {
        self.pdcp_rrc.rx.take()
    }
    pub fn take_rrc_mme_receiver(&mut self) -> Option<Receiver<Message>> {
        self.rrc_mme.rx.take()
    }

    /// Sends a `Kill` message to every queue that still has a clonable
    /// sender, so every receive task observes shutdown. No silent drops:
    /// a full queue blocks here exactly as any other send would.
    pub fn shutdown(&self) -> Result<(), SendError<Message>> {
        for tx in [
            &self.phy_mac.tx,
            &self.mac_rlc.tx,
            &self.rlc_pdcp.tx,
            &self.pdcp_rrc.tx,
            &self.rrc_mme.tx,
        ] {
            tx.send(Message::new(Destination::Any, MessageKind::Kill))?;
        }
        Ok(())
    }
}

/// Blocks until a message arrives or the queue is disconnected (all senders
/// dropped), returning `Ok(None)` on disconnect so a receive loop can exit
/// cleanly without mistaking it for a protocol-level `Kill`.
pub fn recv_or_closed(rx: &Receiver<Message>) -> Result<Option<Message>, RecvError> {
    match rx.recv() {
        Ok(msg) => Ok(Some(msg)),
        Err(RecvError) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_addressed_to_this_layer_is_handled() {
        let msg = Message::new(Destination::Mac, MessageKind::PucchDecode(PucchDecode { current_tti: 5 }));
        match route(Destination::Mac, msg) {
            Routed::Handle(_) => {}
            _ => panic!("expected Handle"),
        }
    }

    #[test]
    fn message_addressed_elsewhere_is_forwarded() {
        let msg = Message::new(Destination::Rrc, MessageKind::PucchDecode(PucchDecode { current_tti: 5 }));
        match route(Destination::Mac, msg) {
            Routed::Forward(_) => {}
            _ => panic!("expected Forward"),
        }
    }

    #[test]
    fn any_destination_is_always_handled_locally() {
        let msg = Message::new(Destination::Any, MessageKind::PucchDecode(PucchDecode { current_tti: 5 }));
        match route(Destination::Rlc, msg) {
            Routed::Handle(_) => {}
            _ => panic!("expected Handle"),
        }
    }

    #[test]
    fn kill_always_triggers_shutdown_regardless_of_destination() {
        let msg = Message::new(Destination::Phy, MessageKind::Kill);
        match route(Destination::Mme, msg) {
            Routed::Shutdown => {}
            _ => panic!("expected Shutdown"),
        }
    }

    #[test]
    fn queue_receiver_can_only_be_taken_once() {
        let mut bus = MsgBus::new();
        assert!(bus.take_phy_mac_receiver().is_some());
        assert!(bus.take_phy_mac_receiver().is_none());
    }

    #[test]
    fn sent_message_is_observed_on_the_named_queue() {
        let mut bus = MsgBus::new();
        let rx = bus.take_mac_rlc_receiver().unwrap();
        bus.mac_rlc_sender()
            .send(Message::new(Destination::Rlc, MessageKind::RlcPduReady(BearerRef { c_rnti: 7, rb: crate::users::RbId::Srb0 })))
            .unwrap();
        let received = rx.recv().unwrap();
        assert_eq!(received.dest, Destination::Rlc);
    }
}
