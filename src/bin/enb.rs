//! Composition-root binary: wires a [`NullSdr`]/[`NullCodec`] `Enodeb`
//! together and drives it from a 1ms ticker.
//!
//! A real deployment swaps `NullSdr` for a driver behind [`SdrDevice`] and
//! `NullCodec` for the PHY library behind [`PhyCodec`]; both seams are
//! excluded collaborators (§1), so this binary is intentionally runnable
//! with neither attached.

use std::sync::Arc;

use lte_enb_core::Enodeb;
use lte_enb_core::phy::NullCodec;
use lte_enb_core::radio::NullSdr;

/// Runs until killed; `NullSdr::send` paces each `tick` to the 1ms subframe
/// period the same way a blocking send to a real SDR would.
fn main() {
    env_logger::init();

    let mut enb = Enodeb::new(Arc::new(NullSdr), Arc::new(NullCodec));
    if let Err(err) = enb.start() {
        log::error!("failed to start eNodeB core: {err}");
        return;
    }
    log::info!("eNodeB core started");

    loop {
        enb.tick();
    }
}
