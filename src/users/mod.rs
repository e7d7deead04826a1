//! UserRegistry: `User` records keyed by IMSI and by C-RNTI, C-RNTI
//! allocation, and the radio bearers each user owns.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::tti::Tti;

/// C-RNTI allocation range, verbatim from `liblte_mac.h`'s
/// `LIBLTE_MAC_C_RNTI_START`/`LIBLTE_MAC_C_RNTI_END` (`0x003D`/`0xFFF3`).
pub const C_RNTI_START: u16 = 0x003D;
pub const C_RNTI_END: u16 = 0xFFF3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RbId {
    Srb0,
    Srb1,
    Srb2,
    Drb(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlcMode {
    Tm,
    Um,
    Am,
}

/// One radio bearer: identity, RLC mode, and the two FIFOs that sit between
/// this bearer and its neighboring layers.
#[derive(Debug, Default)]
pub struct RadioBearer {
    pub mode: Option<RlcMode>,
    pending_pdus: VecDeque<Vec<u8>>,
    pending_sdus: VecDeque<Vec<u8>>,
}

impl RadioBearer {
    fn new(mode: RlcMode) -> Self {
        RadioBearer { mode: Some(mode), pending_pdus: VecDeque::new(), pending_sdus: VecDeque::new() }
    }

    pub fn push_pdu(&mut self, pdu: Vec<u8>) {
        self.pending_pdus.push_back(pdu);
    }

    pub fn pop_pdu(&mut self) -> Option<Vec<u8>> {
        self.pending_pdus.pop_front()
    }

    pub fn push_sdu(&mut self, sdu: Vec<u8>) {
        self.pending_sdus.push_back(sdu);
    }

    pub fn pop_sdu(&mut self) -> Option<Vec<u8>> {
        self.pending_sdus.pop_front()
    }
}

pub const N_DRB: usize = 8;

/// (IMSI, C-RNTI, SRB0, optional SRB1/2, up to 8 optional DRBs, a
/// pre-allocated uplink MAC PDU scratch buffer).
pub struct User {
    pub imsi: String,
    pub c_rnti: u16,
    pub srb0: RadioBearer,
    pub srb1: Option<RadioBearer>,
    pub srb2: Option<RadioBearer>,
    pub drbs: [Option<RadioBearer>; N_DRB],
    pub ul_mac_pdu_scratch: Vec<u8>,
}

impl User {
    fn new(imsi: String, c_rnti: u16) -> Self {
        User {
            imsi,
            c_rnti,
            srb0: RadioBearer::new(RlcMode::Tm),
            srb1: None,
            srb2: None,
            drbs: Default::default(),
            ul_mac_pdu_scratch: Vec::with_capacity(1024),
        }
    }

    /// Tears down SRB1/2 and all DRBs but preserves SRB0; resets this
    /// user's RRC procedure/state to Idle by dropping any bearer-local
    /// procedure state (none kept beyond the bearer set itself here, since
    /// RRC procedure/state lives in the RRC layer, not on `User`).
    pub fn init(&mut self) {
        self.srb1 = None;
        self.srb2 = None;
        self.drbs = Default::default();
    }

    pub fn setup_srb1(&mut self, mode: RlcMode) -> Result<()> {
        if self.srb1.is_some() {
            return Err(Error::RbAlreadySetup);
        }
        self.srb1 = Some(RadioBearer::new(mode));
        Ok(())
    }

    pub fn setup_srb2(&mut self, mode: RlcMode) -> Result<()> {
        if self.srb2.is_some() {
            return Err(Error::RbAlreadySetup);
        }
        self.srb2 = Some(RadioBearer::new(mode));
        Ok(())
    }

    pub fn setup_drb(&mut self, idx: u8, mode: RlcMode) -> Result<()> {
        let slot = self.drbs.get_mut(idx as usize).ok_or(Error::InvalidParam)?;
        if slot.is_some() {
            return Err(Error::RbAlreadySetup);
        }
        *slot = Some(RadioBearer::new(mode));
        Ok(())
    }

    pub fn bearer(&self, id: RbId) -> Result<&RadioBearer> {
        match id {
            RbId::Srb0 => Ok(&self.srb0),
            RbId::Srb1 => self.srb1.as_ref().ok_or(Error::RbNotSetup),
            RbId::Srb2 => self.srb2.as_ref().ok_or(Error::RbNotSetup),
            RbId::Drb(idx) => self.drbs.get(idx as usize).and_then(Option::as_ref).ok_or(Error::RbNotSetup),
        }
    }

    pub fn bearer_mut(&mut self, id: RbId) -> Result<&mut RadioBearer> {
        match id {
            RbId::Srb0 => Ok(&mut self.srb0),
            RbId::Srb1 => self.srb1.as_mut().ok_or(Error::RbNotSetup),
            RbId::Srb2 => self.srb2.as_mut().ok_or(Error::RbNotSetup),
            RbId::Drb(idx) => self.drbs.get_mut(idx as usize).and_then(Option::as_mut).ok_or(Error::RbNotSetup),
        }
    }
}

struct CRntiTable {
    occupied: HashSet<u16>,
    next: u16,
}

impl CRntiTable {
    fn new() -> Self {
        CRntiTable { occupied: HashSet::new(), next: C_RNTI_START }
    }

    /// Round-robins through `[C_RNTI_START, C_RNTI_END]` from a persistent
    /// cursor, returning the first slot confirmed vacant by an explicit
    /// occupancy check (unlike the original, which scans with an
    /// uninitialized-then-off-by-one iterator and can hand back a RNTI one
    /// past the one it actually confirmed free).
    fn allocate(&mut self) -> Result<u16> {
        let start = self.next;
        loop {
            let candidate = self.next;
            self.next = if self.next >= C_RNTI_END { C_RNTI_START } else { self.next + 1 };
            if !self.occupied.contains(&candidate) {
                self.occupied.insert(candidate);
                return Ok(candidate);
            }
            if self.next == start {
                return Err(Error::NoFreeCRnti);
            }
        }
    }

    fn assign(&mut self, c_rnti: u16) {
        self.occupied.insert(c_rnti);
    }

    fn free(&mut self, c_rnti: u16) -> Result<()> {
        if self.occupied.remove(&c_rnti) { Ok(()) } else { Err(Error::CRntiNotFound) }
    }
}

/// Owns every `User`, indexed by IMSI and by C-RNTI, plus the C-RNTI
/// allocation cursor. The IMSI map and the C-RNTI map are guarded by
/// separate locks, always acquired IMSI-then-C-RNTI, never the reverse.
pub struct UserRegistry {
    users_by_imsi: Mutex<HashMap<String, User>>,
    c_rnti_index: Mutex<HashMap<u16, String>>,
    c_rnti_table: Mutex<CRntiTable>,
    placeholder_since: Mutex<HashMap<u16, Tti>>,
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRegistry {
    pub fn new() -> Self {
        UserRegistry {
            users_by_imsi: Mutex::new(HashMap::new()),
            c_rnti_index: Mutex::new(HashMap::new()),
            c_rnti_table: Mutex::new(CRntiTable::new()),
            placeholder_since: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_free_c_rnti(&self) -> Result<u16> {
        self.c_rnti_table.lock().allocate()
    }

    /// Installs a C-RNTI -> IMSI mapping. Idempotent overwrite by design;
    /// callers that must not clobber an existing mapping check `find_by_c_rnti`
    /// first.
    pub fn assign(&self, c_rnti: u16, imsi: &str) {
        self.c_rnti_table.lock().assign(c_rnti);
        self.c_rnti_index.lock().insert(c_rnti, imsi.to_string());
    }

    pub fn free(&self, c_rnti: u16) -> Result<()> {
        self.c_rnti_table.lock().free(c_rnti)?;
        self.c_rnti_index.lock().remove(&c_rnti);
        Ok(())
    }

    pub fn add_user(&self, imsi: &str) -> Result<()> {
        let mut users = self.users_by_imsi.lock();
        if users.contains_key(imsi) {
            return Err(Error::AlreadyExists);
        }
        let c_rnti = self.get_free_c_rnti()?;
        users.insert(imsi.to_string(), User::new(imsi.to_string(), c_rnti));
        drop(users);
        self.assign(c_rnti, imsi);
        Ok(())
    }

    /// Synthesizes a placeholder user `"F" + decimal(c_rnti)` and assigns it
    /// the given C-RNTI atomically (used for a UE observed on PRACH before
    /// RRC has supplied a real IMSI). Records `created_at` so
    /// [`UserRegistry::reap_expired_placeholders`] can garbage-collect it if
    /// contention resolution never completes.
    pub fn add_placeholder_user(&self, c_rnti: u16, created_at: Tti) -> Result<String> {
        let imsi = format!("F{c_rnti}");
        let mut users = self.users_by_imsi.lock();
        if users.contains_key(&imsi) {
            return Err(Error::AlreadyExists);
        }
        users.insert(imsi.clone(), User::new(imsi.clone(), c_rnti));
        drop(users);
        self.assign(c_rnti, &imsi);
        self.placeholder_since.lock().insert(c_rnti, created_at);
        Ok(imsi)
    }

    /// Promotes a placeholder user to a real one once RRC supplies its IMSI:
    /// drops the placeholder bookkeeping so it is no longer a reap
    /// candidate. Callers that instead want to keep the placeholder's C-RNTI
    /// under a new IMSI should delete the placeholder and call
    /// [`UserRegistry::assign`] themselves; this just clears the timer.
    pub fn clear_placeholder_timer(&self, c_rnti: u16) {
        self.placeholder_since.lock().remove(&c_rnti);
    }

    /// Deletes every placeholder user still waiting on contention
    /// resolution past `timeout_ttis` TTIs, freeing its C-RNTI. Returns the
    /// reclaimed C-RNTIs for logging.
    pub fn reap_expired_placeholders(&self, current_tti: Tti, timeout_ttis: u32) -> Vec<u16> {
        let expired: Vec<u16> = {
            let since = self.placeholder_since.lock();
            since
                .iter()
                .filter(|(_, &created_at)| {
                    let age = (current_tti + crate::tti::FN_COMBO_MODULUS - created_at) % crate::tti::FN_COMBO_MODULUS;
                    age >= timeout_ttis
                })
                .map(|(&c_rnti, _)| c_rnti)
                .collect()
        };
        for c_rnti in &expired {
            self.placeholder_since.lock().remove(c_rnti);
            let _ = self.delete_by_c_rnti(*c_rnti);
        }
        expired
    }

    pub fn find_by_imsi<R>(&self, imsi: &str, f: impl FnOnce(&User) -> R) -> Result<R> {
        let users = self.users_by_imsi.lock();
        users.get(imsi).map(f).ok_or(Error::UserNotFound)
    }

    pub fn find_by_imsi_mut<R>(&self, imsi: &str, f: impl FnOnce(&mut User) -> R) -> Result<R> {
        let mut users = self.users_by_imsi.lock();
        users.get_mut(imsi).map(f).ok_or(Error::UserNotFound)
    }

    pub fn find_by_c_rnti<R>(&self, c_rnti: u16, f: impl FnOnce(&User) -> R) -> Result<R> {
        let imsi = self.c_rnti_index.lock().get(&c_rnti).cloned().ok_or(Error::UserNotFound)?;
        self.find_by_imsi(&imsi, f)
    }

    pub fn find_by_c_rnti_mut<R>(&self, c_rnti: u16, f: impl FnOnce(&mut User) -> R) -> Result<R> {
        let imsi = self.c_rnti_index.lock().get(&c_rnti).cloned().ok_or(Error::UserNotFound)?;
        self.find_by_imsi_mut(&imsi, f)
    }

    pub fn delete_by_imsi(&self, imsi: &str) -> Result<()> {
        let mut users = self.users_by_imsi.lock();
        let user = users.remove(imsi).ok_or(Error::UserNotFound)?;
        drop(users);
        let _ = self.free(user.c_rnti);
        Ok(())
    }

    pub fn delete_by_c_rnti(&self, c_rnti: u16) -> Result<()> {
        let imsi = self.c_rnti_index.lock().get(&c_rnti).cloned().ok_or(Error::UserNotFound)?;
        self.delete_by_imsi(&imsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_round_robins_and_skips_occupied() {
        let reg = UserRegistry::new();
        let a = reg.get_free_c_rnti().unwrap();
        let b = reg.get_free_c_rnti().unwrap();
        assert_ne!(a, b);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn exhausted_range_reports_no_free_c_rnti() {
        let mut table = CRntiTable { occupied: HashSet::new(), next: C_RNTI_START };
        for rnti in C_RNTI_START..=C_RNTI_END {
            table.occupied.insert(rnti);
        }
        assert_eq!(table.allocate().unwrap_err(), Error::NoFreeCRnti);
    }

    #[test]
    fn add_user_then_find_by_both_keys() {
        let reg = UserRegistry::new();
        reg.add_user("001010123456789").unwrap();
        let c_rnti = reg.find_by_imsi("001010123456789", |u| u.c_rnti).unwrap();
        let imsi = reg.find_by_c_rnti(c_rnti, |u| u.imsi.clone()).unwrap();
        assert_eq!(imsi, "001010123456789");
    }

    #[test]
    fn duplicate_imsi_rejected() {
        let reg = UserRegistry::new();
        reg.add_user("imsi-a").unwrap();
        assert_eq!(reg.add_user("imsi-a").unwrap_err(), Error::AlreadyExists);
    }

    #[test]
    fn delete_removes_both_the_user_and_its_c_rnti() {
        let reg = UserRegistry::new();
        reg.add_user("imsi-a").unwrap();
        let c_rnti = reg.find_by_imsi("imsi-a", |u| u.c_rnti).unwrap();
        reg.delete_by_imsi("imsi-a").unwrap();
        assert_eq!(reg.find_by_c_rnti(c_rnti, |u| u.c_rnti).unwrap_err(), Error::UserNotFound);
        assert!(reg.get_free_c_rnti().is_ok());
    }

    #[test]
    fn placeholder_user_synthesizes_f_prefixed_imsi() {
        let reg = UserRegistry::new();
        let imsi = reg.add_placeholder_user(42, 0).unwrap();
        assert_eq!(imsi, "F42");
        assert_eq!(reg.find_by_c_rnti(42, |u| u.imsi.clone()).unwrap(), "F42");
    }

    #[test]
    fn placeholder_past_timeout_is_reaped() {
        let reg = UserRegistry::new();
        reg.add_placeholder_user(7, 0).unwrap();
        assert!(reg.reap_expired_placeholders(10, 64).is_empty());
        let reaped = reg.reap_expired_placeholders(64, 64);
        assert_eq!(reaped, vec![7]);
        assert_eq!(reg.find_by_c_rnti(7, |u| u.c_rnti).unwrap_err(), Error::UserNotFound);
    }

    #[test]
    fn init_preserves_srb0_but_clears_srb1_srb2_and_drbs() {
        let mut user = User::new("imsi".into(), 1);
        user.setup_srb1(RlcMode::Am).unwrap();
        user.setup_drb(0, RlcMode::Um).unwrap();
        user.init();
        assert!(user.srb1.is_none());
        assert!(user.drbs[0].is_none());
        assert!(user.bearer(RbId::Srb0).is_ok());
    }

    #[test]
    fn double_setup_of_same_bearer_is_rejected() {
        let mut user = User::new("imsi".into(), 1);
        user.setup_srb1(RlcMode::Am).unwrap();
        assert_eq!(user.setup_srb1(RlcMode::Am).unwrap_err(), Error::RbAlreadySetup);
    }
}
