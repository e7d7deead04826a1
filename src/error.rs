//! Error taxonomy shared by every layer of the core.
//!
//! Every public operation returns one of these kinds explicitly; nothing
//! unwinds across a layer boundary. Mirrors the kind list of the original
//! `LTE_FDD_ENB_ERROR_ENUM` one-for-one so the control socket's textual
//! replies (`fail "<kind text>"`) stay stable.

use thiserror::Error;

/// The core's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("can't start")]
    CantStart,
    #[error("can't stop")]
    CantStop,
    #[error("already started")]
    AlreadyStarted,
    #[error("already stopped")]
    AlreadyStopped,
    #[error("invalid param")]
    InvalidParam,
    #[error("out of bounds")]
    OutOfBounds,
    #[error("variable not dynamic")]
    VariableNotDynamic,
    #[error("invalid command")]
    InvalidCommand,
    #[error("exception")]
    Exception,
    #[error("master clock fail")]
    MasterClockFail,
    #[error("no free c-rnti")]
    NoFreeCRnti,
    #[error("c-rnti not found")]
    CRntiNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("bad alloc")]
    BadAlloc,
    #[error("can't schedule")]
    CantSchedule,
    #[error("radio bearer already setup")]
    RbAlreadySetup,
    #[error("radio bearer not setup")]
    RbNotSetup,
}

pub type Result<T> = core::result::Result<T, Error>;
