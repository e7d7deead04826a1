//! Control-socket command grammar, without the socket.
//!
//! `LTE_fdd_enb_interface.cc` owns a listening TCP socket that tokenizes
//! each line and dispatches it; that socket is an excluded collaborator
//! (§1). What belongs to the core is the grammar and the translation from
//! an [`crate::error::Error`] to the textual reply a socket loop would
//! write back: [`dispatch`] is a pure function a collaborator's accept
//! loop calls once per line.

use shell_words::split;

use crate::config::{ConfigDb, ParamName, Value};
use crate::error::Error;

/// One parsed control-socket command (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Read(ParamName),
    Write(ParamName, Value),
    Start,
    Stop,
    Shutdown,
    ConstructSi,
    Help,
}

/// The reply a command produces: `ok [text]`, `fail "<error>"`, or a set of
/// `info` lines (one per data row) for a read.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(Option<String>),
    Fail(String),
    Info(Vec<String>),
}

impl Reply {
    /// Renders exactly the wire text a control-socket peer would see.
    pub fn to_line(&self) -> String {
        match self {
            Reply::Ok(None) => "ok".to_string(),
            Reply::Ok(Some(text)) => format!("ok {text}"),
            Reply::Fail(err) => format!("fail \"{err}\""),
            Reply::Info(lines) => lines.iter().map(|l| format!("info {l}")).collect::<Vec<_>>().join("\n"),
        }
    }
}

fn param_name_from_str(s: &str) -> Option<ParamName> {
    ParamName::ALL.iter().find(|p| p.as_str().eq_ignore_ascii_case(s)).copied()
}

/// Parses one newline-delimited command line per §6's grammar:
/// `read <param>`, `write <param> <value>`, `start`, `stop`, `shutdown`,
/// `construct_si`, `help`.
pub fn parse(line: &str) -> Result<Command, Error> {
    let tokens = split(line).map_err(|_| Error::InvalidCommand)?;
    let mut it = tokens.iter();
    match it.next().map(String::as_str) {
        Some("read") => {
            let name = it.next().ok_or(Error::InvalidCommand)?;
            let param = param_name_from_str(name).ok_or(Error::InvalidParam)?;
            Ok(Command::Read(param))
        }
        Some("write") => {
            let name = it.next().ok_or(Error::InvalidCommand)?;
            let param = param_name_from_str(name).ok_or(Error::InvalidParam)?;
            let raw = it.next().ok_or(Error::InvalidCommand)?;
            let value = parse_value(raw)?;
            Ok(Command::Write(param, value))
        }
        Some("start") => Ok(Command::Start),
        Some("stop") => Ok(Command::Stop),
        Some("shutdown") => Ok(Command::Shutdown),
        Some("construct_si") => Ok(Command::ConstructSi),
        Some("help") => Ok(Command::Help),
        _ => Err(Error::InvalidCommand),
    }
}

/// A value's textual form is whatever its `ParamName`'s bounds kind expects;
/// the socket grammar itself is untyped, so this accepts either an integer
/// or a float literal and lets `ConfigDb::set`'s bounds check reject a
/// mismatch.
fn parse_value(raw: &str) -> Result<Value, Error> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::Int64(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Ok(Value::Double(f));
    }
    Err(Error::InvalidCommand)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Int64(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Uint32(v) => v.to_string(),
        Value::PackedDigitString(digits) => digits.iter().map(|d| format!("{d:x}")).collect(),
    }
}

/// Runs one already-parsed command against a live `ConfigDb`, producing
/// exactly the reply a control-socket peer would receive. `start`/`stop`
/// only flip the bookkeeping flag here — actually starting the radio
/// thread and receive tasks is `Enodeb::start`'s job; a collaborator socket
/// loop wires this function to an `Enodeb` the way the original's
/// interface wires it to the singletons.
pub fn dispatch(config: &ConfigDb, started: &mut bool, cmd: Command) -> Reply {
    match cmd {
        Command::Read(param) => match config.get(param) {
            Ok(value) => Reply::Info(vec![format!("{} {}", param.as_str(), value_to_text(&value))]),
            Err(err) => Reply::Fail(err.to_string()),
        },
        Command::Write(param, value) => match config.set(param, value) {
            Ok(()) => Reply::Ok(None),
            Err(err) => Reply::Fail(err.to_string()),
        },
        Command::Start => {
            if *started {
                Reply::Fail(Error::AlreadyStarted.to_string())
            } else {
                *started = true;
                config.mark_started();
                Reply::Ok(None)
            }
        }
        Command::Stop => {
            if !*started {
                Reply::Fail(Error::AlreadyStopped.to_string())
            } else {
                *started = false;
                config.mark_stopped();
                Reply::Ok(None)
            }
        }
        Command::Shutdown => Reply::Ok(Some("shutting down".to_string())),
        Command::ConstructSi => match config.construct_sys_info() {
            Ok(_) => Reply::Ok(None),
            Err(err) => Reply::Fail(err.to_string()),
        },
        Command::Help => Reply::Info(
            ["read <param>", "write <param> <value>", "start", "stop", "shutdown", "construct_si", "help"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_and_write() {
        assert_eq!(parse("read Bandwidth").unwrap(), Command::Read(ParamName::Bandwidth));
        assert_eq!(parse("write Bandwidth 20").unwrap(), Command::Write(ParamName::Bandwidth, Value::Int64(20)));
    }

    #[test]
    fn unknown_verb_is_invalid_command() {
        assert_eq!(parse("frobnicate").unwrap_err(), Error::InvalidCommand);
    }

    #[test]
    fn unknown_param_is_invalid_param() {
        assert_eq!(parse("read not_a_real_param").unwrap_err(), Error::InvalidParam);
    }

    #[test]
    fn successful_write_translates_to_ok() {
        let config = ConfigDb::new(None);
        let mut started = false;
        let reply = dispatch(&config, &mut started, Command::Write(ParamName::Bandwidth, Value::Double(20.0)));
        assert_eq!(reply, Reply::Ok(None));
        assert_eq!(reply.to_line(), "ok");
    }

    #[test]
    fn failure_translates_to_fail_with_error_text() {
        let config = ConfigDb::new(None);
        let mut started = false;
        let reply = dispatch(&config, &mut started, Command::Write(ParamName::Bandwidth, Value::Double(7.0)));
        assert!(matches!(reply, Reply::Fail(_)));
        assert!(reply.to_line().starts_with("fail \""));
    }

    #[test]
    fn double_start_fails() {
        let config = ConfigDb::new(None);
        let mut started = false;
        assert_eq!(dispatch(&config, &mut started, Command::Start), Reply::Ok(None));
        assert!(matches!(dispatch(&config, &mut started, Command::Start), Reply::Fail(_)));
    }

    #[test]
    fn read_reports_an_info_line() {
        let config = ConfigDb::new(None);
        let mut started = false;
        let reply = dispatch(&config, &mut started, Command::Read(ParamName::NAnt));
        match reply {
            Reply::Info(lines) => assert_eq!(lines, vec!["NAnt 1".to_string()]),
            _ => panic!("expected Info"),
        }
    }
}
