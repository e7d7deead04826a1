//! Parameter names, value types, and bounds.
//!
//! Every setting the control socket can `read`/`write` is one variant of
//! [`ParamName`]; [`Value`] is the small discriminated union of shapes a
//! parameter can take. Bounds are looked up by [`bounds_of`].

use smallvec::SmallVec;

/// A parameter value. `PackedDigitString` holds 4-bit BCD digits terminated
/// by `0xF` (MCC/MNC encoding, 36.331 `PLMN-Identity`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int64(i64),
    Double(f64),
    Uint32(u32),
    PackedDigitString(SmallVec<[u8; 4]>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Uint32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Uint32(v) => Some(*v),
            Value::Int64(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }
}

macro_rules! param_names {
    ($($variant:ident),+ $(,)?) => {
        /// The fixed enumeration of parameter names the core knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ParamName {
            $($variant),+
        }

        impl ParamName {
            pub const ALL: &'static [ParamName] = &[$(ParamName::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ParamName::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

param_names! {
    Bandwidth,
    DlEarfcn,
    UlEarfcn,
    FreqBand,
    NAnt,
    NIdCell,
    /// Derived from `NIdCell`; read-only (see `ConfigDb::set`).
    NId1,
    /// Derived from `NIdCell`; read-only (see `ConfigDb::set`).
    NId2,
    Mcc,
    Mnc,
    CellId,
    Tac,
    QRxLevMin,
    P0NominalPusch,
    P0NominalPucch,
    Sib3Present,
    Sib4Present,
    Sib5Present,
    Sib6Present,
    Sib7Present,
    Sib8Present,
    QHyst,
    SearchWinSize,
    RaResponseWindowSize,
    DebugType,
    DebugLevel,
    EnablePcap,
    RadioIdx,
    TxGain,
    RxGain,
}

/// Bound/enumeration and mutability metadata for one parameter.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    /// Whether the value may change while the eNodeB is running.
    pub dynamic: bool,
    /// Whether changing it couples to other parameters (documented at the
    /// call site in `ConfigDb::set`, not re-derived here).
    pub special_bounds: bool,
    pub kind: BoundsKind,
}

#[derive(Debug, Clone, Copy)]
pub enum BoundsKind {
    IntRange(i64, i64),
    DoubleSet(&'static [f64]),
    BoolFlag,
}

pub fn bounds_of(name: ParamName) -> Bounds {
    use BoundsKind::*;
    use ParamName::*;
    match name {
        Bandwidth => Bounds { dynamic: false, special_bounds: true, kind: DoubleSet(&[1.4, 3.0, 5.0, 10.0, 15.0, 20.0]) },
        DlEarfcn => Bounds { dynamic: true, special_bounds: true, kind: IntRange(0, 65_535) },
        UlEarfcn => Bounds { dynamic: false, special_bounds: false, kind: IntRange(0, 65_535) },
        FreqBand => Bounds { dynamic: false, special_bounds: true, kind: IntRange(1, 28) },
        NAnt => Bounds { dynamic: false, special_bounds: false, kind: IntRange(1, 4) },
        NIdCell => Bounds { dynamic: false, special_bounds: true, kind: IntRange(0, 503) },
        NId1 => Bounds { dynamic: false, special_bounds: false, kind: IntRange(0, 167) },
        NId2 => Bounds { dynamic: false, special_bounds: false, kind: IntRange(0, 2) },
        Mcc => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 999) },
        Mnc => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 999) },
        CellId => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 0xFFFF_FFF) },
        Tac => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 0xFFFF) },
        QRxLevMin => Bounds { dynamic: true, special_bounds: false, kind: IntRange(-70, -22) },
        P0NominalPusch => Bounds { dynamic: true, special_bounds: false, kind: IntRange(-126, 24) },
        P0NominalPucch => Bounds { dynamic: true, special_bounds: false, kind: IntRange(-127, -96) },
        Sib3Present | Sib4Present | Sib5Present | Sib6Present | Sib7Present | Sib8Present => {
            Bounds { dynamic: true, special_bounds: false, kind: BoolFlag }
        }
        QHyst => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 24) },
        SearchWinSize => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 7) },
        RaResponseWindowSize => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 7) },
        DebugType => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 0x7FFF_FFFF) },
        DebugLevel => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 4) },
        EnablePcap => Bounds { dynamic: true, special_bounds: false, kind: BoolFlag },
        RadioIdx => Bounds { dynamic: false, special_bounds: false, kind: IntRange(0, 15) },
        TxGain => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 100) },
        RxGain => Bounds { dynamic: true, special_bounds: false, kind: IntRange(0, 100) },
    }
}

/// RA response window size index -> subframe count (36.331 `ra-ResponseWindowSize`).
pub const RA_RESPONSE_WINDOW_SIZE_NUM: [u32; 8] = [2, 3, 4, 5, 6, 7, 8, 10];

/// Bandwidth (MHz) -> (N_rb, DL_Bandwidth enum ordinal), verbatim from
/// `LTE_fdd_enb_cnfg_db.cc`.
pub fn n_rb_for_bandwidth(bw: f64) -> Option<u32> {
    // Matched with a tolerance since Bandwidth is stored as f64.
    let table = [(1.4, 6u32), (3.0, 15), (5.0, 25), (10.0, 50), (15.0, 75), (20.0, 100)];
    table.iter().find(|(b, _)| (b - bw).abs() < 1e-6).map(|(_, n)| *n)
}
