//! JSON sink for the report.
//!
//! Numbers are kept at full precision in memory and rounded only here, by
//! the wrapper type they are stored in:
//!
//! | type | class | decimals |
//! |---|---|---|
//! | [`Pct`] | percentage | 2 |
//! | [`Money`] | currency | 2 |
//! | [`Prob`] | probability | 3 |
//! | [`Ratio`] | ratio | 3 |
//!
//! NaN is written as `null`, positive and negative infinity as the strings
//! `"+inf"` and `"-inf"`.

use std::fs;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::report::Report;

pub const POS_INF: &str = "+inf";
pub const NEG_INF: &str = "-inf";

macro_rules! rounded {
    ($(#[$doc:meta])* $name:ident, $decimals:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
        pub struct $name(pub f64);

        impl $name {
            pub const DECIMALS: i32 = $decimals;

            pub fn value(self) -> f64 {
                self.0
            }
        }

        impl From<f64> for $name {
            fn from(v: f64) -> Self {
                Self(v)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serialize_rounded(self.0, Self::DECIMALS, serializer)
            }
        }
    };
}

rounded!(
    /// Percentage points.
    Pct,
    2
);
rounded!(Money, 2);
rounded!(Prob, 3);
rounded!(Ratio, 3);

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let r = (v * factor).round() / factor;
    // Avoid emitting `-0.0`.
    if r == 0.0 { 0.0 } else { r }
}

fn serialize_rounded<S: Serializer>(
    v: f64,
    decimals: i32,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if v.is_nan() {
        serializer.serialize_none()
    } else if v == f64::INFINITY {
        serializer.serialize_str(POS_INF)
    } else if v == f64::NEG_INFINITY {
        serializer.serialize_str(NEG_INF)
    } else {
        serializer.serialize_f64(round_to(v, decimals))
    }
}

pub fn to_value(report: &Report) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(report)?)
}

pub fn to_json_string(report: &Report, pretty: bool) -> Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(out)
}

pub fn write_report(report: &Report, path: &Path, pretty: bool) -> Result<()> {
    let mut body = to_json_string(report, pretty)?;
    body.push('\n');
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}
