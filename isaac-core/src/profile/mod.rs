//! Profile database (§6 "Profile database format"). Doubles as the engine's
//! configuration surface: a built-in table compiled in via `include_str!`,
//! merged on first use per queue with an optional user override file at
//! `$HOME/.isaac/devices/device0.json` (located through `dirs`, mirroring
//! how the pack's other config-bearing examples resolve a user path instead
//! of hand-rolling `$HOME` lookup).

use crate::predictor::Forest;
use crate::schedule::Kind;
use isaac_types::NumericType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const BUILTIN_PROFILES_JSON: &str = include_str!("builtin.json");

/// One operation kind's profile entries for one dtype: the ordered
/// parameter lists the dispatcher turns into template instances, plus an
/// optional predictor over them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DtypeProfiles {
    pub profiles: Vec<Vec<i64>>,
    pub predictor: Option<Forest>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileDatabase {
    /// Operation kind key (`"element_wise_1d"`, `"matrix_product_nn"`, …) to
    /// per-dtype-key (`"float32"`, `"float64"`) profile entries.
    #[serde(flatten)]
    pub kinds: HashMap<String, HashMap<String, DtypeProfiles>>,
}

impl ProfileDatabase {
    /// Parses the compiled-in built-in table, then merges
    /// `$HOME/.isaac/devices/device0.json` on top if present (§5 "Shared
    /// state: Profile database: initialized once on first use per queue").
    pub fn load_default() -> Self {
        let mut db: ProfileDatabase =
            serde_json::from_str(BUILTIN_PROFILES_JSON).expect("builtin profile table is valid JSON");
        if let Some(dir) = dirs::home_dir() {
            let path = dir.join(".isaac").join("devices").join("device0.json");
            if let Ok(text) = std::fs::read_to_string(&path) {
                match serde_json::from_str::<ProfileDatabase>(&text) {
                    Ok(overrides) => {
                        debug!(path = %path.display(), "merging user profile overrides");
                        db.merge(overrides);
                    }
                    Err(err) => warn!(path = %path.display(), %err, "ignoring malformed user profile override file"),
                }
            }
        }
        db
    }

    fn merge(&mut self, other: ProfileDatabase) {
        for (kind, dtypes) in other.kinds {
            let entry = self.kinds.entry(kind).or_default();
            for (dtype, profiles) in dtypes {
                entry.insert(dtype, profiles);
            }
        }
    }

    pub fn entry(&self, kind: Kind, dtype: NumericType) -> Option<&DtypeProfiles> {
        self.kinds.get(kind_key(kind)).and_then(|by_dtype| by_dtype.get(dtype_key(dtype)))
    }
}

pub fn kind_key(kind: Kind) -> &'static str {
    match kind {
        Kind::ElementWise1D => "element_wise_1d",
        Kind::ElementWise2D => "element_wise_2d",
        Kind::Reduce1D => "reduce_1d",
        Kind::Reduce2DRows => "reduce_2d_rows",
        Kind::Reduce2DCols => "reduce_2d_cols",
        Kind::MatrixProductNN => "matrix_product_nn",
        Kind::MatrixProductNT => "matrix_product_nt",
        Kind::MatrixProductTN => "matrix_product_tn",
        Kind::MatrixProductTT => "matrix_product_tt",
    }
}

pub fn dtype_key(dtype: NumericType) -> &'static str {
    match dtype {
        NumericType::Float32 => "float32",
        NumericType::Float64 => "float64",
        other => other.device_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses_and_has_elementwise_entries() {
        let db = ProfileDatabase::load_default();
        let entry = db.entry(Kind::ElementWise1D, NumericType::Float32);
        assert!(entry.is_some());
        assert!(!entry.unwrap().profiles.is_empty());
    }
}
