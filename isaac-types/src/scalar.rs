use crate::NumericType;
use serde::{Deserialize, Serialize};

/// A polymorphic immediate value. Holds any of the supported numeric types;
/// conversions between variants always go through `NumericType`, never an
/// untyped reinterpret.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub enum ScalarValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Scalar {
    value: ScalarValue,
}

impl Scalar {
    pub fn new(value: ScalarValue) -> Self {
        Scalar { value }
    }

    pub fn dtype(&self) -> NumericType {
        match self.value {
            ScalarValue::Int8(_) => NumericType::Int8,
            ScalarValue::UInt8(_) => NumericType::UInt8,
            ScalarValue::Int16(_) => NumericType::Int16,
            ScalarValue::UInt16(_) => NumericType::UInt16,
            ScalarValue::Int32(_) => NumericType::Int32,
            ScalarValue::UInt32(_) => NumericType::UInt32,
            ScalarValue::Int64(_) => NumericType::Int64,
            ScalarValue::UInt64(_) => NumericType::UInt64,
            ScalarValue::Float32(_) => NumericType::Float32,
            ScalarValue::Float64(_) => NumericType::Float64,
        }
    }

    pub fn value(&self) -> ScalarValue {
        self.value
    }

    /// Renders the value the way it must appear as a literal in generated
    /// device source (e.g. floating point neutral elements for reductions
    /// reuse this for non-infinite constants).
    pub fn to_device_literal(&self) -> String {
        match self.value {
            ScalarValue::Int8(v) => v.to_string(),
            ScalarValue::UInt8(v) => v.to_string(),
            ScalarValue::Int16(v) => v.to_string(),
            ScalarValue::UInt16(v) => v.to_string(),
            ScalarValue::Int32(v) => v.to_string(),
            ScalarValue::UInt32(v) => v.to_string(),
            ScalarValue::Int64(v) => v.to_string(),
            ScalarValue::UInt64(v) => v.to_string(),
            ScalarValue::Float32(v) => format!("{:e}f", v),
            ScalarValue::Float64(v) => format!("{:e}", v),
        }
    }

    /// Raw little-endian bytes of the value, for binding as a kernel
    /// scalar argument (as opposed to `to_device_literal`'s source text).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self.value {
            ScalarValue::Int8(v) => v.to_le_bytes().to_vec(),
            ScalarValue::UInt8(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Int16(v) => v.to_le_bytes().to_vec(),
            ScalarValue::UInt16(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Int32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::UInt32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Int64(v) => v.to_le_bytes().to_vec(),
            ScalarValue::UInt64(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Float32(v) => v.to_le_bytes().to_vec(),
            ScalarValue::Float64(v) => v.to_le_bytes().to_vec(),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self.value {
            ScalarValue::Int8(v) => v as f64,
            ScalarValue::UInt8(v) => v as f64,
            ScalarValue::Int16(v) => v as f64,
            ScalarValue::UInt16(v) => v as f64,
            ScalarValue::Int32(v) => v as f64,
            ScalarValue::UInt32(v) => v as f64,
            ScalarValue::Int64(v) => v as f64,
            ScalarValue::UInt64(v) => v as f64,
            ScalarValue::Float32(v) => v as f64,
            ScalarValue::Float64(v) => v,
        }
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::new(ScalarValue::Float32(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::new(ScalarValue::Float64(v))
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::new(ScalarValue::Int32(v))
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::new(ScalarValue::Int64(v))
    }
}
