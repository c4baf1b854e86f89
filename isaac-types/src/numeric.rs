use serde::{Deserialize, Serialize};

/// The closed set of element types the engine can generate kernels for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericType {
    Invalid,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl NumericType {
    /// Size in bytes of one element of this type.
    pub const fn size_of(self) -> usize {
        match self {
            NumericType::Invalid => 0,
            NumericType::Int8 | NumericType::UInt8 => 1,
            NumericType::Int16 | NumericType::UInt16 => 2,
            NumericType::Int32 | NumericType::UInt32 | NumericType::Float32 => 4,
            NumericType::Int64 | NumericType::UInt64 | NumericType::Float64 => 8,
        }
    }

    /// Canonical name used both in error messages and emitted kernel source
    /// (`float`/`double`/etc., matching the device C dialect).
    pub const fn device_name(self) -> &'static str {
        match self {
            NumericType::Invalid => "invalid",
            NumericType::Int8 => "char",
            NumericType::UInt8 => "uchar",
            NumericType::Int16 => "short",
            NumericType::UInt16 => "ushort",
            NumericType::Int32 => "int",
            NumericType::UInt32 => "uint",
            NumericType::Int64 => "long",
            NumericType::UInt64 => "ulong",
            NumericType::Float32 => "float",
            NumericType::Float64 => "double",
        }
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, NumericType::Float32 | NumericType::Float64)
    }

    pub const fn is_invalid(self) -> bool {
        matches!(self, NumericType::Invalid)
    }

    /// Promotes two operand types to the result type of a binary arithmetic
    /// operator. The core never mixes precision within an expression
    /// (see spec Non-goals), so this only needs to reject true mismatches.
    pub fn promote(self, other: Self) -> Result<Self, crate::TypesError> {
        if self == other {
            return Ok(self);
        }
        if self.is_invalid() {
            return Ok(other);
        }
        if other.is_invalid() {
            return Ok(self);
        }
        Err(crate::TypesError::DtypeMismatch { lhs: self, rhs: other })
    }
}

impl Default for NumericType {
    fn default() -> Self {
        NumericType::Invalid
    }
}

impl std::fmt::Display for NumericType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.device_name())
    }
}
