use std::fmt;

// DType - Element types the math-kernel library computes in
//
// The kernel library only ships single and double precision variants of its
// primitives, so the operator adapter is generic over exactly these two:
//
//   F32 - 32-bit float, the default
//   F64 - 64-bit float

/// Enum of the supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

// WithDType - Trait that connects Rust types to the DType enum
//
// Operators are written once as `DnnOperator<T, ..>` and monomorphized for
// f32 and f64; this trait gives them the runtime tag and numeric helpers.

/// Trait implemented by Rust types that a kernel buffer can hold.
///
/// Numeric helpers (`zero`, `max`, casts) come from `num_traits::Float`.
pub trait WithDType: num_traits::Float + Default + Send + Sync + fmt::Debug + 'static {
    /// The corresponding DType enum variant.
    const DTYPE: DType;
}

impl WithDType for f32 {
    const DTYPE: DType = DType::F32;
}

impl WithDType for f64 {
    const DTYPE: DType = DType::F64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
    }

    #[test]
    fn test_with_dtype_f32() {
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(f64::DTYPE.size_in_bytes(), std::mem::size_of::<f64>());
    }

    #[test]
    fn test_display() {
        assert_eq!(DType::F64.to_string(), "f64");
    }
}
