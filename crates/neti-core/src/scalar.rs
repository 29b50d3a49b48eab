//! Scalar precision abstraction.
//!
//! The integrator is written once, generic over [`NetiScalar`]. The two
//! instantiations are `f32` and `f64`.

use std::fmt;

use nalgebra::RealField;
use num_traits::ToPrimitive;

/// Numeric precision of a scalar instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// IEEE-754 binary32.
    Float32,
    /// IEEE-754 binary64.
    Float64,
}

impl Precision {
    /// Short name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Precision::Float32 => "f32",
            Precision::Float64 => "f64",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Real scalar type the integrator can be instantiated with.
///
/// nalgebra's [`RealField`] drives the dense kernels and faer's
/// [`ComplexField`](faer::traits::ComplexField) the sparse ones.
pub trait NetiScalar:
    RealField + faer::traits::ComplexField + Copy + ToPrimitive + Send + Sync + 'static
{
    /// Which precision variant this type is.
    const PRECISION: Precision;

    /// Machine epsilon of the type.
    fn machine_epsilon() -> Self;

    /// Convert from an `f64` literal or configuration value.
    fn from_f64_lossy(value: f64) -> Self {
        nalgebra::convert(value)
    }

    /// Widen to `f64` for logging and error reporting.
    fn to_f64_lossy(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }
}

impl NetiScalar for f32 {
    const PRECISION: Precision = Precision::Float32;

    fn machine_epsilon() -> Self {
        f32::EPSILON
    }
}

impl NetiScalar for f64 {
    const PRECISION: Precision = Precision::Float64;

    fn machine_epsilon() -> Self {
        f64::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_tags() {
        assert_eq!(<f32 as NetiScalar>::PRECISION, Precision::Float32);
        assert_eq!(<f64 as NetiScalar>::PRECISION, Precision::Float64);
        assert_eq!(Precision::Float64.to_string(), "f64");
    }

    #[test]
    fn lossy_conversions() {
        let x = f32::from_f64_lossy(0.25);
        assert_eq!(x, 0.25_f32);
        assert_eq!(x.to_f64_lossy(), 0.25);
        assert_eq!(f64::from_f64_lossy(1e-300), 1e-300);
    }

    #[test]
    fn epsilon_ordering() {
        assert!(f64::machine_epsilon() < f32::machine_epsilon().to_f64_lossy());
    }
}
