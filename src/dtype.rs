//! Element dtypes, the FP16 codec, and the precomputed FP16 lookup tables.
//!
//! Mirrors the "magic constant" binary16 conversion used by the reference
//! FP16 implementations: denormals are flushed via the `0x77800000` /
//! `0x0880_0000` scaling trick rather than branching on the exponent.

use std::sync::OnceLock;

/// Fixed dtype enumeration. `Count` is a sentinel, never a tensor's dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DType {
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// IEEE 754 binary16 float.
    F16,
    /// IEEE 754 binary32 float.
    F32,
}

impl DType {
    /// Element size in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            DType::I8 => 1,
            DType::I16 | DType::F16 => 2,
            DType::I32 | DType::F32 => 4,
        }
    }

    /// Whether the dtype is a floating-point type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::F32)
    }

    /// Whether the dtype is an integer type.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32)
    }
}

/// IEEE 754 binary16 value stored as its raw bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct F16(pub u16);

impl F16 {
    /// The additive identity.
    pub const ZERO: F16 = F16(0);

    /// Converts an `f32` to binary16 using the magic-constant method.
    ///
    /// NaN is clamped to the canonical quiet-NaN pattern `0x7E00`.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return F16(0x7E00);
        }

        let bits = value.to_bits();
        let sign = (bits >> 16) & 0x8000;
        let magic: f32 = f32::from_bits(113 << 23);
        let rounded = f32::from_bits(bits & 0x7fff_ffff) * magic;
        let rounded = f32::from_bits(rounded.to_bits() + 0x0000_1000);
        let mantissa_exp = rounded.to_bits();
        let shifted = (mantissa_exp >> 13) & 0x7fff;
        let clamped = shifted.min(0x7c00);
        F16((sign | clamped) as u16)
    }

    /// Converts a binary16 bit pattern back to `f32`.
    ///
    /// Denormals are treated as normal via the documented
    /// `0x7780_0000` / `0x0880_0000` scaling trick.
    #[must_use]
    pub fn to_f32(self) -> f32 {
        let h = u32::from(self.0);
        let sign = (h & 0x8000) << 16;
        let exp_mantissa = h & 0x7fff;

        if exp_mantissa == 0 {
            return f32::from_bits(sign);
        }

        let magic = f32::from_bits(0x7780_0000);
        let renorm_magic = f32::from_bits(0x0880_0000);

        let shifted = exp_mantissa << 13;
        let value = if (shifted & 0x7f80_0000) == 0 {
            // Denormal: renormalize through a float multiply.
            f32::from_bits(shifted | renorm_magic.to_bits()) - renorm_magic
        } else {
            f32::from_bits(shifted) * magic
        };

        f32::from_bits(sign | value.to_bits())
    }
}

impl From<f32> for F16 {
    fn from(value: f32) -> Self {
        F16::from_f32(value)
    }
}

impl From<F16> for f32 {
    fn from(value: F16) -> Self {
        value.to_f32()
    }
}

/// Precomputed 65536-entry FP16 lookup tables for GELU and `exp`.
///
/// Each table is indexed directly by an `F16` bit pattern (128 KiB each) and
/// is populated once, lazily, on first use — mirroring the source's
/// first-`init`-populates-the-tables behavior without the global context
/// pool needing to know about it.
pub struct Tables {
    gelu: Box<[F16; 65536]>,
    exp: Box<[F16; 65536]>,
}

impl Tables {
    fn build() -> Self {
        let mut gelu = Box::new([F16::ZERO; 65536]);
        let mut exp = Box::new([F16::ZERO; 65536]);

        for i in 0..65536_u32 {
            #[allow(clippy::cast_possible_truncation)]
            let bits = i as u16;
            let x = F16(bits).to_f32();
            gelu[i as usize] = F16::from_f32(gelu_f32(x));
            exp[i as usize] = F16::from_f32(x.exp());
        }

        Self { gelu, exp }
    }

    /// Looks up `GELU(x)` via the table, using `x`'s FP16 bit pattern.
    #[must_use]
    pub fn gelu(&self, x: F16) -> F16 {
        self.gelu[x.0 as usize]
    }

    /// Looks up `exp(x)` via the table, using `x`'s FP16 bit pattern.
    #[must_use]
    pub fn exp(&self, x: F16) -> F16 {
        self.exp[x.0 as usize]
    }
}

/// Exact (non-tabled) GELU, used both directly and to populate [`Tables`].
///
/// `y = 0.5 x (1 + tanh(sqrt(2/pi) x (1 + 0.044715 x^2)))`
#[must_use]
pub fn gelu_f32(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * x * (1.0 + 0.044_715 * x * x)).tanh())
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Returns the process-wide GELU/exp lookup tables, building them on first
/// call. Building costs two full passes over 65536 entries (~a few ms); the
/// result is cached for the life of the process.
pub fn tables() -> &'static Tables {
    TABLES.get_or_init(Tables::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f16_zero_roundtrip() {
        assert_eq!(F16::from_f32(0.0).to_f32(), 0.0);
        assert_eq!(F16::from_f32(-0.0).to_f32(), -0.0);
    }

    #[test]
    fn f16_roundtrip_within_tolerance() {
        for &x in &[1.0_f32, -1.0, 0.5, 123.25, -4096.0, 2.0f32.powi(-14), 2.0f32.powi(15)] {
            let back = F16::from_f32(x).to_f32();
            let tolerance = 2f32.powi(-10) * x.abs();
            assert!(
                (back - x).abs() <= tolerance.max(1e-6),
                "{x} round-tripped to {back}"
            );
        }
    }

    #[test]
    fn f16_nan_clamped() {
        assert_eq!(F16::from_f32(f32::NAN).0, 0x7E00);
    }

    #[test]
    fn dtype_sizes() {
        assert_eq!(DType::I8.size(), 1);
        assert_eq!(DType::I16.size(), 2);
        assert_eq!(DType::I32.size(), 4);
        assert_eq!(DType::F16.size(), 2);
        assert_eq!(DType::F32.size(), 4);
    }

    #[test]
    fn gelu_zero_and_one() {
        assert_eq!(gelu_f32(0.0), 0.0);
        assert!((gelu_f32(1.0) - 0.8413).abs() < 1e-3);
    }

    #[test]
    fn gelu_table_matches_exact_within_table_resolution() {
        let t = tables();
        for &x in &[-3.0_f32, -1.0, 0.0, 0.5, 2.0, 4.0] {
            let exact = gelu_f32(x);
            let tabled = t.gelu(F16::from_f32(x)).to_f32();
            assert!((exact - tabled).abs() < 5e-2, "x={x} exact={exact} tabled={tabled}");
        }
    }

    #[test]
    fn gelu_monotonic_within_range() {
        let mut prev = gelu_f32(-6.0);
        let mut x = -6.0_f32;
        while x <= 6.0 {
            let y = gelu_f32(x);
            assert!(y >= prev - 1e-6);
            prev = y;
            x += 0.1;
        }
    }

    #[test]
    fn exp_table_matches_exact() {
        let t = tables();
        for &x in &[-2.0_f32, -0.5, 0.0, 0.5, 2.0] {
            let exact = x.exp();
            let tabled = t.exp(F16::from_f32(x)).to_f32();
            assert!((exact - tabled).abs() / exact.max(1.0) < 5e-2);
        }
    }
}
