//! Size quantities and translation into the image tool's size grammar.
//!
//! A [`Quantity`] follows the resource-quantity conventions used by cluster
//! manifests: `10Gi`, `512Ki`, `1.5G`, `4096`. The image tool only knows the
//! suffixes `k`, `M`, `G`, `T`, `P` and `E`, so [`to_tool_size`] rewrites the
//! canonical form into that grammar without rescaling the number.

use crate::error::{ImageError, Result};
use std::fmt;
use std::str::FromStr;

const BINARY_SUFFIXES: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SUFFIXES: [&str; 6] = ["k", "M", "G", "T", "P", "E"];

/// Suffix family a quantity was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityFormat {
    /// Powers of 1024 (`Ki`, `Mi`, ...)
    BinarySI,
    /// Powers of 1000 (`k`, `M`, ...) or no suffix
    DecimalSI,
}

impl QuantityFormat {
    fn base(self) -> u128 {
        match self {
            Self::BinarySI => 1024,
            Self::DecimalSI => 1000,
        }
    }

    fn suffixes(self) -> &'static [&'static str; 6] {
        match self {
            Self::BinarySI => &BINARY_SUFFIXES,
            Self::DecimalSI => &DECIMAL_SUFFIXES,
        }
    }
}

/// A non-negative byte quantity with the suffix family it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    bytes: u64,
    format: QuantityFormat,
}

impl Quantity {
    pub fn new(bytes: u64, format: QuantityFormat) -> Self {
        Self { bytes, format }
    }

    /// Quantity from a plain byte count.
    pub fn from_bytes(bytes: u64) -> Self {
        Self::new(bytes, QuantityFormat::DecimalSI)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }
}

impl FromStr for Quantity {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let invalid = |reason: &str| ImageError::InvalidQuantity {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let split = input
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(input.len());
        let (number, suffix) = input.split_at(split);
        if number.is_empty() {
            return Err(invalid("missing number"));
        }

        let (format, exponent) = if suffix.is_empty() {
            (QuantityFormat::DecimalSI, 0)
        } else if let Some(i) = BINARY_SUFFIXES.iter().position(|x| *x == suffix) {
            (QuantityFormat::BinarySI, i as u32 + 1)
        } else if let Some(i) = DECIMAL_SUFFIXES.iter().position(|x| *x == suffix) {
            (QuantityFormat::DecimalSI, i as u32 + 1)
        } else {
            return Err(invalid("unknown suffix"));
        };
        let multiplier = format.base().pow(exponent);

        let (whole, fraction) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
            return Err(invalid("malformed number"));
        }
        if fraction.len() > 18 {
            return Err(invalid("too many fractional digits"));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("number out of range"))?
        };
        let mut total = whole
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("number out of range"))?;

        if !fraction.is_empty() {
            let scale = 10u128.pow(fraction.len() as u32);
            let numerator: u128 = fraction.parse().map_err(|_| invalid("malformed number"))?;
            let scaled = numerator
                .checked_mul(multiplier)
                .ok_or_else(|| invalid("number out of range"))?;
            if scaled % scale != 0 {
                return Err(invalid("fractional bytes are not allowed"));
            }
            total = total
                .checked_add(scaled / scale)
                .ok_or_else(|| invalid("number out of range"))?;
        }

        let bytes = u64::try_from(total).map_err(|_| invalid("number out of range"))?;
        Ok(Self { bytes, format })
    }
}

impl fmt::Display for Quantity {
    /// Canonical form: the largest suffix of the same family that divides
    /// the value exactly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.bytes as u128;
        if value == 0 {
            return write!(f, "0");
        }
        let base = self.format.base();
        for exponent in (1..=6u32).rev() {
            let unit = base.pow(exponent);
            if value % unit == 0 {
                let suffix = self.format.suffixes()[exponent as usize - 1];
                return write!(f, "{}{}", value / unit, suffix);
            }
        }
        write!(f, "{}", value)
    }
}

/// Translate a quantity into the size string accepted by `qemu-img`.
///
/// The tool expects `k` rather than `K` and has no binary (`i`) suffixes.
/// This is purely syntactic: `10Gi` becomes `10G`.
pub fn to_tool_size(size: &Quantity) -> String {
    size.to_string().replace('K', "k").replace('i', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_binary_suffix() {
        assert_eq!(q("10Gi").bytes(), 10 * 1024 * 1024 * 1024);
        assert_eq!(q("512Ki").format(), QuantityFormat::BinarySI);
    }

    #[test]
    fn test_parse_decimal_suffix() {
        assert_eq!(q("5M").bytes(), 5_000_000);
        assert_eq!(q("1.5G").bytes(), 1_500_000_000);
        assert_eq!(q("4096").bytes(), 4096);
        assert_eq!(q("4096").format(), QuantityFormat::DecimalSI);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Quantity>().is_err());
        assert!("Gi".parse::<Quantity>().is_err());
        assert!("10Xi".parse::<Quantity>().is_err());
        assert!("1.2.3G".parse::<Quantity>().is_err());
        assert!("0.5".parse::<Quantity>().is_err());
        assert!("100Ei".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_parse_rejects_overflowing_fraction() {
        let err = "340282366920938463463374607431768211.9k"
            .parse::<Quantity>()
            .unwrap_err();
        assert!(err.to_string().contains("number out of range"));
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(q("1024Mi").to_string(), "1Gi");
        assert_eq!(q("1536Mi").to_string(), "1536Mi");
        assert_eq!(q("1000k").to_string(), "1M");
        assert_eq!(q("1500").to_string(), "1500");
        assert_eq!(q("0Gi").to_string(), "0");
    }

    #[test]
    fn test_tool_size_binary() {
        assert_eq!(to_tool_size(&q("10Gi")), "10G");
        assert_eq!(to_tool_size(&q("512Ki")), "512k");
        assert_eq!(to_tool_size(&q("3Ti")), "3T");
    }

    #[test]
    fn test_tool_size_decimal_unchanged() {
        assert_eq!(to_tool_size(&q("2G")), "2G");
        assert_eq!(to_tool_size(&q("7k")), "7k");
        assert_eq!(to_tool_size(&q("1234")), "1234");
    }

    proptest! {
        #[test]
        fn prop_binary_kilo_lowercase_without_i(n in 1u64..1_000_000) {
            prop_assume!(n % 1024 != 0);
            let out = to_tool_size(&q(&format!("{}Ki", n)));
            prop_assert!(out.ends_with('k'));
            prop_assert!(!out.contains('i'));
            prop_assert!(!out.contains('K'));
            prop_assert_eq!(out, format!("{}k", n));
        }

        #[test]
        fn prop_unitless_keeps_magnitude(n in 0u64..u32::MAX as u64) {
            let out = to_tool_size(&Quantity::from_bytes(n));
            prop_assert_eq!(q(&out).bytes(), n);
        }
    }
}
