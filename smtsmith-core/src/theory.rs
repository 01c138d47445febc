//! Theory identifiers.
//!
//! A theory is a named family of sorts and operators. Back-ends report
//! which theories they support; the operator catalog is filtered down to
//! the enabled set at construction.

use std::fmt;

/// A theory of SMT-LIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Theory {
    /// Arrays with extensionality.
    Array,
    /// Multisets.
    Bag,
    /// Core Boolean operators.
    Bool,
    /// Fixed-width bit-vectors.
    Bv,
    /// IEEE-754 floating-point.
    Fp,
    /// Linear/non-linear integer arithmetic.
    Int,
    /// Quantified formulas.
    Quant,
    /// Linear/non-linear real arithmetic.
    Real,
    /// Finite sequences.
    Seq,
    /// Finite sets.
    Set,
    /// Strings and regular languages.
    String,
    /// Uninterpreted functions.
    Uf,
}

impl Theory {
    /// All theories, in canonical order.
    pub const ALL: &'static [Theory] = &[
        Theory::Array,
        Theory::Bag,
        Theory::Bool,
        Theory::Bv,
        Theory::Fp,
        Theory::Int,
        Theory::Quant,
        Theory::Real,
        Theory::Seq,
        Theory::Set,
        Theory::String,
        Theory::Uf,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theory::Array => "array",
            Theory::Bag => "bag",
            Theory::Bool => "bool",
            Theory::Bv => "bv",
            Theory::Fp => "fp",
            Theory::Int => "int",
            Theory::Quant => "quant",
            Theory::Real => "real",
            Theory::Seq => "seq",
            Theory::Set => "set",
            Theory::String => "string",
            Theory::Uf => "uf",
        }
    }

    /// Parse a theory name as printed by [`Theory::as_str`].
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Theory::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for Theory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_names() {
        for t in Theory::ALL {
            assert_eq!(Theory::from_str_opt(t.as_str()), Some(*t));
        }
        assert_eq!(Theory::from_str_opt("datalog"), None);
    }
}
