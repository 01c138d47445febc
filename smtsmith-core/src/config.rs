//! Engine-wide limits.
//!
//! These bound what the generator will ask a back-end to build. They are
//! deliberately conservative: the point is to exercise solver code paths,
//! not to exhaust memory with degenerate inputs.

/// Minimum bit-vector width.
pub const BW_MIN: u32 = 1;
/// Maximum bit-vector width.
pub const BW_MAX: u32 = 128;

/// Maximum number of decimal digits in a generated integer literal.
pub const INT_LEN_MAX: u32 = 50;
/// Maximum number of decimal digits in a generated real literal component.
pub const REAL_LEN_MAX: u32 = 50;
/// Maximum length of a generated string literal.
pub const STR_LEN_MAX: u32 = 100;

/// Maximum length of a generated symbol.
pub const SYMBOL_LEN_MAX: u32 = 128;

/// Maximum number of assumptions passed to a single `check-sat-assuming`.
pub const MAX_N_ASSUMPTIONS: u32 = 5;
/// Maximum number of levels pushed or popped at once.
pub const MAX_N_PUSH_LEVELS: u32 = 5;
/// Maximum number of terms queried by a single `get-value`.
pub const MAX_N_TERMS_GET_VALUE: u32 = 5;

/// Arity marker: operator takes at least one argument.
pub const MK_TERM_N_ARGS: i32 = -1;
/// Arity marker: operator takes at least two arguments.
pub const MK_TERM_N_ARGS_BIN: i32 = -2;
/// Maximum number of arguments picked for a variadic operator.
pub const MK_TERM_N_ARGS_MAX: u32 = 11;

/// Minimum number of arguments for a (possibly variadic) arity.
#[must_use]
pub const fn mk_term_n_args_min(arity: i32) -> u32 {
    if arity < 0 { -arity as u32 } else { arity as u32 }
}

/// Exponent width range for generated floating-point sorts.
pub const FP_EXP_MIN: u32 = 2;
/// See [`FP_EXP_MIN`].
pub const FP_EXP_MAX: u32 = 15;
/// Significand width range for generated floating-point sorts.
pub const FP_SIG_MIN: u32 = 2;
/// See [`FP_SIG_MIN`].
pub const FP_SIG_MAX: u32 = 64;

/// Maximum domain arity of a generated uninterpreted-function sort.
pub const FUN_ARITY_MAX: u32 = 4;

/// Denominator of all `pick_with_prob` draws (probability is `p / 1000`).
pub const PROB_MAX: u32 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_args_min() {
        assert_eq!(mk_term_n_args_min(MK_TERM_N_ARGS), 1);
        assert_eq!(mk_term_n_args_min(MK_TERM_N_ARGS_BIN), 2);
        assert_eq!(mk_term_n_args_min(3), 3);
        assert_eq!(mk_term_n_args_min(0), 0);
    }
}
