//! Passphrase strength estimation.
//!
//! Two independent floors apply at init: a minimum length of 8 characters
//! and an estimated entropy of at least 60 bits. The estimator is
//! composition-based: the pool size is the sum of the character classes in
//! use, and runs of a repeated character beyond two occurrences contribute
//! nothing.

use gaia_core::GaiaError;
use gaia_core::Result;
use gaia_core::constants::MIN_PASSPHRASE_ENTROPY_BITS;
use gaia_core::constants::MIN_PASSPHRASE_LEN;

const LOWERCASE_POOL: f64 = 26.0;
const UPPERCASE_POOL: f64 = 26.0;
const DIGIT_POOL: f64 = 10.0;
const SYMBOL_POOL: f64 = 32.0;

/// Reject a passphrase that falls below either strength floor.
pub fn check_strength(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(GaiaError::WeakPassphrase {
            reason: format!("must be at least {MIN_PASSPHRASE_LEN} characters"),
        });
    }

    let bits = estimate_entropy_bits(passphrase);
    if bits < MIN_PASSPHRASE_ENTROPY_BITS {
        return Err(GaiaError::WeakPassphrase {
            reason: format!(
                "estimated entropy of {bits:.0} bits is below the {MIN_PASSPHRASE_ENTROPY_BITS:.0}-bit minimum"
            ),
        });
    }

    Ok(())
}

/// Estimate entropy as `effective_length * log2(pool_size)`.
fn estimate_entropy_bits(passphrase: &str) -> f64 {
    let mut has_lower = false;
    let mut has_upper = false;
    let mut has_digit = false;
    let mut has_symbol = false;

    let mut effective_len = 0usize;
    let mut prev: Option<char> = None;
    let mut run_len = 0usize;

    for c in passphrase.chars() {
        if c.is_ascii_lowercase() {
            has_lower = true;
        } else if c.is_ascii_uppercase() {
            has_upper = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else {
            has_symbol = true;
        }

        if prev == Some(c) {
            run_len += 1;
        } else {
            run_len = 1;
            prev = Some(c);
        }
        // "aaaaaaaa" is barely stronger than "aa"
        if run_len <= 2 {
            effective_len += 1;
        }
    }

    let mut pool = 0.0;
    if has_lower {
        pool += LOWERCASE_POOL;
    }
    if has_upper {
        pool += UPPERCASE_POOL;
    }
    if has_digit {
        pool += DIGIT_POOL;
    }
    if has_symbol {
        pool += SYMBOL_POOL;
    }
    if pool == 0.0 {
        return 0.0;
    }

    effective_len as f64 * pool.log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_passphrase_accepted() {
        assert!(check_strength("CorrectHorseBatteryStaple!7").is_ok());
    }

    #[test]
    fn common_weak_password_rejected() {
        let err = check_strength("password").unwrap_err();
        assert!(matches!(err, GaiaError::WeakPassphrase { .. }));
    }

    #[test]
    fn short_passphrase_rejected_regardless_of_composition() {
        let err = check_strength("aB3$xY9").unwrap_err();
        assert!(matches!(err, GaiaError::WeakPassphrase { .. }));
    }

    #[test]
    fn long_single_class_passphrase_rejected() {
        // 12 lowercase letters: 12 * log2(26) = ~56 bits, below the floor.
        assert!(check_strength("abcdefghijkl").is_err());
    }

    #[test]
    fn repeated_runs_add_nothing() {
        let repeated = estimate_entropy_bits("aaaaaaaaaaaaaaaa");
        let pair = estimate_entropy_bits("aa");
        assert_eq!(repeated, pair);
    }

    #[test]
    fn mixed_classes_raise_the_estimate() {
        assert!(estimate_entropy_bits("abcdefAB12!@") > estimate_entropy_bits("abcdefghijkl"));
    }
}
