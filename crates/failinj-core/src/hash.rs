//! Callsite hashing.
//!
//! A call site is identified by folding the textual form of every stack
//! frame (`"<symbol>+0x<offset>"`, innermost first) into a 64-bit Bernstein
//! djb hash. Hashing symbol text rather than return addresses keeps the
//! value stable across ASLR-randomized runs of the same build.

/// Seed for the callsite hash, from <http://www.cse.yorku.ca/~oz/hash.html>.
pub const HASH_SEED: u64 = 53_815_381;

/// Folds `text` into `hash` one byte at a time (`h = h*33 ^ byte`).
#[must_use]
pub fn djb_extend(hash: u64, text: &str) -> u64 {
    text.bytes()
        .fold(hash, |h, b| h.wrapping_mul(33) ^ u64::from(b))
}

/// Renders one stack frame the way both the hash fold and the stored
/// backtraces spell it.
#[must_use]
pub fn frame_text(symbol: &str, offset: u64) -> String {
    format!("{symbol}+0x{offset:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_is_order_sensitive() {
        let a = djb_extend(djb_extend(HASH_SEED, "main+0x10"), "start+0x20");
        let b = djb_extend(djb_extend(HASH_SEED, "start+0x20"), "main+0x10");
        assert_ne!(a, b);
    }

    #[test]
    fn fold_matches_reference_recurrence() {
        let mut expected = HASH_SEED;
        for b in "main+0x1a".bytes() {
            expected = expected.wrapping_mul(33) ^ u64::from(b);
        }
        assert_eq!(djb_extend(HASH_SEED, "main+0x1a"), expected);
    }

    #[test]
    fn empty_text_is_identity() {
        assert_eq!(djb_extend(HASH_SEED, ""), HASH_SEED);
    }

    #[test]
    fn frame_text_uses_lowercase_hex() {
        assert_eq!(frame_text("do_work", 0x1AB), "do_work+0x1ab");
        assert_eq!(frame_text("unknown", 0), "unknown+0x0");
    }
}
