//! Stack fingerprinting.
//!
//! A call site is the full symbolic stack above the wrapped primitive.
//! Each physical frame is rendered as `"<symbol>+0x<offset>"` — symbol
//! names, not return addresses, so the value survives ASLR — and folded
//! into the 64-bit callsite hash. A frame that cannot be symbolized
//! contributes the constant `unknown+0x0` for the same reason.
//!
//! Both walks allocate and must only run behind the reentrancy gate.

use backtrace::Frame;

use failinj_core::config::{COVERAGE_DUMP_SYMBOL, Config};
use failinj_core::hash::{HASH_SEED, djb_extend, frame_text};

fn frame_symbol(frame: &Frame) -> (Option<String>, u64) {
    let mut name = None;
    backtrace::resolve_frame(frame, |symbol| {
        if let Some(n) = symbol.name() {
            // With inlining the resolver reports several logical frames;
            // the last one is the enclosing physical function, which is
            // what an unwinder reports.
            name = Some(n.to_string());
        }
    });
    let offset = (frame.ip() as usize).saturating_sub(frame.symbol_address() as usize);
    (name, offset as u64)
}

/// Hashes the current stack into a callsite fingerprint, or returns `None`
/// when this call must not be injected into: a frame matches the
/// configured skip set, or the stack is inside the coverage-dump routine.
#[must_use]
pub fn callsite(config: &Config) -> Option<u64> {
    let mut hash = HASH_SEED;
    let mut skip = false;
    backtrace::trace(|frame| {
        let (name, offset) = frame_symbol(frame);
        match name {
            Some(name) => {
                if name == COVERAGE_DUMP_SYMBOL
                    || config
                        .skip_injection
                        .iter()
                        .any(|token| name.contains(token.as_str()))
                {
                    skip = true;
                    return false;
                }
                hash = djb_extend(hash, &frame_text(&name, offset));
            }
            None => hash = djb_extend(hash, "unknown+0x0"),
        }
        true
    });
    if skip { None } else { Some(hash) }
}

/// Pretty-prints the current stack, one indented frame per line. Retained
/// for tracked resources and echoed under every report banner.
#[must_use]
pub fn backtrace_text() -> String {
    let mut out = String::new();
    backtrace::trace(|frame| {
        let (name, offset) = frame_symbol(frame);
        match name {
            Some(name) => {
                out.push_str("    ");
                out.push_str(&frame_text(&name, offset));
                out.push('\n');
            }
            None => out.push_str("    unknown+0x0\n"),
        }
        true
    });
    out
}
