//! Stderr report text.
//!
//! Every line the library emits is prefixed with the announcement tag.
//! The key of a pointer-shaped resource prints as hex, a descriptor as the
//! plain decimal fd. The message spellings are load-bearing: test drivers
//! grep stderr for them.

use crate::config::BugCategory;

/// `"\n<TAG>: <body>\n"` — the leading newline separates the report from
/// whatever the program under test was printing mid-line.
#[must_use]
pub fn banner(tag: &str, body: &str) -> String {
    format!("\n{tag}: {body}\n")
}

/// Banner announcing a synthetic failure, followed by the backtrace of the
/// failed call.
#[must_use]
pub fn injection_banner(tag: &str) -> String {
    banner(tag, "Injecting failure at:")
}

/// A release operation whose key was not in the corresponding shadow
/// table. The variants differ in which primitive attempted the release,
/// which picks both the report text and the ignore-filter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Free,
    Realloc,
    Close,
    Fdopen,
    Freopen,
    Fclose,
}

impl ReleaseKind {
    #[must_use]
    pub fn category(self) -> BugCategory {
        match self {
            ReleaseKind::Free | ReleaseKind::Realloc => BugCategory::UntrackedFrees,
            ReleaseKind::Close => BugCategory::UntrackedCloses,
            ReleaseKind::Fdopen | ReleaseKind::Freopen | ReleaseKind::Fclose => {
                BugCategory::UntrackedFcloses
            }
        }
    }

    #[must_use]
    pub fn message(self, key: u64) -> String {
        match self {
            ReleaseKind::Free => {
                format!("Attempted to free untracked pointer 0x{key:x} at:")
            }
            ReleaseKind::Realloc => {
                format!("Attempted to realloc untracked pointer 0x{key:x} at:")
            }
            ReleaseKind::Close => {
                format!("Attempted to close untracked file descriptor {} at:", key as i64)
            }
            ReleaseKind::Fdopen => {
                format!("Attempted to fdopen untracked file descriptor {} at:", key as i64)
            }
            ReleaseKind::Freopen => {
                format!("Attempted to freopen untracked file 0x{key:x} at:")
            }
            ReleaseKind::Fclose => {
                format!("Attempted to fclose untracked file 0x{key:x} at:")
            }
        }
    }
}

/// A tracked resource still present at process teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakKind {
    Allocation,
    Descriptor,
    Stream,
}

impl LeakKind {
    #[must_use]
    pub fn category(self) -> BugCategory {
        match self {
            LeakKind::Allocation => BugCategory::MemLeaks,
            LeakKind::Descriptor => BugCategory::FdLeaks,
            LeakKind::Stream => BugCategory::FileLeaks,
        }
    }

    #[must_use]
    pub fn message(self, key: u64) -> String {
        match self {
            LeakKind::Allocation => {
                format!("Possible memory leak for 0x{key:x} allocated at:")
            }
            LeakKind::Descriptor => {
                format!("Possible file descriptor leak for {} opened at:", key as i64)
            }
            LeakKind::Stream => {
                format!("Possible unclosed file for 0x{key:x} opened at:")
            }
        }
    }
}
