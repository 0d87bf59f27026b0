//! Environment-driven configuration surface.
//!
//! Every variable name is prefixed with the product's announcement tag so
//! that several instrumented libraries can coexist in one process (a second
//! build with tag `FAILINJ2` reads `FAILINJ2_DATABASE` and so on). The tag
//! itself is fixed at build time; everything else is resolved from the
//! environment once, at the first injection decision, and a value that
//! fails to parse falls back to its default.

use std::path::PathBuf;

/// Announcement tag, prefixed to every stderr line and environment
/// variable. Overridable at build time so parallel instrumented builds
/// stay distinguishable.
pub const PRODUCT_TAG: &str = match option_env!("FAILINJ_PRODUCT_TAG") {
    Some(tag) => tag,
    None => "FAILINJ",
};

/// Symbol of the coverage-dump routine. Injecting while coverage data is
/// being written would corrupt the instrumentation's own error handling,
/// so the fingerprinter skips any call whose stack contains this frame.
pub const COVERAGE_DUMP_SYMBOL: &str = match option_env!("FAILINJ_COVERAGE_DUMP_SYMBOL") {
    Some(symbol) => symbol,
    None => "gcov_do_dump",
};

/// Exit code for engine-internal errors (`<PFX>_EXIT_ERROR`).
pub const DEFAULT_EXIT_ERROR: i32 = 32;
/// Exit code once a leak or untracked release was reported
/// (`<PFX>_BUG_FOUND`).
pub const DEFAULT_EXIT_BUG_FOUND: i32 = 33;

/// The kinds of program-under-test bugs that can be filtered away, each
/// with an `IGNORE_<CATEGORY>` token list and an `IGNORE_ALL_<CATEGORY>`
/// blanket switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugCategory {
    MemLeaks,
    FdLeaks,
    FileLeaks,
    UntrackedFrees,
    UntrackedCloses,
    UntrackedFcloses,
}

impl BugCategory {
    pub const ALL: [BugCategory; 6] = [
        BugCategory::MemLeaks,
        BugCategory::FdLeaks,
        BugCategory::FileLeaks,
        BugCategory::UntrackedFrees,
        BugCategory::UntrackedCloses,
        BugCategory::UntrackedFcloses,
    ];

    #[must_use]
    pub fn env_suffix(self) -> &'static str {
        match self {
            BugCategory::MemLeaks => "MEM_LEAKS",
            BugCategory::FdLeaks => "FD_LEAKS",
            BugCategory::FileLeaks => "FILE_LEAKS",
            BugCategory::UntrackedFrees => "UNTRACKED_FREES",
            BugCategory::UntrackedCloses => "UNTRACKED_CLOSES",
            BugCategory::UntrackedFcloses => "UNTRACKED_FCLOSES",
        }
    }

    fn index(self) -> usize {
        match self {
            BugCategory::MemLeaks => 0,
            BugCategory::FdLeaks => 1,
            BugCategory::FileLeaks => 2,
            BugCategory::UntrackedFrees => 3,
            BugCategory::UntrackedCloses => 4,
            BugCategory::UntrackedFcloses => 5,
        }
    }
}

/// Per-category ignore filter: a blanket switch plus a space-separated
/// token list matched by substring against the relevant backtrace. Short
/// tokens can over-match (a token `read` also matches `thread_start`);
/// pick tokens as close to whole symbol names as possible.
#[derive(Debug, Default, Clone)]
pub struct CategoryFilter {
    pub ignore_all: bool,
    pub tokens: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct IgnoreFilters {
    filters: [CategoryFilter; 6],
}

impl IgnoreFilters {
    fn from_env(tag: &str) -> Self {
        let mut filters: [CategoryFilter; 6] = Default::default();
        for category in BugCategory::ALL {
            let suffix = category.env_suffix();
            filters[category.index()] = CategoryFilter {
                ignore_all: std::env::var(format!("{tag}_IGNORE_ALL_{suffix}")).is_ok(),
                tokens: env_tokens(&format!("{tag}_IGNORE_{suffix}")),
            };
        }
        Self { filters }
    }

    #[must_use]
    pub fn filter(&self, category: BugCategory) -> &CategoryFilter {
        &self.filters[category.index()]
    }

    /// Whether a bug of `category` with the given backtrace should be
    /// suppressed. Memory-leak reports additionally suppress buffers that
    /// standard I/O allocates lazily behind the program's back.
    #[must_use]
    pub fn should_ignore(&self, category: BugCategory, backtrace: &str) -> bool {
        let filter = self.filter(category);
        if filter.ignore_all {
            return true;
        }
        if category == BugCategory::MemLeaks
            && (backtrace.contains("_IO_file_doallocate") || backtrace.contains("fopen"))
        {
            return true;
        }
        filter
            .tokens
            .iter()
            .any(|token| backtrace.contains(token.as_str()))
    }
}

fn env_tokens(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|value| value.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn env_int(name: &str, default: i32) -> i32 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tag: &'static str,
    pub database_path: PathBuf,
    pub exit_error: i32,
    pub exit_bug_found: i32,
    pub skip_injection: Vec<String>,
    pub ignore: IgnoreFilters,
}

impl Config {
    /// Resolves the whole surface for the build-time tag.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_tag(PRODUCT_TAG)
    }

    /// Resolves the surface for an explicit tag. Besides the build-time
    /// override this keeps tests hermetic: each picks its own prefix.
    #[must_use]
    pub fn from_env_with_tag(tag: &'static str) -> Self {
        let database_path = std::env::var(format!("{tag}_DATABASE"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(format!("{}.db", tag.to_ascii_lowercase())));
        Self {
            tag,
            database_path,
            exit_error: env_int(&format!("{tag}_EXIT_ERROR"), DEFAULT_EXIT_ERROR),
            exit_bug_found: env_int(&format!("{tag}_BUG_FOUND"), DEFAULT_EXIT_BUG_FOUND),
            skip_injection: env_tokens(&format!("{tag}_SKIP_INJECTION")),
            ignore: IgnoreFilters::from_env(tag),
        }
    }
}
