//! Injection decision and resource tracking.
//!
//! One mutex serializes the four tables (callsites seen, live allocations,
//! live descriptors, live streams) and the database handle behind them.
//! Everything here runs with the reentrancy gate raised, so the nested
//! libc calls the engine itself performs (the database writer writes, the
//! stack walker allocates) pass through the wrappers untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, TryLockError};

use failinj_core::config::Config;
use failinj_core::database::Database;
use failinj_core::report::{self, LeakKind, ReleaseKind};
use failinj_core::table::{HashEntry, HashTable};

use crate::fingerprint;
use crate::gate::{self, GateGuard};

/// Which shadow table a wrapper reports into.
#[derive(Debug, Clone, Copy)]
pub enum Resource {
    Allocation,
    Descriptor,
    Stream,
}

struct Engine {
    callsites: HashTable,
    allocations: HashTable,
    descriptors: HashTable,
    streams: HashTable,
    database: Option<Database>,
}

impl Engine {
    const fn new() -> Self {
        Self {
            callsites: HashTable::new(),
            allocations: HashTable::new(),
            descriptors: HashTable::new(),
            streams: HashTable::new(),
            database: None,
        }
    }

    fn shadow_table(&mut self, resource: Resource) -> &mut HashTable {
        match resource {
            Resource::Allocation => &mut self.allocations,
            Resource::Descriptor => &mut self.descriptors,
            Resource::Stream => &mut self.streams,
        }
    }
}

static ENGINE: Mutex<Engine> = Mutex::new(Engine::new());
/// One synthetic failure per run, at most.
static INJECTED: AtomicBool = AtomicBool::new(false);
/// Monotonic: once a leak or untracked release was reported, the shutdown
/// hook overrides the process exit code.
static BUG_FOUND: AtomicBool = AtomicBool::new(false);
static CONFIG: OnceLock<Config> = OnceLock::new();

/// The environment surface, resolved on first use. Reading it may
/// allocate, so first use happens behind the gate or after teardown began.
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

fn lock() -> MutexGuard<'static, Engine> {
    ENGINE.lock().unwrap_or_else(|e| e.into_inner())
}

/// Engine-internal failure: report with the configured tag and terminate
/// with the internal-error exit code. Never returns; bugs in the program
/// under test never come through here.
pub(crate) fn exit_internal(message: &str) -> ! {
    let config = config();
    eprint!("{}", report::banner(config.tag, message));
    std::process::exit(config.exit_error);
}

/// Decides whether the primitive call the caller is wrapping must return
/// its failure sentinel. True exactly when this callsite has never been
/// seen before (across all runs recorded in the database) and nothing
/// suppresses injection; the new callsite is persisted before the caller
/// learns about it.
pub fn should_fail() -> bool {
    if INJECTED.load(Ordering::Relaxed) {
        return false;
    }
    let Some(_gate) = GateGuard::enter() else {
        return false;
    };
    let config = config();
    let mut engine = lock();

    if engine.database.is_none() {
        let mut database = match Database::open(&config.database_path) {
            Ok(database) => database,
            Err(err) => exit_internal(&err.to_string()),
        };
        if let Err(err) = database.load_into(&mut engine.callsites) {
            exit_internal(&err.to_string());
        }
        engine.database = Some(database);
    }

    let Some(hash) = fingerprint::callsite(config) else {
        return false;
    };
    if !engine.callsites.insert(Box::new(HashEntry::new(hash))) {
        return false;
    }
    if let Some(database) = engine.database.as_mut() {
        if let Err(err) = database.append(hash) {
            exit_internal(&err.to_string());
        }
    }

    eprint!("{}", report::injection_banner(config.tag));
    eprint!("{}", fingerprint::backtrace_text());
    eprintln!();
    INJECTED.store(true, Ordering::Relaxed);
    true
}

/// Records a successfully created resource with the backtrace of its
/// creation. A key already present keeps its earlier backtrace.
pub fn track_create(key: u64, resource: Resource) {
    let Some(_gate) = GateGuard::enter() else {
        return;
    };
    let backtrace = fingerprint::backtrace_text();
    let _ = lock()
        .shadow_table(resource)
        .insert(Box::new(HashEntry::with_backtrace(key, backtrace)));
}

/// Records a release. Releasing a key the table does not hold is a bug in
/// the program under test: it is reported against the current backtrace
/// unless the category's ignore filters suppress it.
pub fn track_destroy(key: u64, resource: Resource, kind: ReleaseKind) {
    let Some(_gate) = GateGuard::enter() else {
        return;
    };
    if lock().shadow_table(resource).pop(key).is_some() {
        return;
    }
    let backtrace = fingerprint::backtrace_text();
    let config = config();
    if config.ignore.should_ignore(kind.category(), &backtrace) {
        return;
    }
    eprint!("{}", report::banner(config.tag, &kind.message(key)));
    eprint!("{backtrace}");
    BUG_FOUND.store(true, Ordering::Relaxed);
}

/// Drops every stream entry without reporting: `fcloseall` genuinely
/// closes them all.
pub fn forget_streams() {
    let Some(_gate) = GateGuard::enter() else {
        return;
    };
    lock().streams.take_entries();
}

/// End-of-process scan: every entry still in a shadow table is a candidate
/// leak, reported against its create-time backtrace. Runs with the gate
/// permanently raised; if the engine mutex is held (the process is dying
/// mid-engine), the scan is skipped rather than deadlocking.
pub fn sweep_leaks() {
    gate::force_raise();
    let config = config();
    let mut engine = match ENGINE.try_lock() {
        Ok(engine) => engine,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return,
    };
    let entries = [
        (engine.allocations.take_entries(), LeakKind::Allocation),
        (engine.descriptors.take_entries(), LeakKind::Descriptor),
        (engine.streams.take_entries(), LeakKind::Stream),
    ];
    drop(engine);
    for (survivors, kind) in entries {
        for entry in survivors {
            let backtrace = entry.backtrace.as_deref().unwrap_or("");
            if config.ignore.should_ignore(kind.category(), backtrace) {
                continue;
            }
            eprint!("{}", report::banner(config.tag, &kind.message(entry.hash)));
            eprint!("{backtrace}");
            BUG_FOUND.store(true, Ordering::Relaxed);
        }
    }
}

/// Whether any leak or untracked release has been reported.
#[must_use]
pub fn bug_found() -> bool {
    BUG_FOUND.load(Ordering::Relaxed)
}

/// Number of callsites currently known (loaded plus newly observed).
#[must_use]
pub fn known_callsites() -> usize {
    lock().callsites.len()
}
