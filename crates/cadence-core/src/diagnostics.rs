use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

static REPORTED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();

/// Log `message` at warn level the first time `key` is seen in this process.
///
/// Used for approximated or unsupported hardware features that a guest may
/// hit thousands of times per frame.
pub fn report_once(key: &'static str, message: impl FnOnce() -> String) {
    let set = REPORTED.get_or_init(|| Mutex::new(HashSet::new()));
    let first = match set.lock() {
        Ok(mut guard) => guard.insert(key),
        Err(poisoned) => poisoned.into_inner().insert(key),
    };
    if first {
        log::warn!("{}", message());
    }
}

/// Returns whether `key` has already been reported.
pub fn was_reported(key: &'static str) -> bool {
    REPORTED
        .get()
        .and_then(|set| set.lock().ok().map(|guard| guard.contains(key)))
        .unwrap_or(false)
}
