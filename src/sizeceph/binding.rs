//! Process-wide binding to the native sizeceph shared library
//!
//! The native codec ships as `sizeceph.so` and exposes three C entry points
//! that must be resolved together or not at all:
//!
//! | Symbol | Role |
//! |--------|------|
//! | `size_split` | transform an input region into nine shards |
//! | `size_restore` | rebuild the input from a shard-pointer vector |
//! | `size_can_get_restore_fn` | answer whether a pattern is restorable |
//!
//! One process-wide state cell holds the library handle, the resolved
//! function pointers and a reference count. Codec instances acquire a
//! [`BindingGuard`] at init; the library is opened on the first acquire and
//! closed when the last guard drops. The guard carries its own copy of the
//! function pointers, so the encode/decode data path never touches the
//! mutex — the mutex only serializes load, unload and reference counting.
//!
//! With the `mock-codec` feature (or under `cfg(test)`) the loader installs
//! the pure-Rust entry points from [`super::mock`] instead of dlopening.

use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment override consulted before the fixed search list.
pub const LIBRARY_PATH_ENV: &str = "SIZECEPH_LIBRARY_PATH";

/// Candidate paths, system locations first, development fallbacks last.
pub const LIBRARY_SEARCH_PATHS: &[&str] = &[
    "/usr/local/lib/sizeceph.so",
    "/usr/lib/sizeceph.so",
    "/usr/lib/x86_64-linux-gnu/sizeceph.so",
    // bare soname: let the dynamic linker search LD_LIBRARY_PATH
    "sizeceph.so",
    "./sizeceph.so",
];

pub(crate) type SizeSplitFn = unsafe extern "C" fn(*mut *mut u8, *const u8, u32);
pub(crate) type SizeRestoreFn = unsafe extern "C" fn(*mut u8, *const *const u8, u32) -> i32;
pub(crate) type SizeCanRestoreFn = unsafe extern "C" fn(*const *const u8) -> i32;

/// The three entry points, populated together or not at all.
#[derive(Clone, Copy)]
pub(crate) struct NativeFns {
    pub split: SizeSplitFn,
    pub restore: SizeRestoreFn,
    pub can_restore: SizeCanRestoreFn,
}

struct BindingState {
    // Held only to keep the mapping open; the data path goes through the
    // raw pointers in `fns`, which stay valid while `library` is alive.
    library: Option<libloading::Library>,
    fns: Option<NativeFns>,
    ref_count: usize,
}

static BINDING: Lazy<Mutex<BindingState>> = Lazy::new(|| {
    Mutex::new(BindingState {
        library: None,
        fns: None,
        ref_count: 0,
    })
});

/// Whether the native entry points are currently resolved.
pub fn is_loaded() -> bool {
    BINDING.lock().map(|s| s.fns.is_some()).unwrap_or(false)
}

/// Number of live codec instances holding the binding open.
pub fn ref_count() -> usize {
    BINDING.lock().map(|s| s.ref_count).unwrap_or(0)
}

// =============================================================================
// Binding Guard
// =============================================================================

/// RAII handle tying the library lifetime to a codec instance.
///
/// Holds a copy of the resolved function pointers; the reference count
/// guarantees the library is not closed while any copy is live.
pub(crate) struct BindingGuard {
    fns: NativeFns,
}

impl BindingGuard {
    /// Load the library if needed and register one more holder.
    pub fn acquire() -> Result<Self> {
        let mut state = BINDING
            .lock()
            .map_err(|_| Error::LibraryUnavailable("binding state poisoned".to_string()))?;

        if state.fns.is_none() {
            load_into(&mut state)?;
        }
        let fns = state
            .fns
            .ok_or_else(|| Error::LibraryUnavailable("entry points not resolved".to_string()))?;
        state.ref_count += 1;
        Ok(BindingGuard { fns })
    }

    pub fn fns(&self) -> &NativeFns {
        &self.fns
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = BINDING.lock() {
            state.ref_count = state.ref_count.saturating_sub(1);
            if state.ref_count == 0 {
                state.fns = None;
                if state.library.take().is_some() {
                    debug!("sizeceph library unloaded");
                }
            }
        }
    }
}

impl std::fmt::Debug for BindingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingGuard").finish_non_exhaustive()
    }
}

// =============================================================================
// Loaders
// =============================================================================

#[cfg(not(any(test, feature = "mock-codec")))]
fn load_into(state: &mut BindingState) -> Result<()> {
    debug!("loading sizeceph library");
    let mut last_error = String::from("no candidate paths");
    let mut library = None;

    if let Ok(path) = std::env::var(LIBRARY_PATH_ENV) {
        match unsafe { libloading::Library::new(&path) } {
            Ok(lib) => {
                debug!(%path, "sizeceph library loaded from environment override");
                library = Some(lib);
            }
            Err(e) => {
                debug!(%path, error = %e, "environment override path failed");
                last_error = e.to_string();
            }
        }
    }

    if library.is_none() {
        for path in LIBRARY_SEARCH_PATHS.iter().copied() {
            match unsafe { libloading::Library::new(path) } {
                Ok(lib) => {
                    debug!(path, "sizeceph library loaded");
                    library = Some(lib);
                    break;
                }
                Err(e) => last_error = e.to_string(),
            }
        }
    }

    let library = library
        .ok_or_else(|| Error::LibraryUnavailable(format!("cannot open library: {last_error}")))?;

    // Resolve all three symbols before publishing any of them; a partial
    // binding must not escape. Dropping `library` on the error path closes
    // the handle again.
    let fns = unsafe { resolve_symbols(&library) }?;
    state.library = Some(library);
    state.fns = Some(fns);
    Ok(())
}

#[cfg(not(any(test, feature = "mock-codec")))]
unsafe fn resolve_symbols(library: &libloading::Library) -> Result<NativeFns> {
    let split: libloading::Symbol<'_, SizeSplitFn> = library
        .get(b"size_split")
        .map_err(|e| Error::LibraryUnavailable(format!("symbol size_split: {e}")))?;
    let restore: libloading::Symbol<'_, SizeRestoreFn> = library
        .get(b"size_restore")
        .map_err(|e| Error::LibraryUnavailable(format!("symbol size_restore: {e}")))?;
    let can_restore: libloading::Symbol<'_, SizeCanRestoreFn> = library
        .get(b"size_can_get_restore_fn")
        .map_err(|e| Error::LibraryUnavailable(format!("symbol size_can_get_restore_fn: {e}")))?;

    Ok(NativeFns {
        split: *split,
        restore: *restore,
        can_restore: *can_restore,
    })
}

#[cfg(any(test, feature = "mock-codec"))]
fn load_into(state: &mut BindingState) -> Result<()> {
    debug!("installing mock sizeceph entry points");
    state.library = None;
    state.fns = Some(NativeFns {
        split: super::mock::size_split,
        restore: super::mock::size_restore,
        can_restore: super::mock::size_can_get_restore,
    });
    Ok(())
}
