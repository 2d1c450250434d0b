//! FFI bindings for Synheart Behavior
//!
//! This module provides C-compatible functions for driving an [`InteractionEngine`] from
//! other languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `behavior_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::encoder::EventEnvelope;
use crate::error::BehaviorError;
use crate::pipeline::InteractionEngine;
use crate::types::BehaviorEvent;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn events_to_json(events: &[BehaviorEvent]) -> Result<String, BehaviorError> {
    let envelopes = events
        .iter()
        .map(EventEnvelope::from_event)
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string(&envelopes).map_err(BehaviorError::JsonError)
}

fn emitted_count(events: &[BehaviorEvent]) -> i32 {
    i32::try_from(events.len()).unwrap_or(i32::MAX)
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to an InteractionEngine
pub struct BehaviorEngineHandle {
    engine: InteractionEngine,
    /// Emitted events not yet drained by the host
    pending: Vec<BehaviorEvent>,
}

/// Create a new engine.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for the defaults.
/// - Returns a pointer that must be freed with `behavior_engine_free`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_new(config_json: *const c_char) -> *mut BehaviorEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let Some(json) = cstr_to_string(config_json) else {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match InteractionEngine::new(config) {
        Ok(engine) => Box::into_raw(Box::new(BehaviorEngineHandle {
            engine,
            pending: Vec::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_free(engine: *mut BehaviorEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Ingest one JSON primitive `{"kind", "timestamp_ms", "payload"}`.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns the number of behavior events emitted, or -1 if the primitive was rejected.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_ingest(
    engine: *mut BehaviorEngineHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return -1;
    };

    match handle.engine.ingest_json(&json_str) {
        Ok(events) => {
            let count = emitted_count(&events);
            handle.pending.extend(events);
            count
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Fire timers that are due at the current time.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns the number of behavior events emitted, or -1 on a null engine.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_tick(engine: *mut BehaviorEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let events = handle.engine.tick();
    let count = emitted_count(&events);
    handle.pending.extend(events);
    count
}

/// Take every emitted event not yet drained, as a JSON array of wire envelopes.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_drain_events(
    engine: *mut BehaviorEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *engine;

    let events = std::mem::take(&mut handle.pending);
    match events_to_json(&events) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Compute the feature vector of one window as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `window_kind` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_derive_features(
    engine: *mut BehaviorEngineHandle,
    window_kind: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let Some(kind) = cstr_to_string(window_kind) else {
        set_last_error("Invalid window kind pointer");
        return ptr::null_mut();
    };

    let result = handle
        .engine
        .derive_features(&kind)
        .and_then(|features| serde_json::to_string(&features).map_err(BehaviorError::JsonError));
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Derive, baseline and encode a feature snapshot of one window.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `window_kind` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_snapshot(
    engine: *mut BehaviorEngineHandle,
    window_kind: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *engine;

    let Some(kind) = cstr_to_string(window_kind) else {
        set_last_error("Invalid window kind pointer");
        return ptr::null_mut();
    };

    match handle.engine.snapshot_json(&kind) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Force-finalize in-flight gestures and start a new session.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns the number of behavior events emitted, or -1 on a null engine.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_end_session(engine: *mut BehaviorEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let events = handle.engine.end_session();
    let count = emitted_count(&events);
    handle.pending.extend(events);
    count
}

/// Force-finalize in-flight gestures, then empty every window.
///
/// Events emitted by the finalization join the pending queue and are returned
/// by the next `behavior_engine_drain_events`.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns the number of behavior events emitted, or -1 on a null engine.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_clear(engine: *mut BehaviorEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let events = handle.engine.clear();
    let count = emitted_count(&events);
    handle.pending.extend(events);
    count
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by behavior functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a behavior function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn behavior_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next behavior function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn behavior_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn behavior_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        behavior_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        unsafe {
            let engine = behavior_engine_new(ptr::null());
            assert!(!engine.is_null());

            let primitives = [
                r#"{"kind": "app_switch", "timestamp_ms": 1000}"#,
                r#"{"kind": "focus_gained", "timestamp_ms": 1100}"#,
                r#"{"kind": "text_length_delta", "timestamp_ms": 1200, "payload": {"delta": 1}}"#,
            ];
            let mut emitted = 0;
            for json in primitives {
                let json = CString::new(json).unwrap();
                let count = behavior_engine_ingest(engine, json.as_ptr());
                assert!(count >= 0);
                emitted += count;
            }
            assert_eq!(emitted, 1);

            // Typing session is flushed at session end
            assert_eq!(behavior_engine_end_session(engine), 1);

            let drained = take_string(behavior_engine_drain_events(engine));
            let events: serde_json::Value = serde_json::from_str(&drained).unwrap();
            assert_eq!(events.as_array().unwrap().len(), 2);
            assert_eq!(events[0]["event"]["event_type"], "app_switch");
            assert_eq!(events[1]["event"]["event_type"], "typing");

            // Drained events are gone
            let drained = take_string(behavior_engine_drain_events(engine));
            assert_eq!(drained, "[]");

            let kind = CString::new("short").unwrap();
            let features = take_string(behavior_engine_derive_features(engine, kind.as_ptr()));
            assert!(features.contains("tap_rate_norm"));

            let snapshot = take_string(behavior_engine_snapshot(engine, kind.as_ptr()));
            assert!(snapshot.contains("producer"));

            assert!(behavior_engine_tick(engine) >= 0);
            assert_eq!(behavior_engine_clear(engine), 0);
            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_clear_keeps_finalized_events() {
        unsafe {
            let engine = behavior_engine_new(ptr::null());

            for json in [
                r#"{"kind": "focus_gained", "timestamp_ms": 0}"#,
                r#"{"kind": "text_length_delta", "timestamp_ms": 100, "payload": {"delta": 1}}"#,
            ] {
                let json = CString::new(json).unwrap();
                assert_eq!(behavior_engine_ingest(engine, json.as_ptr()), 0);
            }

            assert_eq!(behavior_engine_clear(engine), 1);

            let drained = take_string(behavior_engine_drain_events(engine));
            let events: serde_json::Value = serde_json::from_str(&drained).unwrap();
            assert_eq!(events.as_array().unwrap().len(), 1);
            assert_eq!(events[0]["event"]["event_type"], "typing");

            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let engine = behavior_engine_new(ptr::null());

            let invalid = CString::new(r#"{"kind": "pointer_move", "timestamp_ms": 5}"#).unwrap();
            assert_eq!(behavior_engine_ingest(engine, invalid.as_ptr()), -1);
            let error = behavior_last_error();
            assert!(!error.is_null());
            let message = CStr::from_ptr(error).to_str().unwrap();
            assert!(message.contains("dx"));

            let kind = CString::new("hourly").unwrap();
            assert!(behavior_engine_derive_features(engine, kind.as_ptr()).is_null());
            assert!(!behavior_last_error().is_null());

            assert_eq!(behavior_engine_tick(ptr::null_mut()), -1);
            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_rejects_invalid_config() {
        unsafe {
            let config = CString::new(r#"{"windows": []}"#).unwrap();
            assert!(behavior_engine_new(config.as_ptr()).is_null());
            assert!(!behavior_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = behavior_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
