//! SQLite-vec extension loader.
//!
//! The only unsafe code in the crate lives here.

use std::ffi::c_char;

use rusqlite::ffi::{sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;

type SqliteExtensionFn =
    unsafe extern "C" fn(*mut sqlite3, *mut *mut c_char, *const sqlite3_api_routines) -> i32;

/// Register sqlite-vec as an auto-loaded extension for every new connection.
///
/// Must run before the index store opens its connection. Registering the same
/// entry point twice is a no-op in `SQLite`, so repeated calls are harmless.
#[allow(unsafe_code)]
pub fn init_sqlite_vec_extension() {
    // SAFETY: sqlite3_auto_extension is a stable SQLite API; sqlite3_vec_init has
    // the extension entry-point signature expected by SQLite.
    unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteExtensionFn>(
            sqlite3_vec_init as *const (),
        )));
    }
}
