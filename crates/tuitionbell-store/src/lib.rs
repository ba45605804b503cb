//! # TuitionBell Store
//!
//! Backends for the student store and the append-only notification log.
//!
//! - [`PostgrestStore`] — REST access to a Supabase/PostgREST database.
//! - [`SqliteStore`] — embedded database for local or offline use.

pub mod postgrest;
pub mod sqlite;

pub use postgrest::PostgrestStore;
pub use sqlite::SqliteStore;
