//! Process exit codes.
//!
//! The numbering is shared with other board tooling so scripts can tell a
//! bad argument apart from a broken installation.

/// Any failure without a more specific code.
pub const GENERIC: i32 = 1;

/// The hardware catalog or a required tool could not be set up.
pub const CORE_CONFIG: i32 = 5;

/// A command-line argument was malformed.
pub const BAD_ARGUMENT: i32 = 6;
