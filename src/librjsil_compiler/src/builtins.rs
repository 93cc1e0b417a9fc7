//! Static name tables consulted during free-identifier resolution. The
//! tables themselves are generated at build time; see `build.rs`.

include!(concat!(env!("OUT_DIR"), "/builtin_tables.rs"));

/// The builtin an unrecognized free identifier is replaced with when the
/// placeholder policy is enabled.
pub const PLACEHOLDER: &str = "placeholder";

/// Whether `name` is a global the compiler will emit a builtin load for.
pub fn is_recognized_global(name: &str) -> bool {
    RECOGNIZED_GLOBALS.contains(name)
}

/// Whether `name` (already stripped of its `%` prefix) is one of the
/// curated engine intrinsics.
pub fn is_v8_native(name: &str) -> bool {
    V8_NATIVES.contains(name)
}
