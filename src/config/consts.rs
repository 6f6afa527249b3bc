/// Directory searched for channel units when no search path is configured.
pub const DEFAULT_MODULE_DIR: &str = "/usr/lib/channel-hub";
/// Environment variable holding extra unit directories, `:`-separated.
pub const MODULE_PATH_ENV: &str = "CHANNEL_HUB_MODULE_PATH";
/// Default fuel per call into a WASM unit (10 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 10_000_000;
/// Minimum allowed fuel level (100 thousand instructions)
pub const MIN_FUEL_LEVEL: u64 = 100_000;
/// Maximum allowed fuel level (500 million instructions) - security limit
pub const MAX_FUEL_LEVEL: u64 = 500_000_000;
/// Maximum allowed WASM unit size (16MB)
pub const MAX_UNIT_SIZE: usize = 16 * 1024 * 1024;
/// Consecutive zero-byte writes a tee child may return before the write fails
pub const DEFAULT_MAX_STALLED_WRITES: u32 = 64;
