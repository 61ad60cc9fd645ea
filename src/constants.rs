//! Application constants

/// Wire discriminator identifying a code patch message among other traffic on
/// the shared channel.
pub const PATCH_MESSAGE_TYPE: &str = "UpdateCompilation";

/// Maximum attempts when reading a source file whose writer may still hold a
/// transient lock.
pub const READ_RETRY_ATTEMPTS: u32 = 10;

/// Fixed delay between file read attempts in milliseconds.
pub const READ_RETRY_DELAY_MS: u64 = 100;

/// Upper bound for a single inbound patch frame (64MB) - generously large to
/// admit typical delta sizes.
pub const MAX_PATCH_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Default timeout for the consumer's initial channel connection, in
/// milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Source file extensions that participate in patch attempts by default.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["rs"];
