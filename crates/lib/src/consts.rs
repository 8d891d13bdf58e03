//! Crate-wide constants.

/// Application name, used as the prefix of every environment variable.
pub const APP_NAME: &str = "fnstack";

/// Length of the truncated SHA-256 prefix used for object identifiers.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Name of the global table exposed to stack scripts.
pub const STACK_GLOBAL: &str = "stack";

/// Metatable `__type` marker for function handles returned to Lua.
pub const FUNCTION_HANDLE_TYPE: &str = "FunctionHandle";

/// Scope used by `stack.func` and by identities without a scope segment.
pub const DEFAULT_SCOPE: &str = "main";

pub const DEFAULT_APP: &str = "app";
pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_ACCOUNT: &str = "000000000000";
pub const DEFAULT_MEMORY_MB: u32 = 1024;
pub const DEFAULT_TIMEOUT_SECS: u32 = 10;

/// Provisioning limits enforced by the plan provisioner.
pub const MAX_IDENTITY_LEN: usize = 64;
pub const MIN_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 10_240;
pub const MAX_TIMEOUT_SECS: u32 = 900;
pub const MAX_RESERVED_CONCURRENCY: u32 = 1000;
pub const MAX_BATCH_SIZE: u32 = 10_000;
