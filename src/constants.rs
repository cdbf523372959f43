use std::time::Duration;

// Whole-operation retry bounds
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(200);

// Pool sizing: idle connections are released quickly so a later DROP DATABASE
// is never blocked by a connection this engine is holding open.
pub const POOL_MAX_CONNECTIONS: u32 = 3;
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

// Grant ID encoding tokens
pub const GROUP_TAG: &str = "gn";
pub const USER_TAG: &str = "un";
pub const ROLE_TAG: &str = "rn";
pub const NO_SCHEMA_TOKEN: &str = "noschema";
pub const OBJECT_TYPE_MARKER: &str = "ot:";
