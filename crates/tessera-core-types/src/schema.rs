//! Canonical field keys and event names for structured logging

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Data-access context
pub const FIELD_TABLE: &str = "table";
pub const FIELD_SQL: &str = "sql";
pub const FIELD_ROWS: &str = "rows";
pub const FIELD_ENTITY_ID: &str = "entity_id";

// Pool context
pub const FIELD_POOL_SIZE: &str = "pool_size";
pub const FIELD_IDLE: &str = "idle";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
