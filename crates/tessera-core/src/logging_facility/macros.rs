//! Boundary events for store operations
//!
//! An operation that crosses the store boundary (a commit, a pool checkout,
//! a migration run) logs one `start` event and exactly one closing event,
//! either `end` or `end_error`. All three carry `component` (the calling
//! module path), `op` and `event`. Closing events add `duration_ms`, and
//! failures add `err_kind`, `err_code` and `err_message` taken from the
//! [`ExError`](crate::errors::ExError). Any further `key = value` pairs go
//! to `tracing` untouched, so `?value` and `%value` work as usual.
//!
//! The expansions are statements; inside a match arm wrap them in a block.

#[doc(hidden)]
#[macro_export]
macro_rules! __op_event {
    ($level:ident, $event:expr, $op:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event,
            $($($field)*)?
        )
    };
}

/// Opens an operation
///
/// ```
/// # use tessera_core::log_op_start;
/// let staged = 3;
/// log_op_start!("commit");
/// log_op_start!("commit", inserts = staged, table = "tags");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__op_event!(
            info,
            tessera_core_types::schema::EVENT_START,
            $op
            $(, $($field)*)?
        );
    };
}

/// Closes an operation that succeeded; `duration_ms` is required
///
/// ```
/// # use tessera_core::log_op_end;
/// log_op_end!("pool_shutdown", duration_ms = 2);
/// log_op_end!("migrate", duration_ms = 15, applied = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__op_event!(
            info,
            tessera_core_types::schema::EVENT_END,
            $op,
            duration_ms = $duration
            $(, $($field)*)?
        );
    };
}

/// Closes an operation that failed
///
/// The error is borrowed, so the caller can log it and still return it.
///
/// ```
/// # use tessera_core::log_op_error;
/// # use tessera_core::errors::{ExError, ExErrorKind};
/// let timed_out = ExError::new(ExErrorKind::PoolExhausted).with_op("acquire");
/// log_op_error!("acquire", &timed_out, duration_ms = 5000, pool_size = 4);
/// assert_eq!(timed_out.code(), "ERR_POOL_EXHAUSTED");
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let failure: &$crate::errors::ExError = $err;
        $crate::__op_event!(
            error,
            tessera_core_types::schema::EVENT_END_ERROR,
            $op,
            duration_ms = $duration,
            err_kind = ?failure.kind(),
            err_code = failure.code(),
            err_message = failure.message()
            $(, $($field)*)?
        );
    }};
}
