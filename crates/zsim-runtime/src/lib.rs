#![forbid(unsafe_code)]

//! Shared runtime support for the zsim workspace.
//!
//! ## Module layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | `log`       | [`init_tracing`], [`LogEntry`] one-line JSON run summaries  |
//! | `tolerance` | [`assert_close`], [`within_tolerance`], relative differences |

pub mod log;
pub mod tolerance;

pub use log::{LogEntry, LogLevel, LogResult, init_tracing, now_unix_ms};
pub use tolerance::{
    assert_close, assert_close_slice, relative_difference, within_tolerance,
};
