//! Serve a directory over HTTP until it goes idle, on a port found for you.
//!
//! The server itself lives in [`timed_serve`]; this crate finds it a port and turns human time
//! expressions into the idle timeout.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod duration;
pub mod error;
pub mod port;

pub use crate::duration::{DEFAULT_TIME_EXPR, format_duration, parse_time_expr};
pub use crate::error::{Error, Result};
pub use crate::port::{
    DEFAULT_PORT_MAX_TRIES, DEFAULT_PORT_RANGE_MAX, DEFAULT_PORT_RANGE_MIN, PortRange,
    SearchConfig, SearchType, find_available_port, is_port_available,
};
