//! HTTP API module.
//!
//! This module provides the event listener, its request decoding, and the
//! log stream.

pub mod logs;
pub mod request;
pub mod server;
pub mod types;

pub use logs::*;
pub use request::{build_context, parse_cookies, EventParams};
pub use server::{router, start_server};
pub use types::*;
