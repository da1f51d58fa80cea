//! HTTP server wiring: router, middleware stack and the listener loop.

pub mod middleware;
pub mod router;
