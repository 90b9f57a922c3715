//! HTTP surface of the script runner: script CRUD, run control and
//! Server-Sent Events output streaming.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod sse;
pub mod state;
