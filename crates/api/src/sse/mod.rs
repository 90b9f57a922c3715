//! Server-Sent Events plumbing for run output.

pub mod publisher;
