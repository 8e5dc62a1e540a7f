//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the admin server
//! is up.
//!
//! # Tasks
//! - Expiry sweep: drops expired in-process entries at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
