//! todo-sv - collaborative project and task service
//!
//! Projects are versioned aggregates stored with optimistic concurrency.
//! Every write is announced as a project event; a distributor fans events
//! out to per-user subjects, and streamers forward them to connected
//! devices.

pub mod bus;
pub mod config;
pub mod distributor;
pub mod events;
pub mod model;
pub mod service;
pub mod storage;
pub mod streamer;
pub mod utils;
