//! cisia-alert - watches the CISIA exam calendar and alerts subscribers on
//! Telegram when CENT@CASA seats open up.
//!
//! The core is a poll-detect-notify loop:
//! - `feed`: calendar page fetch and availability extraction
//! - `task`: the polling loop with edge-triggered alerts
//! - `dispatch`: per-recipient delivery with retries and eviction
//! - `repository` and `service`: the persisted subscriber list and flag

pub mod bot;
pub mod config;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod feed;
pub mod logging;
pub mod repository;
pub mod service;
pub mod task;
