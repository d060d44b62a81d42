//! Background tasks.

pub mod availability_poller;
