#![forbid(unsafe_code)]

pub mod accel_engine;
pub mod bridge_hook;
pub mod classify;
pub mod control_service_impl;
pub mod dispatch;
pub mod establish;
pub mod hierarchy;
pub mod sync_pipeline;
