pub mod buffer;
pub mod consumer;
pub mod memory;
pub mod throttle;
