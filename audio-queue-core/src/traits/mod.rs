pub mod engine_delegate;
pub mod queue_device;
