pub mod credentials;
pub mod log_buffer;
pub mod notifier;
