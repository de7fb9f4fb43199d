pub mod cancellation;
pub mod channel;
pub mod thread_context;
pub mod threads;
