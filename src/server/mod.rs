// Server module entry point
// Listener creation, connection handling, and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;

// Re-export commonly used items
pub use connection::accept_connection;
pub use listener::bind_listener;
pub use signal::{start_signal_handler, SignalHandler};
