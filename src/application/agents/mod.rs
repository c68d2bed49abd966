// Chat command handling
pub mod command_listener;
// Periodic signal delivery
pub mod signal_scheduler;

pub use command_listener::{CommandListener, HELP_MESSAGE, NO_SIGNAL_MESSAGE};
pub use signal_scheduler::SignalScheduler;
