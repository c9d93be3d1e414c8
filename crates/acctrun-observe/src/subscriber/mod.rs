#[cfg(feature = "subscriber")]
mod journal;
#[cfg(feature = "subscriber")]
mod view;

#[cfg(feature = "subscriber")]
pub use journal::Journal;
#[cfg(feature = "subscriber")]
pub use view::{log_event, message_for};
