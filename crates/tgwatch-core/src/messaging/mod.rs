//! Outbound side: notices delivered to the notes destination.

pub mod port;
pub mod throttled;
pub mod types;
