//! Domain models for the carelink core.

mod appointment;
mod notification;

pub use appointment::*;
pub use notification::*;
