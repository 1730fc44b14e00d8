pub mod phase;
pub mod project;
pub mod reminder;
pub mod schedule;
pub mod wire;
