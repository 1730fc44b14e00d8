pub mod projects;
pub mod sync;
