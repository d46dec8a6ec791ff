pub mod backup;
pub mod catalog;
pub mod core;
pub mod faculty;
pub mod students;
