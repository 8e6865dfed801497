pub mod assignments;
pub mod core;
pub mod courses;
pub mod grades;
pub mod schedule;
pub mod students;
