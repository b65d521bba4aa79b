pub mod attendance;
pub mod backup;
pub mod core;
pub mod curriculum;
pub mod grades;
pub mod gradesheet;
pub mod notes;
pub mod settings;
pub mod stars;
pub mod status;
pub mod students;
