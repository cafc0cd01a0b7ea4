pub mod assignment;
pub mod presence;
pub mod queries;
pub mod ratings;
