pub mod address;
pub mod amount;
pub mod booking;
pub mod clock;
pub mod course;
pub mod errors;
pub mod metadata;
pub mod schedule;
pub mod user;
