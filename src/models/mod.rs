pub mod announcement;
pub mod company;
pub mod contact;
pub mod event;
pub mod opportunity;
