pub mod category;
pub mod comment;
pub mod review;
pub mod title;
pub mod user;
