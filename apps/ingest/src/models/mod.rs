pub mod category;
pub mod resume;
