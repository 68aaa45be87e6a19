pub mod eventmodel;
pub mod productmodel;
