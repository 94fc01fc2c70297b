pub mod photo;
pub mod pin;
