pub mod backgrounds;
pub mod borders;
pub mod colors;
pub mod composite;
pub mod slicing;
