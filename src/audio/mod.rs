pub mod aggregate;
pub mod source;
pub mod transform;
pub mod window;
