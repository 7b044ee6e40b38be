pub mod frame;
pub mod terminal;
