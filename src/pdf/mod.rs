pub mod compositor;
pub mod overlay;
pub mod reader;
