pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod placement;
pub mod signature;

pub use error::{PdfSignError, Result};
