use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfSignError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Document parse error: {0}")]
    DocumentParseError(String),

    #[error("PDF write error: {0}")]
    PdfWriteError(String),

    #[error("Assembly aborted at page {page_index}: {source}")]
    AssemblyAborted {
        page_index: u32,
        #[source]
        source: Box<PdfSignError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`PdfSignError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl PdfSignError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create an unsupported image format error.
    unsupported_image => UnsupportedImageFormat,
    /// Create an invalid placement error.
    invalid_placement => InvalidPlacement,
    /// Create a dimension mismatch error.
    dimension_mismatch => DimensionMismatch,
    /// Create a document parse error.
    document_parse => DocumentParseError,
    /// Create a PDF write error.
    pdf_write => PdfWriteError,
}

impl PdfSignError {
    /// ページ単位の失敗をページインデックス付きでラップする。
    pub fn assembly_aborted(page_index: u32, source: PdfSignError) -> Self {
        Self::AssemblyAborted {
            page_index,
            source: Box::new(source),
        }
    }

    /// AssemblyAbortedの場合、失敗したページインデックスを返す。
    pub fn failed_page(&self) -> Option<u32> {
        match self {
            Self::AssemblyAborted { page_index, .. } => Some(*page_index),
            _ => None,
        }
    }
}

impl From<lopdf::Error> for PdfSignError {
    fn from(e: lopdf::Error) -> Self {
        Self::DocumentParseError(e.to_string())
    }
}

impl From<image::ImageError> for PdfSignError {
    fn from(e: image::ImageError) -> Self {
        Self::UnsupportedImageFormat(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfSignError>;
