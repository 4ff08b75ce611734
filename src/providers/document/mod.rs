pub mod docling;
pub mod pdf;

pub use docling::DoclingConverter;
pub use pdf::PdfExtractConverter;
