//! Extraction service gateway and response archive handling.

pub mod archive;
pub mod gateway;

pub use archive::ExtractionArchive;
pub use gateway::{Extractor, HttpExtractionGateway, ImagePart};
