pub mod csv_parser;
pub mod dedup;
pub mod field_compare;
pub mod normalize;
pub mod upload_processor;

pub use csv_parser::CsvIngestor;
pub use upload_processor::{UploadOptions, UploadProcessor, UploadReport};
