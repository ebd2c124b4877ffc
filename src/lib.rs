// Library exports for the command line front end and integration tests
pub mod cli;
pub mod config_file;
pub mod error;
pub mod image_processing;
pub mod logging;
pub mod utils;

// Re-export commonly used types
pub use cli::{Args, CatalogTarget};
pub use error::{BatchError, ConfigError, GeometryError, MetadataError, OutputError};
pub use image_processing::aspect::{AspectPolicy, GeometrySpec};
pub use image_processing::batch::{BatchDriver, BatchOptions, BatchReport, NamingMode};
pub use image_processing::catalog::{CatalogRecord, CatalogWriter};
pub use image_processing::geometry::BackendKind;
pub use image_processing::{discover_images, ProcessingConfig};
