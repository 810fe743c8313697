pub mod record;
pub mod variant;

pub use record::{
    DEFAULT_SEED_CONFIDENCE, FILENAME_SOURCE, MetadataRecord, ParsedFilename,
    parse_published_date,
};
pub use variant::{BookGroup, BookVariant, FileFormat};
