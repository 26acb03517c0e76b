pub mod mediatype;
pub mod reader;
pub mod record;
pub mod walker;

pub use mediatype::MediaTypes;
pub use reader::Reader;
pub use record::FileRecord;
pub use walker::Walker;
