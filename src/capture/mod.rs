pub mod format;
pub mod source;

pub use source::validate_model;
pub use source::CaptureSource;
