pub mod sink;

pub use sink::EncodeSink;
