mod convert;
mod stream;

pub use stream::StreamingBackend;
