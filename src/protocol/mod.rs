/// MongoDB wire protocol parsing
pub mod buffer;
pub mod header;

pub use buffer::RingBuffer;
pub use header::{MessageHeader, OpCode, STANDARD_HEADER_SIZE};
