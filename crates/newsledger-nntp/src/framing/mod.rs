//! Line and body framing over async transports.

mod dot;
mod framed;

pub use dot::{DotReader, DotWriter};
pub use framed::{COMMAND_LINE_LIMIT, DEFAULT_LINE_LIMIT, FramedReader, FramedStream, FramedWriter};
