//! Package orchestration: writer, reader, and their I/O plumbing.

pub mod io;
pub mod reader;
pub mod writer;

pub use io::{ItemSource, TempStorage};
pub use reader::PackageReader;
pub use writer::PackageWriter;
