pub mod io;

pub use io::{JsonlWriter, open_reader, open_writer};
