//! Device memory access through the console menus.

pub mod dump;
pub mod write;

pub use dump::{DumpResult, ShortBlock, dump_count, parse_dump_line};
pub use write::{chunk_hex, chunks, write_memory};
