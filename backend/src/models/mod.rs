pub mod checksum;
pub mod macros;
pub mod quality;
pub mod table;

pub use checksum::table_fingerprint;
pub use quality::*;
pub use table::{Cell, CellKey, Table};
