//! Table formatting: control classification, numeric casting, density filtering.

pub mod table;

pub use table::format_table;
