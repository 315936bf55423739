//! Count transforms applied before the SIP pipelines.
//!
//! - **Relative abundance**: total sum scaling within each fraction sample
//! - **qPCR**: rescaling relative abundances to absolute gene copies

pub mod qpcr;
pub mod relative;

pub use qpcr::{qpcr_rescale, read_qpcr_tsv};
pub use relative::{relative_abundance, sample_totals};
