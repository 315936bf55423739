//! Buoyant density shift of taxa between labeled and control gradients.

pub mod delta_bd;

pub use delta_bd::{delta_bd, delta_bd_formatted, DeltaBdConfig};
