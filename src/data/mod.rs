//! Data structures for SIP gradient analysis.

mod abundance;
mod count_matrix;
mod fraction;
mod metadata;
mod predicate;
mod result;

pub use abundance::{
    AbundanceRow, AbundanceTable, COUNT_COLUMN, DENSITY_COLUMN, SAMPLE_COLUMN, TAXON_COLUMN,
};
pub use count_matrix::CountMatrix;
pub use fraction::{FractionRecord, FractionTable};
pub use metadata::{Metadata, SampleView, Variable, VariableType};
pub use predicate::{CompareOp, ControlExpr, ControlPredicate, Literal};
pub use result::{
    AtomExcess, AtomExcessRow, BootstrapResults, BootstrapRow, DeltaBdResult, DeltaBdResultSet,
    WTable, WeightedDensity,
};
