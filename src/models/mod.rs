pub mod catalog;
pub mod estimate;
pub mod pricing;
pub mod substitution;

pub use catalog::{CatalogItem, ItemKind, ItemRef};
pub use estimate::{
    Estimate, EstimateStatus, LineItem, LineKind, MachineryLine, MaterialLine, RentalType,
};
pub use pricing::{PriceHistoryPoint, PriceRecord, RateKind};
pub use substitution::{
    Candidate, NewSubstitution, OptimizationReport, OptimizeFor, Substitution,
};
