pub mod aggregator;
pub mod costing;
pub mod estimator;
pub mod optimizer;
pub mod pricing;
pub mod substitution;

pub use estimator::{
    CostUpdate, EstimateService, GenerateEstimate, LineInput, MachineryInput, MaterialInput,
};
pub use optimizer::OptimizeRequest;
