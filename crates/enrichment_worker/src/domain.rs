mod enrichment_service;
mod usage_derivation;

pub use enrichment_service::*;
pub use usage_derivation::*;
