pub mod http;
pub mod pricing;
pub mod pricing_oracle;

pub use pricing_oracle::*;
