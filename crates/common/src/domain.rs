mod pricing;
mod result;
mod telemetry;
mod usage;

pub use pricing::*;
pub use result::*;
pub use telemetry::*;
pub use usage::*;
