mod pricing_client;

pub use pricing_client::*;
