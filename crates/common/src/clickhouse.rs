mod client;
mod migration;

pub use client::*;
pub use migration::*;
