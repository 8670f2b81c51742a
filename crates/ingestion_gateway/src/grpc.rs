mod auth;
mod conversions;
mod fleet_handler;
mod server;
mod session;

pub use auth::*;
pub use conversions::*;
pub use fleet_handler::*;
pub use server::*;
pub use session::*;
