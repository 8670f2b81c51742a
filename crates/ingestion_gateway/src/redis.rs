mod position_index;

pub use position_index::*;
