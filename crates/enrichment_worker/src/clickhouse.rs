mod usage_record_repository;

pub use usage_record_repository::*;
