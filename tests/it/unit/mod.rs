//! Unit tests for gridstore.

mod cache_tests;
mod config_tests;
mod row_store_tests;
mod smart_delete_tests;
mod validation_tests;
