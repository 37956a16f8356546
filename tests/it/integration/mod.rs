//! Integration tests for gridstore.

mod concurrency_tests;
