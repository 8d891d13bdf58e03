//! Integration tests driving complete stack scripts.

mod common;

mod deferred_tests;
mod ordering_tests;
mod scope_tests;
mod script_tests;
