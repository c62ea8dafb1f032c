pub mod api;
pub mod config;
pub mod console;
pub mod flag_definitions;
pub mod flag_matching;
pub mod mutation_request;
pub mod override_list;
pub mod rollout;
pub mod segment_combination;
pub mod store;
pub mod value_coercion;

// Not #[cfg(test)]: the tests/ directory uses these helpers too.
pub mod test_utils;
