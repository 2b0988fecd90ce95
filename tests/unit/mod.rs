pub mod definition_tests;
pub mod reader_tests;
pub mod resolver_tests;
