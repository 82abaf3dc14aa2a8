//! # mysql-testing
//!
//! Test support for the MySQL driver: a scripted mock server that speaks
//! the wire protocol over real TCP, so client, executor, and pool code
//! can be exercised end to end without a database.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock_server;

pub use mock_server::{
    MOCK_SCRAMBLE, MockCell, MockColumn, MockResponse, MockServer, MockServerBuilder,
    MockServerError,
};
