#![allow(dead_code)]

mod fake_service;
mod test_server;

pub use fake_service::{Call, FakeService, Op};
pub use test_server::TestApp;
