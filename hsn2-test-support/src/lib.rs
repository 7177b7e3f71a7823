//! Shared fixtures for tests that need a real broker connection.
//!
//! Mirrors the teacher's `test-common` crate: a process-wide mutex so AMQP
//! integration tests don't trample each other's queues, plus the connection
//! parameters tests share.

use std::env;
use std::sync::{Mutex, MutexGuard};

use async_amqp::LapinAsyncStdExt;
use once_cell::sync::Lazy;

pub const TEST_SERVICE_QUEUE: &str = "srv-hsn2-test:l";
pub const TEST_FW_QUEUE: &str = "fw:l";
pub const TEST_OS_QUEUE: &str = "os:l";

static TEST_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl<'a> TestGuard<'a> {
	pub fn lock() -> Self {
		TestGuard(TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner()))
	}
}

pub fn amqp_addr() -> String {
	env::var("HSN2_TEST_AMQP_ADDR").unwrap_or_else(|_| "amqp://127.0.0.1:5672".to_string())
}

pub fn amqp_connection() -> Result<lapin::Connection, lapin::Error> {
	lapin::Connection::connect(&amqp_addr(), lapin::ConnectionProperties::default().with_async_std()).wait()
}
