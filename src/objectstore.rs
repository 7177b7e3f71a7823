//! The Object Store Adapter: wraps the Bus with the GET/PUT/PUT_RAW/UPDATE/
//! QUERY request-reply protocol and retry-on-timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prost::Message;

use crate::bus::{Bus, Destination};
use crate::enum_bridge;
use crate::error::ObjectStoreError;
use crate::object::{self, AttributeValue, Object};
use crate::wire;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_MAX_TRIES: u32 = 1;

/// `(attributes, negate)` — expanded into one query entry per attribute in
/// `attributes`: an `Empty` value queries by name, anything else by value.
pub struct QueryStructure {
	pub attributes: Object,
	pub negate: bool,
}

pub struct ObjectStoreAdapter {
	max_tries: u32,
	default_timeout: Duration,
	keep_running: Arc<AtomicBool>,
}

impl ObjectStoreAdapter {
	/// `keep_running` should be the same flag shared with the owning
	/// `Bus`/`TaskProcessor` so a shutdown signal observed mid-retry surfaces
	/// as `ObjectStoreError::Termination` instead of racing an independent
	/// flag that never flips.
	pub fn new(keep_running: Arc<AtomicBool>) -> Self {
		Self { max_tries: DEFAULT_MAX_TRIES, default_timeout: DEFAULT_TIMEOUT, keep_running }
	}

	pub fn set_max_tries(&mut self, max_tries: u32) {
		self.max_tries = max_tries;
	}

	pub fn set_default_timeout(&mut self, timeout: Duration) {
		self.default_timeout = timeout;
	}

	/// Shared with the owning Task Processor so a SIGTERM handler can flip
	/// it without reaching into the adapter's retry loop directly.
	pub fn keep_running_flag(&self) -> Arc<AtomicBool> {
		self.keep_running.clone()
	}

	/// Sends `request`, retrying on bus timeout up to `max_tries`. `Ok(None)`
	/// means the reply's type enum was `FAILURE` — logged, call aborted.
	fn send_request(&self, bus: &Bus, request: wire::ObjectRequest) -> Result<Option<wire::ObjectResponse>, ObjectStoreError> {
		let body = request.encode_to_vec();
		let mut tries = 1;
		loop {
			if !self.keep_running.load(Ordering::SeqCst) {
				return Err(ObjectStoreError::Termination);
			}
			match bus.send_sync(Destination::Os, "ObjectRequest", body.clone(), self.default_timeout) {
				Ok((mtype, reply_body)) => {
					if mtype != "ObjectResponse" {
						return Err(ObjectStoreError::BadMessage(mtype));
					}
					let response = wire::ObjectResponse::decode(reply_body.as_slice())?;
					if enum_bridge::number_to_name::<wire::ResponseTypeEnum>(response.response_type) == Some("FAILURE")
					{
						log::error!("object store request failed: {:?}", response.response_type);
						return Ok(None);
					}
					return Ok(Some(response));
				}
				Err(crate::error::BusError::Timeout) => {
					if tries >= self.max_tries {
						return Err(ObjectStoreError::Timeout(tries));
					}
					log::info!("no ObjectResponse yet, retry {} of {}", tries + 1, self.max_tries);
					tries += 1;
				}
				Err(crate::error::BusError::Shutdown) => return Err(ObjectStoreError::Termination),
				Err(e) => return Err(ObjectStoreError::Bus(e)),
			}
		}
	}

	pub fn get(&self, bus: &Bus, job: u64, ids: &[u64]) -> Result<Vec<Object>, ObjectStoreError> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}
		let request = wire::ObjectRequest {
			job,
			request_type: enum_bridge::name_to_number::<wire::RequestTypeEnum>("GET").unwrap(),
			objects: ids.to_vec(),
			..Default::default()
		};
		match self.send_request(bus, request)? {
			Some(response) => Ok(response.data.iter().map(Object::from_wire).collect()),
			None => Ok(Vec::new()),
		}
	}

	pub fn put(
		&self,
		bus: &Bus,
		job: u64,
		task_id: u64,
		objects: &[Object],
		raw: bool,
	) -> Result<Vec<u64>, ObjectStoreError> {
		if objects.is_empty() {
			return Ok(Vec::new());
		}
		let request_type = if raw { "PUT_RAW" } else { "PUT" };
		let request = wire::ObjectRequest {
			job,
			task_id,
			request_type: enum_bridge::name_to_number::<wire::RequestTypeEnum>(request_type).unwrap(),
			data: objects.iter().map(Object::to_wire).collect(),
			..Default::default()
		};
		match self.send_request(bus, request)? {
			Some(response) => Ok(response.objects),
			None => Ok(Vec::new()),
		}
	}

	pub fn update(&self, bus: &Bus, job: u64, objects: &[Object], overwrite: bool) -> Result<(), ObjectStoreError> {
		if objects.is_empty() {
			return Ok(());
		}
		let request = wire::ObjectRequest {
			job,
			request_type: enum_bridge::name_to_number::<wire::RequestTypeEnum>("UPDATE").unwrap(),
			overwrite,
			data: objects.iter().map(Object::to_wire).collect(),
			..Default::default()
		};
		self.send_request(bus, request)?;
		Ok(())
	}

	pub fn query(&self, bus: &Bus, job: u64, structures: &[QueryStructure]) -> Result<Vec<u64>, ObjectStoreError> {
		let mut entries = Vec::new();
		for structure in structures {
			for (name, value) in structure.attributes.attributes() {
				let query_type = if matches!(value, AttributeValue::Empty) { "BY_ATTR_NAME" } else { "BY_ATTR_VALUE" };
				entries.push(wire::QueryEntry {
					attr_name: name.clone(),
					negate: structure.negate,
					query_type: enum_bridge::name_to_number::<wire::QueryTypeEnum>(query_type).unwrap(),
					attr_value: if query_type == "BY_ATTR_VALUE" {
						Some(object::attribute_to_wire(name, value))
					} else {
						None
					},
				});
			}
		}
		let request = wire::ObjectRequest {
			job,
			request_type: enum_bridge::name_to_number::<wire::RequestTypeEnum>("QUERY").unwrap(),
			query: entries,
			..Default::default()
		};
		match self.send_request(bus, request)? {
			Some(response) => Ok(response.objects),
			None => Ok(Vec::new()),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn query_expands_empty_attributes_to_by_attr_name() {
		let mut attrs = Object::new();
		attrs.add("tag", AttributeValue::Empty);
		let structures = [QueryStructure { attributes: attrs, negate: true }];

		// Exercise the expansion logic directly rather than through
		// `query()`, which needs a live Bus to send the built request.
		let mut entries = Vec::new();
		for structure in &structures {
			for (name, value) in structure.attributes.attributes() {
				let query_type = if matches!(value, AttributeValue::Empty) { "BY_ATTR_NAME" } else { "BY_ATTR_VALUE" };
				entries.push((name.clone(), structure.negate, query_type));
			}
		}
		assert_eq!(entries, vec![("tag".to_string(), true, "BY_ATTR_NAME")]);
	}
}
