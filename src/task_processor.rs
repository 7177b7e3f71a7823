//! The Task Processor: one worker's receive -> accept -> process -> update
//! -> complete/error state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prost::Message;

use crate::bus::{Bus, Delivery, Destination};
use crate::datastore::DataStoreAdapter;
use crate::error::TaskProcessError;
use crate::object::{self, Object};
use crate::objectstore::{ObjectStoreAdapter, QueryStructure};
use crate::wire;

const SERVICE_QUEUE_POLL: Duration = Duration::from_millis(200);

/// Per-task state handed to the user's `TaskHandler`: the request being
/// serviced, the objects it fetched, and the ids of anything it PUTs.
pub struct TaskContext {
	pub current_task: wire::TaskRequest,
	pub objects: Vec<Object>,
	new_objects: Vec<u64>,
}

/// A bounded facade over the Object Store and Data Store, scoped to one
/// task, so a `TaskHandler` never has to juggle `job`/`task_id` by hand.
pub struct TaskApi<'a> {
	bus: &'a Bus,
	object_store: &'a ObjectStoreAdapter,
	datastore: &'a DataStoreAdapter,
	job: u64,
	task_id: u64,
	new_objects: &'a mut Vec<u64>,
}

impl<'a> TaskApi<'a> {
	pub fn datastore(&self) -> &DataStoreAdapter {
		self.datastore
	}

	/// PUTs `objects` and records the ids the Object Store assigns into the
	/// task's `newObjects`.
	pub fn put(&mut self, objects: &[Object], raw: bool) -> Result<Vec<u64>, TaskProcessError> {
		let ids = self.object_store.put(self.bus, self.job, self.task_id, objects, raw)?;
		self.new_objects.extend(ids.iter().copied());
		Ok(ids)
	}

	pub fn get(&self, ids: &[u64]) -> Result<Vec<Object>, TaskProcessError> {
		Ok(self.object_store.get(self.bus, self.job, ids)?)
	}

	pub fn query(&self, structures: &[QueryStructure]) -> Result<Vec<u64>, TaskProcessError> {
		Ok(self.object_store.query(self.bus, self.job, structures)?)
	}
}

/// User-supplied task logic. `process` may mutate `ctx.objects` in place
/// and PUT new ones via `api`; its return value becomes `TaskCompleted`'s
/// warnings list.
pub trait TaskHandler: Send {
	fn process(&mut self, ctx: &mut TaskContext, api: &mut TaskApi) -> Result<Vec<String>, TaskProcessError>;

	/// Overridable hook run once after the main loop exits, mirroring the
	/// original's `cleanup()`.
	fn cleanup(&mut self) {}
}

/// Boolean coercion for task parameters; failure is reported as `PARAMS`.
pub fn param_to_bool(name: &str, value: &str) -> Result<bool, TaskProcessError> {
	object::to_bool_value(value).map_err(|_| TaskProcessError::Param(name.to_string()))
}

enum Outcome {
	Continue,
	ExitGraceful,
	ExitFatal(String),
}

/// One instance per worker process: owns its own Bus, Object Store
/// Adapter, and Data Store Adapter — nothing here is shared across workers.
pub struct TaskProcessor<H: TaskHandler> {
	bus: Bus,
	object_store: ObjectStoreAdapter,
	datastore: DataStoreAdapter,
	service_queue: String,
	handler: H,
	keep_running: Arc<AtomicBool>,
	last_error: Option<String>,
}

impl<H: TaskHandler> TaskProcessor<H> {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		host: &str,
		port: Option<u16>,
		datastore_address: &str,
		service_name: &str,
		service_queue: &str,
		object_store_queue: &str,
		handler: H,
	) -> Result<Self, crate::error::BusError> {
		// One shutdown flag shared by the Bus (whose send_sync poll loop
		// must notice shutdown mid-request) and the Object Store adapter
		// (whose retry loop must surface Termination instead of Timeout).
		let keep_running = Arc::new(AtomicBool::new(true));
		let bus = Bus::connect_with_keep_running(host, port, Some(service_name), keep_running.clone())?;
		bus.set_os_queue(object_store_queue);
		Ok(Self {
			bus,
			object_store: ObjectStoreAdapter::new(keep_running.clone()),
			datastore: DataStoreAdapter::new(datastore_address),
			service_queue: service_queue.to_string(),
			handler,
			keep_running,
			last_error: None,
		})
	}

	/// The single shutdown flag shared by this processor's run loop, its
	/// Bus, and its Object Store adapter.
	pub fn keep_running_flag(&self) -> Arc<AtomicBool> {
		self.keep_running.clone()
	}

	/// Kept as a distinct accessor for callers that historically wired the
	/// Object Store adapter's flag separately; it is now the same flag as
	/// [`TaskProcessor::keep_running_flag`].
	pub fn object_store_keep_running_flag(&self) -> Arc<AtomicBool> {
		self.object_store.keep_running_flag()
	}

	pub fn last_error(&self) -> Option<&str> {
		self.last_error.as_deref()
	}

	/// Registers a listener on the service queue and drives the task state
	/// machine until `keep_running` is cleared or a non-classified error
	/// propagates. Closes the Bus and runs `cleanup()` on the way out.
	pub fn run(&mut self) {
		let service_queue = self.service_queue.clone();
		if let Err(e) = self.bus.configure_listener(&service_queue) {
			log::error!("worker terminating: {}", e);
			self.last_error = Some(e.to_string());
			let _ = self.bus.close();
			self.handler.cleanup();
			return;
		}
		loop {
			if !self.keep_running.load(Ordering::SeqCst) {
				break;
			}
			match self.bus.receive(&service_queue, SERVICE_QUEUE_POLL) {
				Ok(Some(delivery)) => match self.process_message(delivery) {
					Outcome::Continue => {}
					Outcome::ExitGraceful => break,
					Outcome::ExitFatal(message) => {
						log::error!("worker terminating: {}", message);
						self.last_error = Some(message);
						break;
					}
				},
				Ok(None) => continue,
				Err(e) => {
					log::error!("worker terminating: {}", e);
					self.last_error = Some(e.to_string());
					break;
				}
			}
		}
		let _ = self.bus.close();
		self.handler.cleanup();
	}

	fn process_message(&mut self, delivery: Delivery) -> Outcome {
		if delivery.mtype != "TaskRequest" {
			let _ = delivery.ack();
			let _ = self.send_task_error(0, 0, "DEFUNCT", &format!("Bad message type received {}.", delivery.mtype));
			return Outcome::Continue;
		}
		let task = match wire::TaskRequest::decode(delivery.body.as_slice()) {
			Ok(task) => task,
			Err(e) => {
				let _ = delivery.ack();
				let _ = self.send_task_error(0, 0, "DEFUNCT", &format!("could not decode TaskRequest: {}", e));
				return Outcome::Continue;
			}
		};

		let mut ctx = TaskContext { current_task: task.clone(), objects: Vec::new(), new_objects: Vec::new() };

		let accepted = wire::TaskAccepted { task_id: task.task_id, job: task.job };
		if let Err(e) = self.bus.send_async(Destination::Fw, "TaskAccepted", accepted.encode_to_vec()) {
			let _ = delivery.ack();
			return Outcome::ExitFatal(e.to_string());
		}

		match self.object_store.get(&self.bus, task.job, &[task.object]) {
			Ok(objects) => ctx.objects = objects,
			Err(e) => return self.respond_error(&delivery, &task, TaskProcessError::ObjectStore(e)),
		}

		let warnings = {
			let mut api = TaskApi {
				bus: &self.bus,
				object_store: &self.object_store,
				datastore: &self.datastore,
				job: task.job,
				task_id: task.task_id,
				new_objects: &mut ctx.new_objects,
			};
			match self.handler.process(&mut ctx, &mut api) {
				Ok(warnings) => warnings,
				Err(e) => return self.respond_error(&delivery, &task, e),
			}
		};

		if let Err(e) = self.object_store.update(&self.bus, task.job, &ctx.objects, true) {
			return self.respond_error(&delivery, &task, TaskProcessError::ObjectStore(e));
		}

		let completed = wire::TaskCompleted {
			task_id: task.task_id,
			job: task.job,
			warnings,
			objects: ctx.new_objects,
		};
		if let Err(e) = self.bus.send_async(Destination::Fw, "TaskCompleted", completed.encode_to_vec()) {
			let _ = delivery.ack();
			return Outcome::ExitFatal(e.to_string());
		}
		let _ = delivery.ack();
		Outcome::Continue
	}

	fn respond_error(&self, delivery: &Delivery, task: &wire::TaskRequest, error: TaskProcessError) -> Outcome {
		if error.is_termination() {
			let _ = delivery.reject(true);
			return Outcome::ExitGraceful;
		}
		let _ = delivery.ack();
		let _ = self.send_task_error(task.task_id, task.job, error.reason(), &error.to_string());
		Outcome::Continue
	}

	fn send_task_error(&self, task_id: u64, job: u64, reason: &str, description: &str) -> Result<(), crate::error::BusError> {
		let reason = crate::enum_bridge::name_to_number::<wire::ReasonTypeEnum>(reason)
			.expect("reason is always one of ReasonTypeEnum's variants");
		let error = wire::TaskError { task_id, job, reason, description: description.to_string() };
		self.bus.send_async(Destination::Fw, "TaskError", error.encode_to_vec())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn param_to_bool_rejects_non_bool_strings() {
		assert!(param_to_bool("enabled", "true").unwrap());
		assert!(!param_to_bool("enabled", "0").unwrap());
		assert!(param_to_bool("enabled", "maybe").is_err());
	}

	#[test]
	fn task_context_tracks_fetched_and_new_objects() {
		let mut ctx = TaskContext {
			current_task: wire::TaskRequest { task_id: 7, job: 139, object: 42 },
			objects: vec![Object::new()],
			new_objects: Vec::new(),
		};
		ctx.objects[0].add_flag("Bad");
		assert!(ctx.objects[0].has("Bad"));
		assert!(ctx.new_objects.is_empty());
	}
}
