//! The worker-slot entry point: builds a `TaskProcessor` and drives it,
//! watching stdin for the supervisor's shutdown cue.

use std::io::Read;
use std::sync::atomic::Ordering;
use std::time::Duration;

use hsn2_worker_core::{Bus, TaskApi, TaskContext, TaskHandler, TaskProcessError, TaskProcessor};

use crate::Cli;

/// The core ships no task logic of its own (the example recognizer worker
/// is out of scope); this handler fetches and completes a task untouched,
/// demonstrating the scaffold.
struct PassthroughHandler;

impl TaskHandler for PassthroughHandler {
	fn process(&mut self, _ctx: &mut TaskContext, _api: &mut TaskApi) -> Result<Vec<String>, TaskProcessError> {
		Ok(Vec::new())
	}
}

pub fn run_worker(cli: &Cli) {
	let mut processor = match TaskProcessor::new(
		&cli.connector,
		cli.connector_port,
		&cli.datastore,
		&cli.service_name,
		&cli.service_queue(),
		&cli.object_store_queue_name,
		PassthroughHandler,
	) {
		Ok(processor) => processor,
		Err(e) => {
			log::error!("worker could not connect: {}", e);
			std::process::exit(-1);
		}
	};

	// `keep_running_flag` and `object_store_keep_running_flag` are clones of
	// the same Arc (shared with the Bus too), so flipping it here is
	// observed by the processor's run loop, the Bus's send_sync poll, and
	// the Object Store adapter's retry loop alike.
	let running = processor.keep_running_flag();

	let sigterm_running = running.clone();
	if let Err(e) = ctrlc::set_handler(move || {
		sigterm_running.store(false, Ordering::SeqCst);
	}) {
		log::warn!("could not install signal handler: {}", e);
	}

	// The supervisor's stdin close is the other shutdown cue (portable
	// across the signals std::process::Child can't deliver gracefully).
	std::thread::spawn(move || {
		let mut buf = [0u8; 1];
		while let Ok(n) = std::io::stdin().read(&mut buf) {
			if n == 0 {
				running.store(false, Ordering::SeqCst);
				break;
			}
		}
	});

	processor.run();
	if let Some(err) = processor.last_error() {
		log::error!("worker exited with error: {}", err);
		std::process::exit(-1);
	}
}

pub fn ping(cli: &Cli) -> Result<bool, hsn2_worker_core::BusError> {
	let bus = Bus::connect(&cli.connector, cli.connector_port, Some("cli"))?;
	let result = bus.ping(Duration::from_secs(10));
	let _ = bus.close();
	result
}
