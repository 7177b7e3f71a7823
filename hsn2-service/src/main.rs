//! Service Host binary: parses the CLI, spawns `--max-threads` worker
//! processes, and supervises them until shutdown.

mod worker;

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

const TICK: Duration = Duration::from_secs(1);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug, Clone)]
#[clap(name = "hsn2-service", about = "HSN2 worker service host")]
pub struct Cli {
	#[clap(long, default_value = "info")]
	pub log_level: String,
	#[clap(long, default_value_t = 1)]
	pub max_threads: usize,
	#[clap(long, default_value = "127.0.0.1")]
	pub connector: String,
	#[clap(long)]
	pub connector_port: Option<u16>,
	#[clap(long, default_value = "127.0.0.1:8080")]
	pub datastore: String,
	#[clap(long)]
	pub service_name: String,
	#[clap(long, default_value = "")]
	pub service_queue_dest: String,
	#[clap(long, default_value = "os:l")]
	pub object_store_queue_name: String,
	/// Starts this process as a single worker instead of a supervisor.
	/// Set only by the supervisor when it re-execs itself.
	#[clap(long, hide = true)]
	pub worker_slot: bool,
	/// Sends a Ping to the Framework and exits, instead of starting workers.
	#[clap(long)]
	pub ping: bool,
}

impl Cli {
	pub fn service_queue(&self) -> String {
		if self.service_queue_dest.is_empty() {
			format!("srv-{}:l", self.service_name)
		} else {
			self.service_queue_dest.clone()
		}
	}
}

fn init_logger(level: &str) -> Result<()> {
	let level = level.parse().unwrap_or(log::LevelFilter::Info);
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stdout())
		.apply()
		.context("failed to install logger")?;
	Ok(())
}

fn sanity_checks(cli: &Cli) -> Result<()> {
	if cli.service_name.is_empty() {
		bail!("--service-name must not be empty");
	}
	if cli.max_threads == 0 {
		bail!("--max-threads must be at least 1");
	}
	Ok(())
}

fn main() {
	let cli = Cli::parse();
	if let Err(e) = init_logger(&cli.log_level) {
		eprintln!("{}", e);
		std::process::exit(-1);
	}

	if cli.worker_slot {
		worker::run_worker(&cli);
		return;
	}

	if cli.ping {
		match worker::ping(&cli) {
			Ok(true) => {
				println!("The framework is alive.");
				std::process::exit(0);
			}
			Ok(false) => {
				log::error!("ping reply body did not match \"pong\"");
				std::process::exit(-1);
			}
			Err(e) => {
				log::error!("ping failed: {}", e);
				std::process::exit(-1);
			}
		}
	}

	if let Err(e) = sanity_checks(&cli) {
		log::error!("sanity check failed: {}", e);
		std::process::exit(-1);
	}

	if let Err(e) = run_supervisor(&cli) {
		log::error!("supervisor failed: {}", e);
		std::process::exit(-1);
	}
}

fn spawn_worker(cli: &Cli) -> Result<Child> {
	let exe = std::env::current_exe().context("could not locate current executable")?;
	let mut command = Command::new(exe);
	command
		.arg("--worker-slot")
		.arg("--log-level")
		.arg(&cli.log_level)
		.arg("--connector")
		.arg(&cli.connector)
		.arg("--datastore")
		.arg(&cli.datastore)
		.arg("--service-name")
		.arg(&cli.service_name)
		.arg("--service-queue-dest")
		.arg(cli.service_queue())
		.arg("--object-store-queue-name")
		.arg(&cli.object_store_queue_name)
		.stdin(Stdio::piped())
		.stdout(Stdio::inherit())
		.stderr(Stdio::inherit());
	if let Some(port) = cli.connector_port {
		command.arg("--connector-port").arg(port.to_string());
	}
	command.spawn().context("failed to spawn worker process")
}

/// Spawns `max_threads` workers, installs signal handlers, and supervises
/// until a signal arrives or every child has exited.
fn run_supervisor(cli: &Cli) -> Result<()> {
	let mut children: Vec<Child> = (0..cli.max_threads)
		.map(|_| spawn_worker(cli))
		.collect::<Result<_>>()?;

	let running = Arc::new(AtomicBool::new(true));
	let handler_running = running.clone();
	ctrlc::set_handler(move || {
		handler_running.store(false, Ordering::SeqCst);
	})
	.context("failed to install signal handler")?;

	while running.load(Ordering::SeqCst) {
		std::thread::sleep(TICK);
		children = still_alive(children);
		if children.is_empty() {
			log::info!("All children exited");
			break;
		}
	}

	shutdown(children)
}

/// Closes each child's stdin (the worker's cue to stop after its current
/// poll tick), polls for up to 10s, then sends an uncatchable kill to
/// anything still alive.
fn shutdown(mut children: Vec<Child>) -> Result<()> {
	for child in &mut children {
		drop(child.stdin.take());
	}

	let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
	while Instant::now() < deadline {
		children = still_alive(children);
		if children.is_empty() {
			return Ok(());
		}
		std::thread::sleep(TICK);
	}

	for child in &mut children {
		let _ = child.kill();
		let _ = child.wait();
	}
	Ok(())
}

fn still_alive(children: Vec<Child>) -> Vec<Child> {
	children
		.into_iter()
		.filter_map(|mut child| match child.try_wait() {
			Ok(Some(_)) => None,
			_ => Some(child),
		})
		.collect()
}
