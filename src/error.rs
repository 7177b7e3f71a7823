use thiserror::Error;

/// Errors from the Bus Adapter: connecting, publishing, and waiting on
/// correlated replies.
#[derive(Debug, Error)]
pub enum BusError {
	#[error("app_id is mandatory")]
	NoAppId,
	#[error("unknown bus destination {0:?}, expected \"fw\" or \"os\"")]
	BadArgument(String),
	#[error("no reply received within the timeout")]
	Timeout,
	#[error("bus is shutting down")]
	Shutdown,
	#[error("Sent:{sent}, Received:{received}")]
	MismatchedCorrelationId { sent: String, received: String },
	#[error("no listener registered for queue {0}")]
	NotListening(String),
	#[error("connection closed by peer")]
	ConnectionClosed,
	#[error(transparent)]
	Mq(#[from] lapin::Error),
}

/// Errors from building or reading an [`crate::object::Object`].
#[derive(Debug, Error)]
pub enum ObjectModelError {
	#[error("attribute {name:?} has an incorrect value: {value:?}")]
	BadValue { name: String, value: String },
}

/// Errors from the Data Store Adapter.
#[derive(Debug, Error)]
pub enum DataStoreError {
	#[error("{0}")]
	Http(String),
	#[error("response did not contain a data store key")]
	NoKey,
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Errors from the Object Store Adapter.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
	#[error("unexpected reply type {0:?}, expected ObjectResponse")]
	BadMessage(String),
	#[error("no reply received after {0} attempt(s)")]
	Timeout(u32),
	#[error("termination of service while requesting objects")]
	Termination,
	#[error(transparent)]
	Bus(#[from] BusError),
	#[error(transparent)]
	Wire(#[from] prost::DecodeError),
}

/// Errors surfaced by a task's `taskProcess` callback, or by the processor
/// itself while driving the task state machine. Each variant maps to a
/// `TaskError` reason reported back to the Framework.
#[derive(Debug, Error)]
pub enum TaskProcessError {
	#[error("unexpected message type {0:?}")]
	BadType(String),
	#[error("Parameter '{0}' has an incorrect value.")]
	Param(String),
	#[error(transparent)]
	ObjectStore(#[from] ObjectStoreError),
	#[error(transparent)]
	DataStore(#[from] DataStoreError),
	#[error("{0}")]
	Processing(String),
	#[error("{0}")]
	Input(String),
	#[error(transparent)]
	Bus(#[from] BusError),
}

impl TaskProcessError {
	/// The `TaskError.reason` this failure is reported under, per the
	/// classification table: most causes ack and continue, only a
	/// termination mid-retry asks the caller to requeue and exit.
	pub fn reason(&self) -> &'static str {
		match self {
			TaskProcessError::ObjectStore(ObjectStoreError::Bus(
				BusError::MismatchedCorrelationId { .. },
			)) => "DEFUNCT",
			TaskProcessError::Bus(BusError::MismatchedCorrelationId { .. }) => "DEFUNCT",
			TaskProcessError::BadType(_) => "DEFUNCT",
			TaskProcessError::Param(_) => "PARAMS",
			TaskProcessError::ObjectStore(_) => "OBJ_STORE",
			TaskProcessError::DataStore(_) => "DATA_STORE",
			TaskProcessError::Processing(_) => "DEFUNCT",
			TaskProcessError::Input(_) => "INPUT",
			TaskProcessError::Bus(_) => "OBJ_STORE",
		}
	}

	/// True for the one failure category that requeues the message and
	/// exits the worker instead of reporting a `TaskError` and continuing.
	pub fn is_termination(&self) -> bool {
		matches!(self, TaskProcessError::ObjectStore(ObjectStoreError::Termination))
	}
}

/// Errors reading the `[core]`/`[rabbitmq]` configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Toml(#[from] toml::de::Error),
	#[error("Unknown mq implementation: {0}")]
	UnknownMq(String),
	#[error(transparent)]
	Bus(#[from] BusError),
}
