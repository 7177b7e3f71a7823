//! The Bus Adapter: one broker connection, two logical channels, publish
//! and correlated-reply retrieval.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_amqp::*;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
	BasicAckOptions, BasicConsumeOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
	BasicQosOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use rand::Rng;

use crate::error::BusError;

const DEFAULT_PORT: u16 = 5672;
const CONTENT_TYPE: &str = "application/hsn2+protobuf";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bus routing destination: `"fw"` for the Framework, `"os"` for the
/// Object Store. Any other string is rejected with `BadArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
	Fw,
	Os,
}

impl TryFrom<&str> for Destination {
	type Error = BusError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		match value {
			"fw" => Ok(Destination::Fw),
			"os" => Ok(Destination::Os),
			other => Err(BusError::BadArgument(other.to_string())),
		}
	}
}

/// A message delivered to a registered listener, normalised to a byte body.
pub struct Delivery {
	pub mtype: String,
	pub body: Vec<u8>,
	acker: Acker,
}

impl Delivery {
	pub fn ack(&self) -> Result<(), BusError> {
		async_std::task::block_on(self.acker.ack(BasicAckOptions::default()))?;
		Ok(())
	}

	/// `requeue = true` is what a shutdown-mid-request hands back to the
	/// broker so another worker can pick the task up.
	pub fn reject(&self, requeue: bool) -> Result<(), BusError> {
		async_std::task::block_on(self.acker.nack(BasicNackOptions { requeue, ..Default::default() }))?;
		Ok(())
	}
}

/// One broker connection plus the two channels, reply queue, and
/// correlation bookkeeping the rest of the crate talks to.
pub struct Bus {
	connection: Connection,
	channel_fw: Channel,
	channel_os: Channel,
	reply_queue: String,
	fw_queue: Mutex<String>,
	os_queue: Mutex<String>,
	app_id: String,
	outstanding_corr_id: Mutex<Option<String>>,
	keep_running: Arc<AtomicBool>,
	consumers: Mutex<HashMap<String, Consumer>>,
}

impl Bus {
	/// Opens the connection and both channels. `app_id` is mandatory;
	/// `None` or an empty string fails with [`BusError::NoAppId`]. `port`
	/// of `None` defaults to 5672.
	///
	/// Owns a fresh, private shutdown flag. Callers that need the Bus to
	/// observe the same shutdown signal as other components (e.g. the Task
	/// Processor's Object Store adapter) should use
	/// [`Bus::connect_with_keep_running`] instead.
	pub fn connect(host: &str, port: Option<u16>, app_id: Option<&str>) -> Result<Self, BusError> {
		Self::connect_with_keep_running(host, port, app_id, Arc::new(AtomicBool::new(true)))
	}

	/// Like [`Bus::connect`], but `keep_running` is shared with the caller
	/// instead of allocated fresh, so that flipping it off is observed by
	/// this Bus's `send_sync` poll loop as well as by whatever else the
	/// caller wires it to.
	pub fn connect_with_keep_running(
		host: &str,
		port: Option<u16>,
		app_id: Option<&str>,
		keep_running: Arc<AtomicBool>,
	) -> Result<Self, BusError> {
		let app_id = match app_id {
			Some(id) if !id.is_empty() => id.to_string(),
			_ => return Err(BusError::NoAppId),
		};
		let addr = format!("amqp://{}:{}", host, port.unwrap_or(DEFAULT_PORT));
		let connection = Connection::connect(&addr, ConnectionProperties::default().with_async_std()).wait()?;

		let channel_fw = connection.create_channel().wait()?;
		channel_fw.basic_qos(1, BasicQosOptions::default()).wait()?;
		let channel_os = connection.create_channel().wait()?;
		channel_os.basic_qos(1, BasicQosOptions::default()).wait()?;

		let reply_queue = channel_os
			.queue_declare(
				"",
				QueueDeclareOptions { exclusive: true, auto_delete: true, ..Default::default() },
				FieldTable::default(),
			)
			.wait()?
			.name()
			.to_string();

		Ok(Self {
			connection,
			channel_fw,
			channel_os,
			reply_queue,
			fw_queue: Mutex::new("fw:l".to_string()),
			os_queue: Mutex::new("os:l".to_string()),
			app_id,
			outstanding_corr_id: Mutex::new(None),
			keep_running,
			consumers: Mutex::new(HashMap::new()),
		})
	}

	pub fn set_fw_queue(&self, queue: impl Into<String>) {
		*self.fw_queue.lock().unwrap() = queue.into();
	}

	pub fn set_os_queue(&self, queue: impl Into<String>) {
		*self.os_queue.lock().unwrap() = queue.into();
	}

	pub fn keep_running_flag(&self) -> Arc<AtomicBool> {
		self.keep_running.clone()
	}

	fn channel_and_routing(&self, dest: Destination) -> (&Channel, String) {
		match dest {
			Destination::Fw => (&self.channel_fw, self.fw_queue.lock().unwrap().clone()),
			Destination::Os => (&self.channel_os, self.os_queue.lock().unwrap().clone()),
		}
	}

	fn publish(
		&self,
		channel: &Channel,
		routing_key: &str,
		mtype: &str,
		body: Vec<u8>,
		reply_to: Option<&str>,
		corr_id: Option<&str>,
	) -> Result<(), BusError> {
		let mut props = BasicProperties::default()
			.with_kind(mtype.into())
			.with_content_type(CONTENT_TYPE.into())
			.with_app_id(self.app_id.as_str().into());
		if let Some(rt) = reply_to {
			props = props.with_reply_to(rt.into());
		}
		if let Some(cid) = corr_id {
			props = props.with_correlation_id(cid.into());
		}
		async_std::task::block_on(channel.basic_publish(
			"",
			routing_key,
			BasicPublishOptions::default(),
			body,
			props,
		))?;
		Ok(())
	}

	fn generate_correlation_id(mtype: &str) -> String {
		let mut rng = rand::thread_rng();
		let digits: String = (0..10).map(|_| std::char::from_digit(rng.gen_range(0, 10), 10).unwrap()).collect();
		format!("{}-{}", mtype, digits)
	}

	/// Publishes `body` under `mtype` and waits for the correlated reply,
	/// polling the reply queue roughly every 50ms. Fails with `Timeout` if
	/// nothing arrives within `timeout`, or `Shutdown` if the bus's
	/// `keep_running` flag is flipped off mid-wait.
	pub fn send_sync(
		&self,
		dest: Destination,
		mtype: &str,
		body: Vec<u8>,
		timeout: Duration,
	) -> Result<(String, Vec<u8>), BusError> {
		let (channel, routing_key) = self.channel_and_routing(dest);
		let corr_id = Self::generate_correlation_id(mtype);
		*self.outstanding_corr_id.lock().unwrap() = Some(corr_id.clone());
		self.publish(channel, &routing_key, mtype, body, Some(&self.reply_queue), Some(&corr_id))?;

		let started = Instant::now();
		loop {
			if !self.keep_running.load(Ordering::SeqCst) {
				return Err(BusError::Shutdown);
			}
			let got = async_std::task::block_on(channel.basic_get(&self.reply_queue, BasicGetOptions::default()))?;
			if let Some(message) = got {
				let delivery = message.delivery;
				let reply_type = delivery.properties.kind().as_ref().map(|s| s.to_string()).unwrap_or_default();
				let reply_corr_id =
					delivery.properties.correlation_id().as_ref().map(|s| s.to_string()).unwrap_or_default();
				async_std::task::block_on(delivery.acker.ack(BasicAckOptions::default()))?;
				if reply_corr_id != corr_id && self.app_id != "cli" {
					return Err(BusError::MismatchedCorrelationId { sent: corr_id, received: reply_corr_id });
				}
				return Ok((reply_type, delivery.data));
			}
			if started.elapsed() > timeout {
				return Err(BusError::Timeout);
			}
			std::thread::sleep(POLL_INTERVAL);
		}
	}

	/// Publishes `body` under `mtype` and returns immediately; no reply
	/// queue or correlation id is attached.
	pub fn send_async(&self, dest: Destination, mtype: &str, body: Vec<u8>) -> Result<(), BusError> {
		let (channel, routing_key) = self.channel_and_routing(dest);
		self.publish(channel, &routing_key, mtype, body, None, None)
	}

	/// `sendCommand("fw", "Ping", "", sync=1)` compared byte-wise against
	/// `"pong"`, per the REDESIGN FLAG on the Python original's
	/// string-vs-bytes comparison bug.
	pub fn ping(&self, timeout: Duration) -> Result<bool, BusError> {
		let (_, body) = self.send_sync(Destination::Fw, "Ping", Vec::new(), timeout)?;
		Ok(body == b"pong")
	}

	/// Ensures a consumer exists for `queue`. Registering the same queue
	/// twice is a no-op.
	pub fn configure_listener(&self, queue: &str) -> Result<(), BusError> {
		let mut consumers = self.consumers.lock().unwrap();
		if consumers.contains_key(queue) {
			return Ok(());
		}
		let consumer = async_std::task::block_on(self.channel_fw.basic_consume(
			queue,
			&self.app_id,
			BasicConsumeOptions::default(),
			FieldTable::default(),
		))?;
		consumers.insert(queue.to_string(), consumer);
		Ok(())
	}

	/// Polls the consumer registered for `queue` for up to `poll_timeout`.
	/// Returns `Ok(None)` on a bare poll tick so callers can recheck their
	/// own shutdown flag between messages.
	pub fn receive(&self, queue: &str, poll_timeout: Duration) -> Result<Option<Delivery>, BusError> {
		let mut consumers = self.consumers.lock().unwrap();
		let consumer = consumers.get_mut(queue).ok_or_else(|| BusError::NotListening(queue.to_string()))?;
		let next = async_std::task::block_on(async_std::future::timeout(poll_timeout, consumer.next()));
		match next {
			Ok(Some(Ok((_, delivery)))) => {
				let mtype = delivery.properties.kind().as_ref().map(|s| s.to_string()).unwrap_or_default();
				Ok(Some(Delivery { mtype, body: delivery.data, acker: delivery.acker }))
			}
			Ok(Some(Err(e))) => Err(e.into()),
			Ok(None) => Err(BusError::ConnectionClosed),
			Err(_) => Ok(None),
		}
	}

	/// Drives `configure_listener` + `receive` in a loop, invoking
	/// `on_message` for every delivery, until `keep_running` is cleared.
	pub fn blocking_consume(&self, queue: &str, mut on_message: impl FnMut(Delivery)) -> Result<(), BusError> {
		self.configure_listener(queue)?;
		while self.keep_running.load(Ordering::SeqCst) {
			if let Some(delivery) = self.receive(queue, Duration::from_millis(200))? {
				on_message(delivery);
			}
		}
		Ok(())
	}

	/// Opens an extra channel bound to `exchange` (default `"notify"`) and
	/// consumes indefinitely. `true` from `callback` acks, `false` rejects
	/// without requeue.
	pub fn attach_to_monitoring(
		&self,
		exchange: Option<&str>,
		mut callback: impl FnMut(String, Vec<u8>) -> bool,
	) -> Result<(), BusError> {
		let exchange = exchange.unwrap_or("notify");
		let channel = async_std::task::block_on(self.connection.create_channel())?;
		let queue = channel
			.queue_declare(
				"",
				QueueDeclareOptions { exclusive: true, auto_delete: true, ..Default::default() },
				FieldTable::default(),
			)
			.wait()?;
		channel
			.queue_bind(queue.name().as_str(), exchange, "", QueueBindOptions::default(), FieldTable::default())
			.wait()?;
		let mut consumer = channel
			.basic_consume(queue.name().as_str(), &self.app_id, BasicConsumeOptions::default(), FieldTable::default())
			.wait()?;

		while self.keep_running.load(Ordering::SeqCst) {
			match async_std::task::block_on(consumer.next()) {
				Some(Ok((_, delivery))) => {
					let mtype = delivery.properties.kind().as_ref().map(|s| s.to_string()).unwrap_or_default();
					if callback(mtype, delivery.data) {
						async_std::task::block_on(delivery.acker.ack(BasicAckOptions::default()))?;
					} else {
						async_std::task::block_on(
							delivery.acker.nack(BasicNackOptions { requeue: false, ..Default::default() }),
						)?;
					}
				}
				Some(Err(e)) => return Err(e.into()),
				None => break,
			}
		}
		Ok(())
	}

	/// Idempotent: flips `keep_running` (observed by `send_sync`'s poll
	/// loop) then closes the connection.
	pub fn close(&self) -> Result<(), BusError> {
		if !self.keep_running.swap(false, Ordering::SeqCst) {
			return Ok(());
		}
		self.connection.close(200, "closing").wait()?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn destination_rejects_unknown_names() {
		assert!(matches!(Destination::try_from("fw"), Ok(Destination::Fw)));
		assert!(matches!(Destination::try_from("os"), Ok(Destination::Os)));
		assert!(matches!(Destination::try_from("bogus"), Err(BusError::BadArgument(_))));
	}

	#[test]
	fn correlation_id_has_expected_shape() {
		let id = Bus::generate_correlation_id("Ping");
		let (prefix, digits) = id.split_once('-').unwrap();
		assert_eq!(prefix, "Ping");
		assert_eq!(digits.len(), 10);
		assert!(digits.chars().all(|c| c.is_ascii_digit()));
	}
}
