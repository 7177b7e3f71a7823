//! The in-memory attributed object and its bridge to [`crate::wire::ObjectData`].

use std::collections::HashMap;

use crate::enum_bridge;
use crate::error::ObjectModelError;
use crate::wire;

/// A single attribute's value. Exactly one variant is meaningful per
/// attribute; `kind` on the wire is derived from which variant this is.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	Empty,
	Bool(bool),
	Int(i64),
	Float(f64),
	/// Milliseconds since epoch.
	Time(i64),
	String(String),
	/// A reference into the Data Store: `(key, store)`.
	Bytes { key: u64, store: Option<i32> },
	/// An opaque reference to another object's id.
	ObjectRef(u64),
}

impl AttributeValue {
	fn kind_name(&self) -> &'static str {
		match self {
			AttributeValue::Empty => "EMPTY",
			AttributeValue::Bool(_) => "BOOL",
			AttributeValue::Int(_) => "INT",
			AttributeValue::Float(_) => "FLOAT",
			AttributeValue::Time(_) => "TIME",
			AttributeValue::String(_) => "STRING",
			AttributeValue::Bytes { .. } => "BYTES",
			AttributeValue::ObjectRef(_) => "OBJECT",
		}
	}
}

/// An attributed object. `id` is assigned by the Object Store on PUT and is
/// absent for objects freshly built by worker code.
#[derive(Debug, Clone, Default)]
pub struct Object {
	id: Option<u64>,
	attrs: HashMap<String, AttributeValue>,
}

impl Object {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_id(&mut self, id: u64) {
		self.id = Some(id);
	}

	pub fn id(&self) -> Option<u64> {
		self.id
	}

	pub fn has(&self, name: &str) -> bool {
		self.attrs.contains_key(name)
	}

	pub fn remove(&mut self, name: &str) {
		self.attrs.remove(name);
	}

	pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
		self.attrs.iter()
	}

	/// Adds or replaces an attribute outright, replacing both kind and
	/// value if the name already exists.
	pub fn add(&mut self, name: impl Into<String>, value: AttributeValue) {
		self.attrs.insert(name.into(), value);
	}

	/// Accepts a native `bool`, or a bool-ish string (`"true"/"1"/"false"/"0"`,
	/// case-insensitive); anything else fails with `BadValue`.
	pub fn add_bool(&mut self, name: impl Into<String>, value: impl BoolLike) -> Result<(), ObjectModelError> {
		let name = name.into();
		let parsed = value
			.into_bool()
			.map_err(|raw| ObjectModelError::BadValue { name: name.clone(), value: raw })?;
		self.attrs.insert(name, AttributeValue::Bool(parsed));
		Ok(())
	}

	pub fn add_flag(&mut self, name: impl Into<String>) {
		self.attrs.insert(name.into(), AttributeValue::Bool(true));
	}

	pub fn add_int(&mut self, name: impl Into<String>, value: i64) {
		self.attrs.insert(name.into(), AttributeValue::Int(value));
	}

	pub fn add_float(&mut self, name: impl Into<String>, value: f64) {
		self.attrs.insert(name.into(), AttributeValue::Float(value));
	}

	pub fn add_time(&mut self, name: impl Into<String>, millis_since_epoch: i64) {
		self.attrs.insert(name.into(), AttributeValue::Time(millis_since_epoch));
	}

	/// Coerces `value` to its textual representation via `ToString`.
	pub fn add_string(&mut self, name: impl Into<String>, value: impl ToString) {
		self.attrs.insert(name.into(), AttributeValue::String(value.to_string()));
	}

	pub fn add_bytes(&mut self, name: impl Into<String>, key: u64, store: Option<i32>) {
		self.attrs.insert(name.into(), AttributeValue::Bytes { key, store });
	}

	pub fn add_object(&mut self, name: impl Into<String>, object_id: u64) {
		self.attrs.insert(name.into(), AttributeValue::ObjectRef(object_id));
	}

	/// Equality over attributes only, ignoring `id` — the form `fromWire(toWire(O)) == O` uses.
	pub fn attrs_eq(&self, other: &Object) -> bool {
		self.attrs == other.attrs
	}

	pub fn to_wire(&self) -> wire::ObjectData {
		let attrs = self
			.attrs
			.iter()
			.map(|(name, value)| attribute_to_wire(name, value))
			.collect();
		wire::ObjectData { id: self.id, attrs }
	}

	pub fn from_wire(data: &wire::ObjectData) -> Self {
		let mut attrs = HashMap::with_capacity(data.attrs.len());
		for attr in &data.attrs {
			attrs.insert(attr.name.clone(), attribute_from_wire(attr));
		}
		Object { id: data.id, attrs }
	}
}

pub fn attribute_to_wire(name: &str, value: &AttributeValue) -> wire::ObjectAttr {
	let kind = enum_bridge::name_to_number::<wire::AttributeKindEnum>(value.kind_name())
		.expect("AttributeKindEnum covers every AttributeValue variant");
	let mut attr = wire::ObjectAttr { name: name.to_string(), kind, ..Default::default() };
	match value {
		AttributeValue::Empty => {}
		AttributeValue::Bool(b) => attr.bool_value = *b,
		AttributeValue::Int(i) => attr.int_value = *i,
		AttributeValue::Float(f) => attr.float_value = *f,
		AttributeValue::Time(t) => attr.time_value = *t,
		AttributeValue::String(s) => attr.string_value = s.clone(),
		AttributeValue::Bytes { key, store } => attr.bytes_value = Some(wire::BytesRef { key: *key, store: *store }),
		AttributeValue::ObjectRef(id) => attr.object_value = *id,
	}
	attr
}

fn attribute_from_wire(attr: &wire::ObjectAttr) -> AttributeValue {
	match enum_bridge::number_to_name::<wire::AttributeKindEnum>(attr.kind) {
		Some("BOOL") => AttributeValue::Bool(attr.bool_value),
		Some("INT") => AttributeValue::Int(attr.int_value),
		Some("FLOAT") => AttributeValue::Float(attr.float_value),
		Some("TIME") => AttributeValue::Time(attr.time_value),
		Some("STRING") => AttributeValue::String(attr.string_value.clone()),
		Some("BYTES") => match &attr.bytes_value {
			Some(b) => AttributeValue::Bytes { key: b.key, store: b.store },
			None => AttributeValue::Empty,
		},
		Some("OBJECT") => AttributeValue::ObjectRef(attr.object_value),
		// Unknown or EMPTY kinds both collapse to Empty.
		_ => AttributeValue::Empty,
	}
}

/// Boolean coercion shared by `addBool` and `paramToBool`: accepts a bool-ish
/// string case-insensitively, nothing else.
pub fn to_bool_value(raw: &str) -> Result<bool, ()> {
	match raw.to_ascii_lowercase().as_str() {
		"true" | "1" => Ok(true),
		"false" | "0" => Ok(false),
		_ => Err(()),
	}
}

/// Anything `Object::add_bool` can coerce into a `bool`: a native `bool`
/// passes straight through, a string goes through [`to_bool_value`]. The
/// error carries the original value's textual form for `BadValue`.
pub trait BoolLike {
	fn into_bool(self) -> Result<bool, String>;
}

impl BoolLike for bool {
	fn into_bool(self) -> Result<bool, String> {
		Ok(self)
	}
}

impl BoolLike for &str {
	fn into_bool(self) -> Result<bool, String> {
		to_bool_value(self).map_err(|_| self.to_string())
	}
}

impl BoolLike for String {
	fn into_bool(self) -> Result<bool, String> {
		to_bool_value(&self).map_err(|_| self.clone())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_trips_through_wire() {
		let mut obj = Object::new();
		obj.add_bool("flag", "true").unwrap();
		obj.add_int("count", 42);
		obj.add_string("name", "sample");
		obj.add_bytes("payload", 7, Some(1));
		obj.add_object("parent", 99);

		let wire = obj.to_wire();
		let back = Object::from_wire(&wire);
		assert!(obj.attrs_eq(&back));
	}

	#[test]
	fn add_replaces_kind_and_value() {
		let mut obj = Object::new();
		obj.add_int("x", 1);
		obj.add("x", AttributeValue::String("now a string".into()));
		assert_eq!(obj.attributes().count(), 1);
		assert_eq!(obj.attrs.get("x"), Some(&AttributeValue::String("now a string".into())));
	}

	#[test]
	fn add_bool_accepts_only_bool_ish_strings() {
		let mut obj = Object::new();
		assert!(obj.add_bool("a", "TRUE").is_ok());
		assert!(obj.add_bool("b", "0").is_ok());
		assert!(obj.add_bool("c", "yes").is_err());
	}

	#[test]
	fn add_bool_accepts_native_bool() {
		let mut obj = Object::new();
		obj.add_bool("flag", true).unwrap();
		assert_eq!(obj.attrs.get("flag"), Some(&AttributeValue::Bool(true)));
	}

	#[test]
	fn unknown_wire_kind_becomes_empty() {
		let attr = wire::ObjectAttr { name: "weird".into(), kind: 999, ..Default::default() };
		assert_eq!(attribute_from_wire(&attr), AttributeValue::Empty);
	}
}
