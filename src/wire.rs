//! Wire schema: the binary payloads carried inside bus messages.
//!
//! Hand-written `prost::Message` structs standing in for the real
//! `.proto`-generated stubs (out of scope here). Field shapes follow the
//! attribute/object/task records the rest of the crate already works with.

use crate::enum_bridge::EnumDescriptor;

#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesRef {
	#[prost(uint64, tag = "1")]
	pub key: u64,
	#[prost(int32, optional, tag = "2")]
	pub store: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ObjectAttr {
	#[prost(string, tag = "1")]
	pub name: String,
	#[prost(int32, tag = "2")]
	pub kind: i32,
	#[prost(bool, tag = "3")]
	pub bool_value: bool,
	#[prost(int64, tag = "4")]
	pub int_value: i64,
	#[prost(double, tag = "5")]
	pub float_value: f64,
	#[prost(int64, tag = "6")]
	pub time_value: i64,
	#[prost(string, tag = "7")]
	pub string_value: String,
	#[prost(message, optional, tag = "8")]
	pub bytes_value: Option<BytesRef>,
	#[prost(uint64, tag = "9")]
	pub object_value: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ObjectData {
	#[prost(uint64, optional, tag = "1")]
	pub id: Option<u64>,
	#[prost(message, repeated, tag = "2")]
	pub attrs: Vec<ObjectAttr>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryEntry {
	#[prost(string, tag = "1")]
	pub attr_name: String,
	#[prost(bool, tag = "2")]
	pub negate: bool,
	#[prost(int32, tag = "3")]
	pub query_type: i32,
	#[prost(message, optional, tag = "4")]
	pub attr_value: Option<ObjectAttr>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ObjectRequest {
	#[prost(uint64, tag = "1")]
	pub job: u64,
	#[prost(int32, tag = "2")]
	pub request_type: i32,
	#[prost(uint64, repeated, tag = "3")]
	pub objects: Vec<u64>,
	#[prost(uint64, tag = "4")]
	pub task_id: u64,
	#[prost(message, repeated, tag = "5")]
	pub data: Vec<ObjectData>,
	#[prost(bool, tag = "6")]
	pub overwrite: bool,
	#[prost(message, repeated, tag = "7")]
	pub query: Vec<QueryEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ObjectResponse {
	#[prost(int32, tag = "1")]
	pub response_type: i32,
	#[prost(uint64, repeated, tag = "2")]
	pub objects: Vec<u64>,
	#[prost(message, repeated, tag = "3")]
	pub data: Vec<ObjectData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskRequest {
	#[prost(uint64, tag = "1")]
	pub task_id: u64,
	#[prost(uint64, tag = "2")]
	pub job: u64,
	#[prost(uint64, tag = "3")]
	pub object: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskAccepted {
	#[prost(uint64, tag = "1")]
	pub task_id: u64,
	#[prost(uint64, tag = "2")]
	pub job: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskCompleted {
	#[prost(uint64, tag = "1")]
	pub task_id: u64,
	#[prost(uint64, tag = "2")]
	pub job: u64,
	#[prost(string, repeated, tag = "3")]
	pub warnings: Vec<String>,
	#[prost(uint64, repeated, tag = "4")]
	pub objects: Vec<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskError {
	#[prost(uint64, tag = "1")]
	pub task_id: u64,
	#[prost(uint64, tag = "2")]
	pub job: u64,
	#[prost(int32, tag = "3")]
	pub reason: i32,
	#[prost(string, tag = "4")]
	pub description: String,
}

pub struct AttributeKindEnum;
impl EnumDescriptor for AttributeKindEnum {
	const ENUM_NAME: &'static str = "hsn2.AttributeKind";
	const VARIANTS: &'static [(&'static str, i32)] = &[
		("EMPTY", 0),
		("BOOL", 1),
		("INT", 2),
		("FLOAT", 3),
		("TIME", 4),
		("STRING", 5),
		("BYTES", 6),
		("OBJECT", 7),
	];
}

pub struct RequestTypeEnum;
impl EnumDescriptor for RequestTypeEnum {
	const ENUM_NAME: &'static str = "hsn2.ObjectRequest.Type";
	const VARIANTS: &'static [(&'static str, i32)] =
		&[("GET", 0), ("PUT", 1), ("PUT_RAW", 2), ("UPDATE", 3), ("QUERY", 4)];
}

pub struct ResponseTypeEnum;
impl EnumDescriptor for ResponseTypeEnum {
	const ENUM_NAME: &'static str = "hsn2.ObjectResponse.Type";
	const VARIANTS: &'static [(&'static str, i32)] = &[("SUCCESS", 0), ("FAILURE", 1)];
}

pub struct QueryTypeEnum;
impl EnumDescriptor for QueryTypeEnum {
	const ENUM_NAME: &'static str = "hsn2.QueryEntry.Type";
	const VARIANTS: &'static [(&'static str, i32)] = &[("BY_ATTR_NAME", 0), ("BY_ATTR_VALUE", 1)];
}

pub struct ReasonTypeEnum;
impl EnumDescriptor for ReasonTypeEnum {
	const ENUM_NAME: &'static str = "hsn2.TaskError.Reason";
	const VARIANTS: &'static [(&'static str, i32)] = &[
		("DEFUNCT", 0),
		("PARAMS", 1),
		("OBJ_STORE", 2),
		("DATA_STORE", 3),
		("INPUT", 4),
	];
}
