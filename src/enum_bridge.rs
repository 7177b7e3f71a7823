//! Name/number bridging for the wire schema's protobuf-style enums.
//!
//! The original adapter builds its table by walking a live protobuf
//! descriptor the first time a given enum type is touched. We don't carry a
//! real descriptor pool here (the generated stubs are out of scope), so each
//! enum instead describes itself via [`EnumDescriptor`] and the bridge
//! builds the same bidirectional table from that, once per type, lazily.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

/// A wire enum that can describe its own name/number pairs. Stands in for
/// walking `DESCRIPTOR.enum_types_by_name[...]` at runtime.
pub trait EnumDescriptor {
	const ENUM_NAME: &'static str;
	const VARIANTS: &'static [(&'static str, i32)];
}

struct EnumTable {
	name_to_number: HashMap<&'static str, i32>,
	number_to_name: HashMap<i32, &'static str>,
}

static CACHE: Lazy<RwLock<HashMap<&'static str, EnumTable>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

fn ensure_loaded<E: EnumDescriptor>() {
	if CACHE.read().unwrap().contains_key(E::ENUM_NAME) {
		return;
	}
	let mut name_to_number = HashMap::with_capacity(E::VARIANTS.len());
	let mut number_to_name = HashMap::with_capacity(E::VARIANTS.len());
	for (name, number) in E::VARIANTS {
		name_to_number.insert(*name, *number);
		number_to_name.insert(*number, *name);
	}
	// Another thread may have raced us here; either table is equivalent
	// since VARIANTS is a compile-time constant, so a blind insert is fine.
	CACHE
		.write()
		.unwrap()
		.entry(E::ENUM_NAME)
		.or_insert(EnumTable { name_to_number, number_to_name });
}

/// Looks up the wire number for `name` within enum type `E`, building the
/// cache entry for `E` on first use.
pub fn name_to_number<E: EnumDescriptor>(name: &str) -> Option<i32> {
	ensure_loaded::<E>();
	CACHE
		.read()
		.unwrap()
		.get(E::ENUM_NAME)
		.and_then(|t| t.name_to_number.get(name).copied())
}

/// Looks up the wire name for `number` within enum type `E`, building the
/// cache entry for `E` on first use.
pub fn number_to_name<E: EnumDescriptor>(number: i32) -> Option<&'static str> {
	ensure_loaded::<E>();
	CACHE
		.read()
		.unwrap()
		.get(E::ENUM_NAME)
		.and_then(|t| t.number_to_name.get(&number).copied())
}

#[cfg(test)]
mod test {
	use super::*;

	struct Kind;
	impl EnumDescriptor for Kind {
		const ENUM_NAME: &'static str = "test.Kind";
		const VARIANTS: &'static [(&'static str, i32)] = &[("A", 0), ("B", 1)];
	}

	#[test]
	fn round_trips_both_directions() {
		assert_eq!(name_to_number::<Kind>("B"), Some(1));
		assert_eq!(number_to_name::<Kind>(0), Some("A"));
		assert_eq!(name_to_number::<Kind>("nope"), None);
	}

	#[test]
	fn first_use_is_idempotent_across_calls() {
		assert_eq!(name_to_number::<Kind>("A"), Some(0));
		assert_eq!(name_to_number::<Kind>("A"), Some(0));
	}
}
