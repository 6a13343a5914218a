//! Conversion between msgpack values on the wire and JSON values in the API.
//!
//! Editor handles (buffers, windows, tabpages) travel as msgpack extension
//! types whose payload is the msgpack-encoded handle number; they convert to
//! that number.

use rmpv::Value as Msgpack;
use serde_json::{Map, Number, Value};

/// Converts a JSON value for sending.
pub fn to_msgpack(value: &Value) -> Msgpack {
	match value {
		Value::Null => Msgpack::Nil,
		Value::Bool(b) => Msgpack::Boolean(*b),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Msgpack::from(i)
			} else if let Some(u) = n.as_u64() {
				Msgpack::from(u)
			} else {
				Msgpack::F64(n.as_f64().unwrap_or_default())
			}
		}
		Value::String(s) => Msgpack::from(s.as_str()),
		Value::Array(items) => Msgpack::Array(items.iter().map(to_msgpack).collect()),
		Value::Object(map) => Msgpack::Map(map.iter().map(|(k, v)| (Msgpack::from(k.as_str()), to_msgpack(v))).collect()),
	}
}

/// Converts a received msgpack value.
///
/// Binary data and invalid UTF-8 become lossy strings; non-string map keys are
/// rendered as JSON text.
pub fn to_json(value: Msgpack) -> Value {
	match value {
		Msgpack::Nil => Value::Null,
		Msgpack::Boolean(b) => Value::Bool(b),
		Msgpack::Integer(i) => i
			.as_i64()
			.map(Value::from)
			.or_else(|| i.as_u64().map(Value::from))
			.unwrap_or(Value::Null),
		Msgpack::F32(f) => float(f64::from(f)),
		Msgpack::F64(f) => float(f),
		Msgpack::String(s) => Value::String(String::from_utf8_lossy(s.as_bytes()).into_owned()),
		Msgpack::Binary(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
		Msgpack::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
		Msgpack::Map(entries) => {
			let mut map = Map::with_capacity(entries.len());
			for (key, value) in entries {
				let key = match key {
					Msgpack::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
					other => to_json(other).to_string(),
				};
				map.insert(key, to_json(value));
			}
			Value::Object(map)
		}
		Msgpack::Ext(_, payload) => {
			let mut bytes = payload.as_slice();
			rmpv::decode::read_value(&mut bytes).map(to_json).unwrap_or(Value::Null)
		}
	}
}

/// Text of a string value, or its msgpack display form.
pub(crate) fn text(value: Msgpack) -> String {
	match value {
		Msgpack::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
		other => other.to_string(),
	}
}

fn float(f: f64) -> Value {
	Number::from_f64(f).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn buffer_handles_become_numbers() {
		// nvim encodes Buffer 3 as ext type 0 with payload 0x03.
		let value = Msgpack::Array(vec![Msgpack::Ext(0, vec![0x01]), Msgpack::Ext(0, vec![0x03])]);
		assert_eq!(to_json(value), json!([1, 3]));
	}

	#[test]
	fn params_convert_for_sending() {
		let value = to_msgpack(&json!(["qa!", 2, -1, 1.5, null, {"k": true}]));
		let Msgpack::Array(items) = value else {
			panic!("expected array");
		};
		assert_eq!(items[0].as_str(), Some("qa!"));
		assert_eq!(items[1].as_u64(), Some(2));
		assert_eq!(items[2].as_i64(), Some(-1));
		assert_eq!(items[3].as_f64(), Some(1.5));
		assert!(items[4].is_nil());
		assert_eq!(items[5], Msgpack::Map(vec![(Msgpack::from("k"), Msgpack::Boolean(true))]));
	}

	#[test]
	fn maps_with_integer_keys_keep_their_entries() {
		let value = Msgpack::Map(vec![(Msgpack::from(1), Msgpack::from("one"))]);
		assert_eq!(to_json(value), json!({"1": "one"}));
	}
}
