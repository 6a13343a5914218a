//! Buffer descriptors returned by `nvim_list_bufs`.

use serde::{Deserialize, Serialize};

/// A buffer loaded in the editor.
///
/// The editor may answer with bare handles (`[1, 2]`) or with descriptor
/// objects (`[{"id": 1, "name": "/tmp/a.md"}]`); both decode to this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BufferRepr")]
pub struct Buffer {
	/// Editor buffer handle.
	pub id: i64,
	/// Full buffer name, usually a file path.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BufferRepr {
	Handle(i64),
	Descriptor {
		id: i64,
		#[serde(default)]
		name: Option<String>,
	},
}

impl From<BufferRepr> for Buffer {
	fn from(repr: BufferRepr) -> Self {
		match repr {
			BufferRepr::Handle(id) => Self { id, name: None },
			BufferRepr::Descriptor { id, name } => Self { id, name },
		}
	}
}
