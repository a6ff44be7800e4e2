//! Tag driven marshaling between HTTP messages and plain Rust structs.
//!
//! A struct declared with [`record!`] says, per field, where its value lives on
//! the wire: a path placeholder, a query parameter, a header, a cookie, a form
//! field, a multipart part or the body. From that declaration this crate
//!
//! - binds incoming requests into pooled instances ([`Binder::bind`], [`Decoder`]),
//! - encodes instances into outgoing requests ([`Binder::encode`], [`Encoder`]),
//! - picks body codecs by content type ([`codec::ContentTypeTable`]).
//!
//! Field metadata is computed once per type and shared through a
//! [`MetadataCache`]; each type also gets an [`InstancePool`] so binding does
//! not allocate a fresh record per request.
//!
//! # Example
//!
//! ```
//! use micro_bind::{Binder, Post, record};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
//! pub struct Comment {
//!     pub text: String,
//! }
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct AddComment {
//!         _post: Post => embed,
//!         pub post_id: u64 => path(name = "id"),
//!         pub notify: bool => query,
//!         pub comment: Comment => body,
//!     }
//! }
//!
//! let binder = Binder::default();
//! let comment = Comment { text: "nice".into() };
//! let record = AddComment { post_id: 7, notify: true, comment, ..Default::default() };
//! let request = binder.request_for::<Post, _>("/posts/:id/comments", &record).unwrap();
//!
//! assert_eq!(request.uri(), "/posts/7/comments?notify=true");
//! assert_eq!(request.body().as_ref(), br#"{"text":"nice"}"#);
//! ```

pub mod binder;
pub mod codec;
pub mod config;
pub mod decode;
pub mod descriptor;
pub mod encode;
pub mod error;
pub mod handler;
pub mod log_filter;
pub mod metadata;
pub mod pool;
pub mod record;
pub mod request;
pub mod responder;
pub mod snapshot;
pub mod validate;
pub mod value;

pub use binder::{Binder, BinderBuilder, Bound};
pub use codec::{Codec, ContentTypeTable};
pub use config::{BindConfig, CoercionPolicy};
pub use decode::Decoder;
pub use descriptor::{FieldDescriptor, SourceKind};
pub use encode::Encoder;
pub use handler::{FnHandler, RequestHandler, handler_fn};
pub use metadata::{MetadataCache, TypeMetadata};
pub use pool::{InstancePool, Pooled};
pub use record::{Delete, FieldMut, FieldRef, FieldSpec, Get, Head, MethodMarker, Options, Patch, Post, Put, Record};
pub use request::{PathParams, RequestContext};
pub use responder::{Encoded, Responder};
pub use snapshot::ParsedParameterSnapshot;
pub use validate::{TagValidator, Validator};
pub use value::FilePart;
