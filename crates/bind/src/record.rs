//! Records: plain structs whose fields are addressed by position.
//!
//! A [`Record`] exposes its static field list through [`Record::specs`] and its
//! live fields through the two visitors. Both always walk the fields in
//! declaration order, which is what lets a [`FieldDescriptor`] carry a bare
//! index into the struct.
//!
//! Records are normally written with the [`record!`](crate::record) macro:
//!
//! ```
//! use micro_bind::{Get, record};
//!
//! #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
//! pub struct Profile {
//!     pub title: String,
//! }
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct UpdateUser {
//!         _method: Get => embed,
//!         pub id: String => path,
//!         pub name: Option<String> => query(validate = "min=2"),
//!         pub token: String => header(name = "x-token"),
//!         pub profile: Profile => body,
//!         pub internal: u32,
//!     }
//! }
//! ```
//!
//! [`FieldDescriptor`]: crate::descriptor::FieldDescriptor

use crate::value::{BodyValue, FieldValue, Reset, ValueKind};
use http::Method;
use std::any::Any;
use std::fmt;

/// A struct the engine can bind from requests and encode into requests.
pub trait Record: Default + Send + Sync + 'static {
    /// Raw metadata of every field, in declaration order.
    fn specs() -> &'static [FieldSpec];

    /// Calls `f` with the index and a shared slot of every field.
    fn visit_fields<E, F>(&self, f: F) -> Result<(), E>
    where
        F: FnMut(usize, FieldRef<'_>) -> Result<(), E>;

    /// Calls `f` with the index and a mutable slot of every field.
    fn visit_fields_mut<E, F>(&mut self, f: F) -> Result<(), E>
    where
        F: FnMut(usize, FieldMut<'_>) -> Result<(), E>;
}

/// Static description of one declared field, before tag resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    name: &'static str,
    type_name: &'static str,
    kind: ValueKind,
    repeated: bool,
    source: Option<&'static str>,
    tags: &'static [(&'static str, &'static str)],
}

impl FieldSpec {
    pub const fn new(
        name: &'static str,
        type_name: &'static str,
        kind: ValueKind,
        repeated: bool,
        source: Option<&'static str>,
        tags: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { name, type_name, kind, repeated, source, tags }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn repeated(&self) -> bool {
        self.repeated
    }

    /// The raw source tag, `None` when the field is untagged.
    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Embedded fields only carry markers, they never get a descriptor.
    pub fn is_embedded(&self) -> bool {
        self.source == Some("embed")
    }
}

/// A shared view of one field.
pub enum FieldRef<'a> {
    Value(&'a dyn FieldValue),
    Body(&'a dyn BodyValue),
    Opaque(&'a dyn Any),
}

/// A mutable view of one field.
pub enum FieldMut<'a> {
    Value(&'a mut dyn FieldValue),
    Body(&'a mut dyn BodyValue),
    Opaque(&'a mut dyn Reset),
}

impl FieldRef<'_> {
    pub fn is_zero(&self) -> bool {
        match self {
            FieldRef::Value(value) => value.is_zero(),
            FieldRef::Body(body) => body.is_zero(),
            FieldRef::Opaque(_) => true,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldRef::Value(value) => value.to_json(),
            FieldRef::Body(body) => body.to_json(),
            FieldRef::Opaque(_) => serde_json::Value::Null,
        }
    }
}

impl FieldMut<'_> {
    /// Puts the field back to its zero value.
    pub fn reset(self) {
        match self {
            FieldMut::Value(value) => value.reset(),
            FieldMut::Body(body) => body.reset(),
            FieldMut::Opaque(other) => other.reset(),
        }
    }
}

impl fmt::Debug for FieldRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Value(_) => f.debug_tuple("Value").field(&self.to_json()).finish(),
            FieldRef::Body(_) => f.debug_tuple("Body").field(&self.to_json()).finish(),
            FieldRef::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

impl fmt::Debug for FieldMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldMut::Value(value) => f.debug_tuple("Value").field(&value.to_json()).finish(),
            FieldMut::Body(body) => f.debug_tuple("Body").field(&body.to_json()).finish(),
            FieldMut::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

/// A zero sized marker naming the HTTP method of an operation record.
///
/// Markers are declared as `embed` fields and skipped by binding.
pub trait MethodMarker: Default + Send + Sync + 'static {
    const METHOD: Method;
}

macro_rules! method_marker {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name;

        impl MethodMarker for $name {
            const METHOD: Method = Method::$method;
        }
        )*
    };
}

method_marker! {
    Get => GET,
    Post => POST,
    Put => PUT,
    Delete => DELETE,
    Patch => PATCH,
    Head => HEAD,
    Options => OPTIONS,
}

/// Declares a struct and implements [`Record`] for it.
///
/// Every field may end with `=> source` or `=> source(key = "value", ...)`.
/// Sources are `path`, `query`, `header`, `form`, `multipart`, `urlencoded`,
/// `body`, `cookie` (or `cookies`) and `embed`. Recognized keys are `name`,
/// `json` and `validate`. Untagged fields are left alone by the engine but are
/// still reset when a pooled instance is released.
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
                $(=> $source:ident $(( $($key:ident = $value:literal),* $(,)? ))?)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Record for $name {
            fn specs() -> &'static [$crate::FieldSpec] {
                const SPECS: &[$crate::FieldSpec] = &[
                    $(
                        $crate::FieldSpec::new(
                            stringify!($field),
                            stringify!($ty),
                            $crate::__field_kind!($ty $(, $source)?),
                            $crate::__field_repeated!($ty $(, $source)?),
                            $crate::__field_source!($($source)?),
                            &[$($($( (stringify!($key), $value) ),*)?)?],
                        ),
                    )*
                ];
                SPECS
            }

            #[allow(unused_mut, unused_variables, unused_assignments, reason = "records may have no fields")]
            fn visit_fields<E, F>(&self, mut f: F) -> ::core::result::Result<(), E>
            where
                F: FnMut(usize, $crate::FieldRef<'_>) -> ::core::result::Result<(), E>,
            {
                let mut index = 0_usize;
                $(
                    f(index, $crate::__field_slot!(FieldRef, &self.$field $(, $source)?))?;
                    index += 1;
                )*
                Ok(())
            }

            #[allow(unused_mut, unused_variables, unused_assignments, reason = "records may have no fields")]
            fn visit_fields_mut<E, F>(&mut self, mut f: F) -> ::core::result::Result<(), E>
            where
                F: FnMut(usize, $crate::FieldMut<'_>) -> ::core::result::Result<(), E>,
            {
                let mut index = 0_usize;
                $(
                    f(index, $crate::__field_slot!(FieldMut, &mut self.$field $(, $source)?))?;
                    index += 1;
                )*
                Ok(())
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_source {
    () => { ::core::option::Option::None };
    (path) => { ::core::option::Option::Some("path") };
    (query) => { ::core::option::Option::Some("query") };
    (header) => { ::core::option::Option::Some("header") };
    (form) => { ::core::option::Option::Some("form") };
    (multipart) => { ::core::option::Option::Some("multipart") };
    (urlencoded) => { ::core::option::Option::Some("urlencoded") };
    (body) => { ::core::option::Option::Some("body") };
    (cookie) => { ::core::option::Option::Some("cookie") };
    (cookies) => { ::core::option::Option::Some("cookies") };
    (embed) => { ::core::option::Option::Some("embed") };
    ($other:ident) => {
        compile_error!(concat!("unknown field source `", stringify!($other), "`"))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_kind {
    ($ty:ty) => { $crate::value::ValueKind::Opaque };
    ($ty:ty, body) => { $crate::value::ValueKind::Structured };
    ($ty:ty, embed) => { $crate::value::ValueKind::Opaque };
    ($ty:ty, $source:ident) => { <$ty as $crate::value::FieldType>::KIND };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_repeated {
    ($ty:ty) => { false };
    ($ty:ty, body) => { false };
    ($ty:ty, embed) => { false };
    ($ty:ty, $source:ident) => { <$ty as $crate::value::FieldType>::REPEATED };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_slot {
    ($slot:ident, $place:expr) => { $crate::$slot::Opaque($place) };
    ($slot:ident, $place:expr, body) => { $crate::$slot::Body($place) };
    ($slot:ident, $place:expr, embed) => { $crate::$slot::Opaque($place) };
    ($slot:ident, $place:expr, $source:ident) => { $crate::$slot::Value($place) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FilePart;
    use serde::{Deserialize, Serialize};
    use std::convert::Infallible;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        title: String,
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Upload {
            _method: Post => embed,
            id: u64 => path,
            tags: Vec<String> => query(name = "tag"),
            avatar: FilePart => multipart,
            payload: Payload => body(validate = "required"),
            note: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Empty {}
    }

    #[test]
    fn specs_follow_declaration_order() {
        let specs = Upload::specs();
        let names: Vec<_> = specs.iter().map(FieldSpec::name).collect();
        assert_eq!(names, vec!["_method", "id", "tags", "avatar", "payload", "note"]);

        assert!(specs[0].is_embedded());
        assert_eq!(specs[1].kind(), ValueKind::Uint);
        assert_eq!(specs[2].source(), Some("query"));
        assert_eq!(specs[2].tag("name"), Some("tag"));
        assert!(specs[2].repeated());
        assert_eq!(specs[3].kind(), ValueKind::File);
        assert_eq!(specs[4].kind(), ValueKind::Structured);
        assert_eq!(specs[4].tag("validate"), Some("required"));
        assert_eq!(specs[5].source(), None);
        assert_eq!(specs[5].kind(), ValueKind::Opaque);
        assert_eq!(specs[1].type_name(), "u64");
    }

    #[test]
    fn visitors_reach_every_field() {
        let mut upload = Upload::default();
        upload
            .visit_fields_mut(|index, slot| {
                match (index, slot) {
                    (1, FieldMut::Value(v)) => v.set_text(&["7"]).unwrap(),
                    (2, FieldMut::Value(v)) => v.set_text(&["a,b"]).unwrap(),
                    (4, FieldMut::Body(b)) => b.decode_from(crate::codec::Codec::Json, br#"{"title":"x"}"#).unwrap(),
                    (0 | 3 | 5, _) => {}
                    (index, slot) => panic!("unexpected slot {index}: {slot:?}"),
                }
                Ok::<_, Infallible>(())
            })
            .unwrap();

        assert_eq!(upload.id, 7);
        assert_eq!(upload.tags, vec!["a", "b"]);
        assert_eq!(upload.payload.title, "x");

        let mut zero = vec![];
        upload
            .visit_fields(|index, slot| {
                zero.push((index, slot.is_zero()));
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(zero, vec![(0, true), (1, false), (2, false), (3, true), (4, false), (5, true)]);
    }

    #[test]
    fn reset_through_slots() {
        let mut upload = Upload { id: 1, note: "kept until reset".into(), ..Default::default() };
        upload
            .visit_fields_mut(|_, slot| {
                slot.reset();
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(upload, Upload::default());
    }

    #[test]
    fn empty_record() {
        assert!(Empty::specs().is_empty());
        let mut count = 0;
        Empty::default()
            .visit_fields(|_, _| {
                count += 1;
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn method_markers() {
        assert_eq!(Get::METHOD, Method::GET);
        assert_eq!(Delete::METHOD, Method::DELETE);
        assert_eq!(Options::METHOD, Method::OPTIONS);
    }
}
