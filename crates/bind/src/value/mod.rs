//! Field value abstractions used by the decoder and the encoder.
//!
//! A record's fields are reached through two object safe traits:
//!
//! - [`FieldValue`]: values carried as text (path, query, header, cookie, form,
//!   url-encoded) or as files (multipart). Implemented for every [`Element`],
//!   `Vec<E>` and `Option<E>`.
//! - [`BodyValue`]: values carried as a whole structured body, implemented for
//!   any serde type with a `Default`.
//!
//! Both extend [`Reset`], which puts a field back to its zero value when a
//! pooled instance is released.

mod file;

pub use file::FilePart;

use crate::codec::Codec;
use crate::error::{CodecError, CoerceError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

#[doc(hidden)]
pub use serde_json::Value as JsonValue;

/// Puts a value back to its zero value.
pub trait Reset {
    fn reset(&mut self);
}

impl<T: Default> Reset for T {
    #[inline]
    fn reset(&mut self) {
        *self = T::default();
    }
}

/// The static shape of a field, used for coercion and reporting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Bool,
    Int,
    Uint,
    Float,
    Char,
    File,
    /// A whole structured body handled by a [`Codec`].
    Structured,
    /// A field the engine never reads or writes.
    Opaque,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Uint => "uint",
            ValueKind::Float => "float",
            ValueKind::Char => "char",
            ValueKind::File => "file",
            ValueKind::Structured => "structured",
            ValueKind::Opaque => "opaque",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Uint | ValueKind::Float)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single wire element: one query value, one header value, one file.
///
/// Implement it for your own types (for example a fieldless enum) and then
/// call [`impl_field_value!`](crate::impl_field_value) to make them bindable.
pub trait Element: Default + Send + Sync + 'static {
    const KIND: ValueKind;

    /// Converts one textual wire value.
    fn parse_text(text: &str) -> Result<Self, CoerceError>;

    /// Textual wire form, `None` for values that only travel as files.
    fn render_text(&self) -> Option<String>;

    fn from_file(_part: FilePart) -> Option<Self> {
        None
    }

    fn as_file(&self) -> Option<&FilePart> {
        None
    }

    fn is_zero(&self) -> bool;

    fn to_json(&self) -> Value;
}

/// Static type information of a bindable field, readable without an instance.
pub trait FieldType {
    const KIND: ValueKind;
    const REPEATED: bool = false;
}

/// Object safe access to a text or file carrying field.
pub trait FieldValue: Reset + Send + Sync {
    fn kind(&self) -> ValueKind;

    /// Replaces the value from textual wire values.
    ///
    /// An empty `values` slice leaves the field untouched. On error the field is
    /// left untouched as well, the caller decides whether to zero it.
    fn set_text(&mut self, values: &[&str]) -> Result<(), CoerceError>;

    /// Appends the textual wire form of the current value to `out`.
    fn write_text(&self, out: &mut Vec<String>);

    /// Replaces the value from multipart files, returns `false` if the field
    /// can't hold files.
    fn set_files(&mut self, files: Vec<FilePart>) -> bool;

    fn files(&self) -> Vec<&FilePart>;

    fn is_zero(&self) -> bool;

    fn to_json(&self) -> Value;
}

/// Object safe access to a field holding a whole structured body.
pub trait BodyValue: Reset + Send + Sync {
    /// Decodes `bytes` into the field, which is untouched if decoding fails.
    fn decode_from(&mut self, codec: Codec, bytes: &[u8]) -> Result<(), CodecError>;

    fn encode_with(&self, codec: Codec) -> Result<Vec<u8>, CodecError>;

    fn is_zero(&self) -> bool;

    fn to_json(&self) -> Value;
}

impl<T> BodyValue for T
where
    T: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
{
    fn decode_from(&mut self, codec: Codec, bytes: &[u8]) -> Result<(), CodecError> {
        *self = codec.decode(bytes)?;
        Ok(())
    }

    fn encode_with(&self, codec: Codec) -> Result<Vec<u8>, CodecError> {
        codec.encode(self)
    }

    fn is_zero(&self) -> bool {
        match (serde_json::to_value(self), serde_json::to_value(T::default())) {
            (Ok(current), Ok(zero)) => current == zero,
            _ => false,
        }
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl<E: Element> FieldType for Vec<E> {
    const KIND: ValueKind = E::KIND;
    const REPEATED: bool = true;
}

impl<E: Element> FieldValue for Vec<E> {
    fn kind(&self) -> ValueKind {
        E::KIND
    }

    fn set_text(&mut self, values: &[&str]) -> Result<(), CoerceError> {
        let parsed = match values {
            [] => return Ok(()),
            [single] if single.is_empty() => Vec::new(),
            // a single value may carry the whole list comma separated
            [single] => single.split(',').map(|s| E::parse_text(s.trim())).collect::<Result<Vec<_>, _>>()?,
            values => values.iter().map(|s| E::parse_text(s)).collect::<Result<Vec<_>, _>>()?,
        };
        *self = parsed;
        Ok(())
    }

    fn write_text(&self, out: &mut Vec<String>) {
        out.extend(self.iter().filter_map(Element::render_text));
    }

    fn set_files(&mut self, files: Vec<FilePart>) -> bool {
        match files.into_iter().map(E::from_file).collect::<Option<Vec<_>>>() {
            Some(elements) => {
                *self = elements;
                true
            }
            None => false,
        }
    }

    fn files(&self) -> Vec<&FilePart> {
        self.iter().filter_map(Element::as_file).collect()
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn to_json(&self) -> Value {
        Value::Array(self.iter().map(Element::to_json).collect())
    }
}

impl<E: Element> FieldType for Option<E> {
    const KIND: ValueKind = E::KIND;
}

impl<E: Element> FieldValue for Option<E> {
    fn kind(&self) -> ValueKind {
        E::KIND
    }

    fn set_text(&mut self, values: &[&str]) -> Result<(), CoerceError> {
        if let Some(first) = values.first() {
            *self = Some(E::parse_text(first)?);
        }
        Ok(())
    }

    fn write_text(&self, out: &mut Vec<String>) {
        out.extend(self.as_ref().and_then(Element::render_text));
    }

    fn set_files(&mut self, files: Vec<FilePart>) -> bool {
        match files.into_iter().next() {
            Some(file) => match E::from_file(file) {
                Some(element) => {
                    *self = Some(element);
                    true
                }
                None => false,
            },
            None => E::from_file(FilePart::default()).is_some(),
        }
    }

    fn files(&self) -> Vec<&FilePart> {
        self.as_ref().and_then(Element::as_file).into_iter().collect()
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn to_json(&self) -> Value {
        self.as_ref().map_or(Value::Null, Element::to_json)
    }
}

#[doc(hidden)]
pub mod single {
    //! Shared bodies of the [`FieldValue`] impls written by `impl_field_value!`.

    use super::{Element, FilePart};
    use crate::error::CoerceError;

    pub fn set_text<E: Element>(target: &mut E, values: &[&str]) -> Result<(), CoerceError> {
        if let Some(first) = values.first() {
            *target = E::parse_text(first)?;
        }
        Ok(())
    }

    pub fn write_text<E: Element>(target: &E, out: &mut Vec<String>) {
        out.extend(target.render_text());
    }

    pub fn set_files<E: Element>(target: &mut E, files: Vec<FilePart>) -> bool {
        match files.into_iter().next() {
            Some(file) => match E::from_file(file) {
                Some(element) => {
                    *target = element;
                    true
                }
                None => false,
            },
            // nothing to bind, still report whether files are acceptable at all
            None => E::from_file(FilePart::default()).is_some(),
        }
    }

    pub fn files<E: Element>(target: &E) -> Vec<&FilePart> {
        target.as_file().into_iter().collect()
    }
}

/// Implements [`FieldType`] and [`FieldValue`] for one or more [`Element`] types.
///
/// # Example
/// ```
/// use micro_bind::error::CoerceError;
/// use micro_bind::value::{Element, ValueKind};
///
/// #[derive(Debug, Default, Clone, Copy, PartialEq)]
/// enum Order {
///     #[default]
///     Asc,
///     Desc,
/// }
///
/// impl Element for Order {
///     const KIND: ValueKind = ValueKind::String;
///
///     fn parse_text(text: &str) -> Result<Self, CoerceError> {
///         match text {
///             "asc" => Ok(Order::Asc),
///             "desc" => Ok(Order::Desc),
///             other => Err(CoerceError::new("order", other)),
///         }
///     }
///
///     fn render_text(&self) -> Option<String> {
///         Some(match self { Order::Asc => "asc", Order::Desc => "desc" }.to_string())
///     }
///
///     fn is_zero(&self) -> bool {
///         *self == Order::Asc
///     }
///
///     fn to_json(&self) -> serde_json::Value {
///         self.render_text().into()
///     }
/// }
///
/// micro_bind::impl_field_value!(Order);
/// ```
#[macro_export]
macro_rules! impl_field_value {
    ($($ty:ty),* $(,)?) => {
        $(
        impl $crate::value::FieldType for $ty {
            const KIND: $crate::value::ValueKind = <$ty as $crate::value::Element>::KIND;
        }

        impl $crate::value::FieldValue for $ty {
            fn kind(&self) -> $crate::value::ValueKind {
                <$ty as $crate::value::Element>::KIND
            }

            fn set_text(&mut self, values: &[&str]) -> ::core::result::Result<(), $crate::error::CoerceError> {
                $crate::value::single::set_text(self, values)
            }

            fn write_text(&self, out: &mut ::std::vec::Vec<::std::string::String>) {
                $crate::value::single::write_text(self, out)
            }

            fn set_files(&mut self, files: ::std::vec::Vec<$crate::value::FilePart>) -> bool {
                $crate::value::single::set_files(self, files)
            }

            fn files(&self) -> ::std::vec::Vec<&$crate::value::FilePart> {
                $crate::value::single::files(self)
            }

            fn is_zero(&self) -> bool {
                <$ty as $crate::value::Element>::is_zero(self)
            }

            fn to_json(&self) -> $crate::value::JsonValue {
                <$ty as $crate::value::Element>::to_json(self)
            }
        }
        )*
    };
}

impl Element for String {
    const KIND: ValueKind = ValueKind::String;

    fn parse_text(text: &str) -> Result<Self, CoerceError> {
        Ok(text.to_owned())
    }

    fn render_text(&self) -> Option<String> {
        Some(self.clone())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Element for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn parse_text(text: &str) -> Result<Self, CoerceError> {
        match text {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(CoerceError::new("bool", text)),
        }
    }

    fn render_text(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn is_zero(&self) -> bool {
        !*self
    }

    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }
}

impl Element for char {
    const KIND: ValueKind = ValueKind::Char;

    fn parse_text(text: &str) -> Result<Self, CoerceError> {
        match text.parse() {
            Ok(c) => Ok(c),
            Err(_) => Err(CoerceError::new("char", text)),
        }
    }

    fn render_text(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn is_zero(&self) -> bool {
        *self == '\0'
    }

    fn to_json(&self) -> Value {
        Value::String(self.to_string())
    }
}

macro_rules! impl_element_for_integer {
    ($kind:ident, $($ty:ident)*) => {
        $(
        impl Element for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn parse_text(text: &str) -> Result<Self, CoerceError> {
                match text.parse::<$ty>() {
                    Ok(n) => Ok(n),
                    Err(_) => Err(CoerceError::new(stringify!($ty), text)),
                }
            }

            fn render_text(&self) -> Option<String> {
                Some(self.to_string())
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }

            fn to_json(&self) -> Value {
                serde_json::to_value(self).unwrap_or_else(|_e| Value::String(self.to_string()))
            }
        }
        )*
    };
}

impl_element_for_integer!(Int, i8 i16 i32 i64 i128 isize);
impl_element_for_integer!(Uint, u8 u16 u32 u64 u128 usize);

macro_rules! impl_element_for_float {
    ($($ty:ident)*) => {
        $(
        impl Element for $ty {
            const KIND: ValueKind = ValueKind::Float;

            fn parse_text(text: &str) -> Result<Self, CoerceError> {
                match text.parse::<$ty>() {
                    Ok(n) => Ok(n),
                    Err(_) => Err(CoerceError::new(stringify!($ty), text)),
                }
            }

            fn render_text(&self) -> Option<String> {
                Some(self.to_string())
            }

            fn is_zero(&self) -> bool {
                self.to_bits() == 0
            }

            fn to_json(&self) -> Value {
                serde_json::to_value(self).unwrap_or(Value::Null)
            }
        }
        )*
    };
}

impl_element_for_float!(f32 f64);

impl_field_value!(
    String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, FilePart
);
