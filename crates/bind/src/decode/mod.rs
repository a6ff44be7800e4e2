//! Server direction: filling a record from an incoming request.
//!
//! The [`Decoder`] walks the descriptors of a record in declaration order and
//! binds each field from its source. Absent values leave a field untouched.
//! Coercion failures follow the configured [`CoercionPolicy`], while form,
//! multipart and body failures abort the decode right away. Validation runs
//! last and its error wins over an otherwise successful decode.

mod wire;

use crate::codec::ContentTypeTable;
use crate::config::{BindConfig, CoercionPolicy};
use crate::descriptor::{FieldDescriptor, SourceKind};
use crate::error::BindError;
use crate::log_filter::LogFilter;
use crate::metadata::TypeMetadata;
use crate::record::{FieldMut, Record};
use crate::request::RequestContext;
use crate::snapshot::ParsedParameterSnapshot;
use crate::validate::{TagValidator, Validator, validate};
use crate::value::{BodyValue, FieldValue, ValueKind};
use bytes::Bytes;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use wire::{WireNeeds, WireState};

pub struct Decoder {
    table: Arc<ContentTypeTable>,
    coercion: CoercionPolicy,
    max_multipart_memory: usize,
    capture_snapshot: bool,
    log_filter: LogFilter,
    validator: Option<Arc<dyn Validator>>,
}

impl Decoder {
    /// A decoder configured by `config`, validating with [`TagValidator`]
    /// unless validation is disabled.
    pub fn new(config: &BindConfig) -> Self {
        let validator: Option<Arc<dyn Validator>> =
            config.validate.then(|| Arc::new(TagValidator) as Arc<dyn Validator>);
        Self {
            table: Arc::new(config.content_type_table()),
            coercion: config.coercion,
            max_multipart_memory: config.max_multipart_memory,
            capture_snapshot: config.capture_snapshot,
            log_filter: config.log_filter(),
            validator,
        }
    }

    /// Replaces the dispatch table that picks body codecs.
    pub fn with_table(mut self, table: Arc<ContentTypeTable>) -> Self {
        self.table = table;
        self
    }

    /// Replaces the validator, `None` disables validation.
    pub fn with_validator(mut self, validator: Option<Arc<dyn Validator>>) -> Self {
        self.validator = validator;
        self
    }

    pub fn table(&self) -> &Arc<ContentTypeTable> {
        &self.table
    }

    /// Binds `target` from the request and validates it.
    ///
    /// Returns the parameter snapshot when snapshot capture is enabled.
    pub fn decode_into<R: Record>(
        &self,
        metadata: &TypeMetadata<R>,
        ctx: RequestContext<'_>,
        body: &Bytes,
        target: &mut R,
    ) -> Result<Option<ParsedParameterSnapshot>, BindError> {
        let wire = WireState::prepare(ctx, body, WireNeeds::of(metadata.descriptors()), self.max_multipart_memory)?;

        target.visit_fields_mut(|index, slot| match metadata.descriptor_at(index) {
            Some(descriptor) => self.bind_field(descriptor, slot, &wire, body),
            None => Ok(()),
        })?;

        let snapshot = self.capture_snapshot.then(|| self.snapshot(metadata, target));

        if let Some(validator) = &self.validator {
            validate(validator.as_ref(), metadata, target)?;
        }
        Ok(snapshot)
    }

    fn bind_field(
        &self,
        descriptor: &FieldDescriptor,
        slot: FieldMut<'_>,
        wire: &WireState<'_>,
        body: &Bytes,
    ) -> Result<(), BindError> {
        match (descriptor.source(), slot) {
            (SourceKind::None, _) => Ok(()),
            (SourceKind::Body, FieldMut::Body(field)) => self.bind_body(field, wire, body),
            (SourceKind::Form | SourceKind::Multipart, FieldMut::Value(field)) if field.kind() == ValueKind::File => {
                let files = wire.files(descriptor);
                if !files.is_empty() && !field.set_files(files) {
                    debug!(field = descriptor.field_name(), "field can't hold uploaded files");
                }
                Ok(())
            }
            (_, FieldMut::Value(field)) => self.coerce(descriptor, field, &wire.text_values(descriptor)),
            (source, _) => {
                warn!(field = descriptor.field_name(), source = %source, "field can't be bound from its source");
                Ok(())
            }
        }
    }

    fn bind_body(&self, field: &mut dyn BodyValue, wire: &WireState<'_>, body: &Bytes) -> Result<(), BindError> {
        if body.is_empty() {
            return Ok(());
        }
        let codec = self.table.dispatch(SourceKind::Body, wire.ctx().content_type());
        field.decode_from(codec, body)?;
        Ok(())
    }

    fn coerce(
        &self,
        descriptor: &FieldDescriptor,
        field: &mut dyn FieldValue,
        values: &[&str],
    ) -> Result<(), BindError> {
        let Err(e) = field.set_text(values) else {
            return Ok(());
        };

        match self.coercion {
            CoercionPolicy::Lenient => {
                debug!(
                    field = descriptor.field_name(),
                    source = %descriptor.source(),
                    cause = %e,
                    "coercion failed, use zero value"
                );
                field.reset();
                Ok(())
            }
            CoercionPolicy::Strict => Err(BindError::coerce(descriptor.wire_name(), descriptor.source(), e)),
        }
    }

    fn snapshot<R: Record>(&self, metadata: &TypeMetadata<R>, record: &R) -> ParsedParameterSnapshot {
        let mut snapshot = ParsedParameterSnapshot::new();
        let Ok(()) = record.visit_fields(|index, field| {
            if let Some(descriptor) = metadata.descriptor_at(index)
                && !matches!(descriptor.source(), SourceKind::None | SourceKind::Multipart)
                && !field.is_zero()
            {
                snapshot.insert(descriptor.source().category(), descriptor.wire_name(), field.to_json());
            }
            Ok::<_, Infallible>(())
        });

        self.log_filter.apply(&mut snapshot);
        debug!(record = metadata.type_name(), parameters = %snapshot, "parsed parameters");
        snapshot
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&BindConfig::default())
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("table", &self.table)
            .field("coercion", &self.coercion)
            .field("max_multipart_memory", &self.max_multipart_memory)
            .field("capture_snapshot", &self.capture_snapshot)
            .field("log_filter", &self.log_filter)
            .field("validate", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::multipart::MultipartWriter;
    use crate::error::{CodecError, MultipartError};
    use crate::record::{Delete, Get, Post};
    use crate::request::PathParams;
    use crate::value::FilePart;
    use http::request::Parts;
    use http::{Method, Request};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Title {
        title: String,
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct GetUser {
            _get: Get => embed,
            id: String => path,
            name: String => query,
            body: Title => body,
            trace: String => header(name = "x-trace"),
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Search {
            page: u32 => query,
            tags: Vec<String> => query(name = "tag"),
            ids: Vec<u64> => query(name = "id"),
            limit: Option<u16> => query,
            exact: bool => query,
            lang: Vec<String> => header(name = "accept-language"),
            session: String => cookie(name = "sid"),
            theme: Option<String> => cookies,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Login {
            _post: Post => embed,
            user: String => form,
            password: String => urlencoded,
            remember: bool => form,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Upload {
            _post: Post => embed,
            title: String => form,
            avatar: FilePart => multipart,
            attachments: Vec<FilePart> => multipart(name = "attachment"),
            caption: String => multipart,
        }
    }

    fn parts(method: Method, uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn decode<R: Record>(decoder: &Decoder, parts: &Parts, params: &PathParams, body: &[u8]) -> Result<R, BindError> {
        let metadata = TypeMetadata::<R>::build();
        let mut record = R::default();
        decoder.decode_into(&metadata, RequestContext::new(parts, params), &Bytes::copy_from_slice(body), &mut record)?;
        Ok(record)
    }

    fn id_42() -> PathParams {
        [("id", "42")].into_iter().collect()
    }

    #[test]
    fn query_path_and_body() {
        let parts = parts(Method::GET, "/users/42?name=joe", &[("content-type", "application/json")]);
        let user: GetUser = decode(&Decoder::default(), &parts, &id_42(), br#"{"title":"x"}"#).unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.name, "joe");
        assert_eq!(user.body, Title { title: "x".into() });
    }

    #[test]
    fn absent_values_are_not_errors() {
        let parts = parts(Method::GET, "/users", &[]);
        let user: GetUser = decode(&Decoder::default(), &parts, &PathParams::empty(), b"").unwrap();
        assert_eq!(user, GetUser::default());
    }

    #[test]
    fn malformed_body_stops_at_the_body_field() {
        let parts = parts(
            Method::POST,
            "/users/42?name=joe",
            &[("content-type", "application/json"), ("x-trace", "abc")],
        );
        let metadata = TypeMetadata::<GetUser>::build();
        let mut user = GetUser::default();
        let params = id_42();
        let err = Decoder::default()
            .decode_into(&metadata, RequestContext::new(&parts, &params), &Bytes::from_static(b"not json"), &mut user)
            .unwrap_err();

        assert!(matches!(err, BindError::Body { source: CodecError::Json { .. } }));
        assert_eq!(user.id, "42");
        assert_eq!(user.name, "joe");
        assert_eq!(user.trace, "");
    }

    #[test]
    fn body_codec_follows_content_type() {
        let xml = parts(Method::POST, "/", &[("content-type", "application/xml")]);
        let user: GetUser =
            decode(&Decoder::default(), &xml, &PathParams::empty(), b"<Title><title>x</title></Title>").unwrap();
        assert_eq!(user.body.title, "x");

        for content_type in [None, Some("application/unknown")] {
            let headers: Vec<_> = content_type.map(|ct| ("content-type", ct)).into_iter().collect();
            let parts = parts(Method::POST, "/", &headers);
            let user: GetUser = decode(&Decoder::default(), &parts, &PathParams::empty(), br#"{"title":"y"}"#).unwrap();
            assert_eq!(user.body.title, "y");
        }
    }

    #[test]
    fn query_header_and_cookie_values() {
        let parts = parts(
            Method::GET,
            "/search?page=3&tag=a&tag=b&id=1,2,3&limit=10&exact=t",
            &[("accept-language", "en"), ("accept-language", "fr"), ("cookie", "sid=s1; theme=\"dark\"")],
        );
        let search: Search = decode(&Decoder::default(), &parts, &PathParams::empty(), b"").unwrap();
        assert_eq!(
            search,
            Search {
                page: 3,
                tags: vec!["a".into(), "b".into()],
                ids: vec![1, 2, 3],
                limit: Some(10),
                exact: true,
                lang: vec!["en".into(), "fr".into()],
                session: "s1".into(),
                theme: Some("dark".into()),
            }
        );
    }

    #[test]
    fn lenient_coercion_uses_zero_values() {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).with_test_writer().finish();
        let parts = parts(Method::GET, "/search?page=three&limit=-1&id=1,x&exact=maybe", &[]);
        let search: Search = tracing::subscriber::with_default(subscriber, || {
            decode(&Decoder::default(), &parts, &PathParams::empty(), b"").unwrap()
        });
        assert_eq!(search, Search::default());
    }

    #[test]
    fn strict_coercion_fails() {
        let decoder = Decoder::new(&BindConfig { coercion: CoercionPolicy::Strict, ..BindConfig::default() });
        let parts = parts(Method::GET, "/search?page=three", &[]);
        let err = decode::<Search>(&decoder, &parts, &PathParams::empty(), b"").unwrap_err();
        assert_eq!(err.to_string(), "invalid query value for `page`: can't convert `three` into u32");
    }

    #[test]
    fn urlencoded_form() {
        let form = [("content-type", "application/x-www-form-urlencoded")];
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let parts = parts(method.clone(), "/login?remember=1", &form);
            let login: Login =
                decode(&Decoder::default(), &parts, &PathParams::empty(), b"user=joe&password=p%40ss").unwrap();
            assert_eq!(login.user, "joe", "{method}");
            assert_eq!(login.password, "p@ss", "{method}");
            assert!(login.remember, "{method}");
        }

        let parts = parts(Method::GET, "/login?user=query", &form);
        let login: Login = decode(&Decoder::default(), &parts, &PathParams::empty(), b"user=body").unwrap();
        assert_eq!(login.user, "query");
    }

    #[test]
    fn form_body_takes_precedence_over_query() {
        let parts = parts(Method::POST, "/login?user=query", &[("content-type", "application/x-www-form-urlencoded")]);
        let login: Login = decode(&Decoder::default(), &parts, &PathParams::empty(), b"user=body").unwrap();
        assert_eq!(login.user, "body");
    }

    fn multipart_body() -> (String, Bytes) {
        let mut writer = MultipartWriter::in_memory();
        writer.write_field("title", "holiday").unwrap();
        writer.write_field("caption", "beach").unwrap();
        writer.write_file("avatar", &FilePart::new("me.png", "hello").with_content_type("image/png")).unwrap();
        writer.write_file("attachment", &FilePart::new("a.txt", "1")).unwrap();
        writer.write_file("attachment", &FilePart::new("b.txt", "2")).unwrap();
        let content_type = writer.content_type();
        (content_type, writer.close().unwrap().into_inner().freeze())
    }

    #[test]
    fn multipart_files_and_values() {
        let (content_type, body) = multipart_body();
        let parts = parts(Method::POST, "/upload", &[("content-type", content_type.as_str())]);
        let upload: Upload = decode(&Decoder::default(), &parts, &PathParams::empty(), &body).unwrap();

        assert_eq!(upload.title, "holiday");
        assert_eq!(upload.caption, "beach");
        assert_eq!(upload.avatar.filename(), "me.png");
        assert_eq!(upload.avatar.content_type(), Some("image/png"));
        assert_eq!(upload.avatar.data().as_ref(), b"hello");
        let names: Vec<_> = upload.attachments.iter().map(FilePart::filename).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn multipart_needs_multipart_content_type() {
        let (_, body) = multipart_body();
        let parts = parts(Method::POST, "/upload", &[("content-type", "text/plain")]);
        let upload: Upload = decode(&Decoder::default(), &parts, &PathParams::empty(), &body).unwrap();
        assert_eq!(upload, Upload::default());
    }

    #[test]
    fn multipart_over_limit() {
        let (content_type, body) = multipart_body();
        let decoder = Decoder::new(&BindConfig { max_multipart_memory: 16, ..BindConfig::default() });
        let parts = parts(Method::POST, "/upload", &[("content-type", content_type.as_str())]);
        let err = decode::<Upload>(&decoder, &parts, &PathParams::empty(), &body).unwrap_err();
        assert!(matches!(err, BindError::Multipart { source: MultipartError::TooLarge { limit: 16, .. } }));
    }

    #[test]
    fn snapshot_groups_and_redacts() {
        let config =
            BindConfig { capture_snapshot: true, redact: vec!["form.password".into()], ..BindConfig::default() };
        let decoder = Decoder::new(&config);
        let parts = parts(Method::DELETE, "/login", &[("content-type", "application/x-www-form-urlencoded")]);
        let params = PathParams::empty();
        let metadata = TypeMetadata::<Login>::build();
        let mut login = Login::default();

        let snapshot = decoder
            .decode_into(
                &metadata,
                RequestContext::new(&parts, &params),
                &Bytes::from_static(b"user=joe&password=secret"),
                &mut login,
            )
            .unwrap()
            .unwrap();

        assert_eq!(login.password, "secret");
        assert_eq!(snapshot.get("form", "user"), Some(&json!("joe")));
        assert_eq!(snapshot.get("form", "password"), Some(&json!(crate::log_filter::REDACTED)));
        // zero values are left out
        assert_eq!(snapshot.get("form", "remember"), None);
    }

    #[test]
    fn snapshot_skips_multipart_fields() {
        let (content_type, body) = multipart_body();
        let decoder = Decoder::new(&BindConfig { capture_snapshot: true, ..BindConfig::default() });
        let parts = parts(Method::POST, "/upload", &[("content-type", content_type.as_str())]);
        let params = PathParams::empty();
        let metadata = TypeMetadata::<Upload>::build();
        let mut upload = Upload::default();

        let snapshot =
            decoder.decode_into(&metadata, RequestContext::new(&parts, &params), &body, &mut upload).unwrap().unwrap();
        assert_eq!(snapshot.get("form", "title"), Some(&json!("holiday")));
        assert!(snapshot.category("multipart").is_none());
    }

    crate::record! {
        #[derive(Debug, Default)]
        struct Remove {
            _delete: Delete => embed,
            id: u64 => path(validate = "required"),
            reason: String => query(validate = "oneof=spam duplicate"),
        }
    }

    #[test]
    fn validation_runs_after_binding() {
        let parts = parts(Method::DELETE, "/items/7?reason=boring", &[]);
        let params: PathParams = [("id", "7")].into_iter().collect();
        let metadata = TypeMetadata::<Remove>::build();
        let mut remove = Remove::default();

        let err = Decoder::default()
            .decode_into(&metadata, RequestContext::new(&parts, &params), &Bytes::new(), &mut remove)
            .unwrap_err();
        let source = match err {
            BindError::Validation { source } => source,
            other => panic!("expected a validation error, got {other:?}"),
        };
        assert_eq!(source.violations().len(), 1);
        assert_eq!(source.violations()[0].path(), "query.reason");
        assert_eq!(remove.id, 7);

        let lenient = Decoder::default().with_validator(None);
        let mut remove = Remove::default();
        lenient.decode_into(&metadata, RequestContext::new(&parts, &params), &Bytes::new(), &mut remove).unwrap();
        assert_eq!(remove.reason, "boring");
    }
}
