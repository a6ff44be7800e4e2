//! The entry point tying cache, pool, decoder and encoder together.
//!
//! A [`Binder`] is built once and shared by every request:
//!
//! ```no_run
//! # use micro_bind::{Binder, PathParams, record, Get};
//! # use http::Request;
//! # use http_body_util::Full;
//! # use bytes::Bytes;
//! record! {
//!     #[derive(Debug, Default)]
//!     struct ShowUser {
//!         _get: Get => embed,
//!         id: u64 => path,
//!         verbose: bool => query,
//!     }
//! }
//!
//! # async fn run() -> Result<(), micro_bind::error::BindError> {
//! let binder = Binder::builder().build();
//! binder.prewarm::<(ShowUser,)>();
//!
//! let request = Request::get("/users/7?verbose=1").body(Full::new(Bytes::new())).unwrap();
//! let params: PathParams = [("id", "7")].into_iter().collect();
//! let bound = binder.bind::<ShowUser, _>(request, &params).await?;
//! assert_eq!(bound.id, 7);
//! # Ok(())
//! # }
//! ```

use crate::codec::ContentTypeTable;
use crate::config::BindConfig;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{BindError, CodecError, EncodeError};
use crate::metadata::{MetadataCache, RecordSet, TypeMetadata};
use crate::pool::Pooled;
use crate::record::{MethodMarker, Record};
use crate::request::{PathParams, RequestContext};
use crate::snapshot::ParsedParameterSnapshot;
use crate::validate::Validator;
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::fmt::{self, Display};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone)]
enum CacheRef {
    Global,
    Owned(Arc<MetadataCache>),
}

impl Deref for CacheRef {
    type Target = MetadataCache;

    fn deref(&self) -> &Self::Target {
        match self {
            CacheRef::Global => MetadataCache::global(),
            CacheRef::Owned(cache) => cache,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binder {
    decoder: Arc<Decoder>,
    encoder: Encoder,
    cache: CacheRef,
    config: Arc<BindConfig>,
}

impl Binder {
    pub fn builder() -> BinderBuilder {
        BinderBuilder::new()
    }

    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn table(&self) -> &Arc<ContentTypeTable> {
        self.encoder.table()
    }

    pub fn metadata<R: Record>(&self) -> Arc<TypeMetadata<R>> {
        self.cache.get_or_build::<R>()
    }

    /// Builds the metadata of every record in `S` ahead of the first request.
    pub fn prewarm<S: RecordSet>(&self) {
        self.cache.prewarm::<S>();
    }

    /// Binds a pooled `R` from `request`.
    pub async fn bind<R, B>(
        &self,
        request: Request<B>,
        path_params: &PathParams,
    ) -> Result<Bound<R>, BindError>
    where
        R: Record,
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let metadata = self.metadata::<R>();
        self.bind_with(&metadata, request, path_params).await
    }

    /// Same as [`Binder::bind`] with metadata the caller already holds.
    ///
    /// The body is only read when a field of `R` needs it. On error the
    /// instance goes straight back to the pool.
    pub async fn bind_with<R, B>(
        &self,
        metadata: &TypeMetadata<R>,
        request: Request<B>,
        path_params: &PathParams,
    ) -> Result<Bound<R>, BindError>
    where
        R: Record,
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let (parts, body) = request.into_parts();
        let body = if metadata.reads_body() {
            body.collect().await.map_err(BindError::read_body)?.to_bytes()
        } else {
            trace!(record = metadata.type_name(), "skip reading request body");
            Bytes::new()
        };

        let mut record = metadata.acquire();
        let ctx = RequestContext::new(&parts, path_params);
        let snapshot = self.decoder.decode_into(metadata, ctx, &body, &mut *record)?;
        Ok(Bound { record, snapshot })
    }

    /// Encodes `record` into a request, see [`Encoder::encode`].
    pub fn encode<R: Record>(
        &self,
        method: Method,
        url_template: &str,
        record: &R,
    ) -> Result<Request<Bytes>, EncodeError> {
        let metadata = self.metadata::<R>();
        self.encoder.encode(&metadata, method, url_template, record)
    }

    /// Encodes `record` with the method of the marker `M`.
    pub fn request_for<M: MethodMarker, R: Record>(
        &self,
        url_template: &str,
        record: &R,
    ) -> Result<Request<Bytes>, EncodeError> {
        self.encode(M::METHOD, url_template, record)
    }

    pub fn decode_response<T, B>(&self, response: &Response<B>) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
        B: AsRef<[u8]>,
    {
        self.table().decode_response(response)
    }
}

impl Default for Binder {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builds a [`Binder`].
///
/// Without an explicit cache the binder owns a fresh one sized by
/// [`BindConfig::pool_capacity`].
pub struct BinderBuilder {
    config: BindConfig,
    validator: Option<Arc<dyn Validator>>,
    cache: Option<CacheRef>,
    table: Option<Arc<ContentTypeTable>>,
}

impl BinderBuilder {
    fn new() -> Self {
        Self { config: BindConfig::default(), validator: None, cache: None, table: None }
    }

    pub fn config(mut self, config: BindConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the tag validator. Ignored when the config disables validation.
    pub fn validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(CacheRef::Owned(cache));
        self
    }

    /// Shares [`MetadataCache::global`] with every other binder doing the same.
    pub fn global_cache(mut self) -> Self {
        self.cache = Some(CacheRef::Global);
        self
    }

    /// Replaces the dispatch table built from the config.
    pub fn table(mut self, table: ContentTypeTable) -> Self {
        self.table = Some(Arc::new(table));
        self
    }

    pub fn build(self) -> Binder {
        let Self { config, validator, cache, table } = self;

        let table = table.unwrap_or_else(|| Arc::new(config.content_type_table()));
        let mut decoder = Decoder::new(&config).with_table(Arc::clone(&table));
        if config.validate
            && let Some(validator) = validator
        {
            decoder = decoder.with_validator(Some(validator));
        }

        let cache = cache
            .unwrap_or_else(|| CacheRef::Owned(Arc::new(MetadataCache::with_pool_capacity(config.pool_capacity))));

        Binder { decoder: Arc::new(decoder), encoder: Encoder::new(table), cache, config: Arc::new(config) }
    }
}

impl fmt::Debug for BinderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderBuilder")
            .field("config", &self.config)
            .field("validator", &self.validator.is_some())
            .field("cache", &self.cache)
            .field("table", &self.table)
            .finish()
    }
}

/// A bound record, returned to its pool when dropped.
#[derive(Debug)]
pub struct Bound<R: Record> {
    record: Pooled<R>,
    snapshot: Option<ParsedParameterSnapshot>,
}

impl<R: Record> Bound<R> {
    /// The parsed parameters, when snapshot capture is enabled.
    pub fn snapshot(&self) -> Option<&ParsedParameterSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn take_snapshot(&mut self) -> Option<ParsedParameterSnapshot> {
        self.snapshot.take()
    }

    /// Takes the record out of pool management.
    pub fn into_inner(self) -> R {
        *self.record.detach()
    }
}

impl<R: Record> Deref for Bound<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

impl<R: Record> DerefMut for Bound<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.record
    }
}
