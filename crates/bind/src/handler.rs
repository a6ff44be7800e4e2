//! Glue for a router: a handler that binds its record before running.
//!
//! The router matches a route, collects its captures into [`PathParams`] and
//! calls [`RequestHandler::invoke`]. A handler made by [`handler_fn`] binds a
//! pooled record, runs the user function and turns its result into a
//! response. The record goes back to the pool once the function returns.

use crate::binder::{Binder, Bound};
use crate::error::BindError;
use crate::metadata::TypeMetadata;
use crate::record::Record;
use crate::request::PathParams;
use crate::responder::Responder;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::combinators::UnsyncBoxBody;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// The request body a router hands to a handler.
pub type ReqBody = UnsyncBoxBody<Bytes, BoxError>;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, request: Request<ReqBody>, path_params: PathParams) -> Result<Response<Bytes>, BindError>;
}

/// An async function taking the bound record.
pub trait BoundFn<R: Record>: Send + Sync {
    type Output: Responder;

    fn call(&self, bound: Bound<R>) -> impl Future<Output = Self::Output> + Send;
}

impl<R, Func, Fut> BoundFn<R> for Func
where
    R: Record,
    Func: Fn(Bound<R>) -> Fut + Send + Sync,
    Fut: Future + Send,
    Fut::Output: Responder,
{
    type Output = Fut::Output;

    #[inline]
    fn call(&self, bound: Bound<R>) -> impl Future<Output = Self::Output> + Send {
        (self)(bound)
    }
}

pub struct FnHandler<R: Record, F> {
    binder: Binder,
    metadata: Arc<TypeMetadata<R>>,
    f: F,
}

/// Wraps `f`, fetching the metadata of `R` now rather than on the first request.
pub fn handler_fn<R, F>(binder: &Binder, f: F) -> FnHandler<R, F>
where
    R: Record,
    F: BoundFn<R>,
{
    FnHandler { binder: binder.clone(), metadata: binder.metadata::<R>(), f }
}

#[async_trait]
impl<R, F> RequestHandler for FnHandler<R, F>
where
    R: Record,
    F: BoundFn<R>,
{
    async fn invoke(&self, request: Request<ReqBody>, path_params: PathParams) -> Result<Response<Bytes>, BindError> {
        let bound = self.binder.bind_with(&self.metadata, request, &path_params).await?;
        Ok(self.f.call(bound).await.response_to())
    }
}

impl<R: Record, F> fmt::Debug for FnHandler<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("record", &self.metadata.type_name()).finish_non_exhaustive()
    }
}
