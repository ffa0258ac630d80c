#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

// These are documented public exports since either the `App` trait or the adapter's public API
// depends on them.
pub use async_trait;
pub use aws_lambda_events::alb::{
  AlbTargetGroupRequest, AlbTargetGroupRequestContext, AlbTargetGroupResponse,
};
pub use aws_lambda_events::encodings::Body;
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
pub use lambda_runtime::{Context as LambdaContext, LambdaEvent};

/// Translation between ALB events and HTTP requests/responses.
pub mod accessor;

pub use accessor::{RemoteAddr, RequestAccessor, ResponseWriter};

mod adapter;

pub use adapter::AlbAdapter;

/// Client address resolution.
pub mod addr;

mod app;

pub use app::App;

/// Error handling.
pub mod error;

pub use error::EventError;

/// Request and response types seen by the application.
pub mod native;

pub use native::RequestCtx;

mod runtime;

pub use runtime::run_lambda;

#[cfg(test)]
mod test_util;
