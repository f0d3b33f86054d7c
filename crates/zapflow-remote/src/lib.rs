//! # Zapflow Remote
//!
//! Client for the hosted Earth-observation compute platform.
//!
//! The platform is a black box that accepts declarative raster expressions
//! ([`ImageExpr`]) and either answers scalar queries synchronously or queues
//! asynchronous export tasks addressed by [`TaskHandle`]. The
//! [`RemotePlatform`] trait is the seam between the pipeline and the wire;
//! [`HttpPlatform`] is the production implementation.

pub mod auth;
pub mod error;
pub mod expr;
pub mod http;
pub mod models;
pub mod platform;

pub use auth::{BearerAuth, NoAuth, RequestAuth};
pub use error::{Error, Result};
pub use expr::ImageExpr;
pub use http::{HttpPlatform, HttpPlatformOptions};
pub use models::{
    ExportFormat, ExportRequest, RemoteTaskState, RemoteTaskStatus, SceneQuery, TaskHandle,
};
pub use platform::RemotePlatform;
