//! # waypoint-router
//!
//! Path template compilation and first-match request dispatch.
//!
//! This crate provides:
//! - Path templates with named, optionally constrained placeholders
//! - Per-method route tables where registration order is priority
//! - Sequential and combined-alternation lookup strategies
//! - Handlers given as closures or as `module@action` references
//! - JSON route declaration files
//!
//! ## Quick Start
//!
//! ```ignore
//! use waypoint_router::{handler, Args, Dispatcher, Request, Response, RouteTable};
//!
//! async fn show_user(req: Request, res: Response, args: Args) -> Response {
//!     let uid = args.get(0).unwrap_or("unknown");
//!     res.body(format!("user {uid}"))
//! }
//!
//! let table = RouteTable::new()
//!     .get("/home/{uid:\\d+}", handler(show_user))?
//!     .post("/home", "app/controllers/Home@create")?;
//!
//! let dispatcher = Dispatcher::with_controllers(table, &registry)?;
//! let response = dispatcher.dispatch(Request::get("/home/42"), Response::ok()).await?;
//! ```
//!
//! ## Templates
//!
//! | template | expression | parameters |
//! |----------|------------|------------|
//! | `/home/profile` | `^/home/profile/?$` | none |
//! | `/home/{uid}` | `^/home/(\w+)/?$` | `uid` |
//! | `/home/{uid}/{page}` | `^/home/(\w+)/(\w+)/?$` | `uid`, `page` |
//! | `/home/{uid:\d+}` | `^/home/(\d+)/?$` | `uid` |
//!
//! ## Handler references
//!
//! `"module@action"` names an action of a controller registered in a
//! [`ControllerRegistry`]; a bare `"module"` names its `index` action.
//! References are resolved when the [`Dispatcher`] is built.

mod config;
mod dispatcher;
mod error;
mod handler;
mod pattern;
mod request;
mod response;
mod table;

pub use config::{MatchStrategy, MethodSpec, RouteDecl, RoutesConfig};
pub use dispatcher::{Dispatcher, RouteMatch};
pub use error::{Result, RouterError};
pub use handler::{
    handler, Actions, Args, Controller, ControllerRegistry, Handler, HandlerRef, DEFAULT_ACTION,
};
pub use pattern::{CombinedPattern, CompiledPattern, DEFAULT_CONSTRAINT};
pub use request::{Method, PathParams, Request};
pub use response::Response;
pub use table::{Methods, RouteEntry, RouteTable};
