//! Route handlers and `module@action` references.
//!
//! A route is served either by a callable registered directly with the route
//! or by a string reference naming an action of a controller. References are
//! looked up in an explicit [`ControllerRegistry`] when the dispatcher is
//! built, never by name at request time.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::{Result, RouterError};
use crate::request::Request;
use crate::response::Response;

/// Action invoked for references that do not name one.
pub const DEFAULT_ACTION: &str = "index";

/// A boxed async handler function.
///
/// Handlers receive the request (with its path parameters bound), the
/// response to fill in and the positional arguments of the match.
pub type Handler = Arc<dyn Fn(Request, Response, Args) -> BoxFuture<'static, Response> + Send + Sync>;

/// Boxes an async function or closure into a [`Handler`].
///
/// # Example
///
/// ```
/// use waypoint_router::{handler, Args, Request, Response};
///
/// let show = handler(|_req: Request, res: Response, args: Args| async move {
///     res.body(format!("user {}", args.get(0).unwrap_or("?")))
/// });
/// ```
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request, Response, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req, res, args| f(req, res, args).boxed())
}

/// Positional arguments passed to a handler after the request and response.
///
/// A route with placeholders passes one value per placeholder, in template
/// order. A literal route passes a single null argument, so handlers always
/// see at least one positional slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<Option<String>>);

impl Args {
    /// The single null argument of a literal route.
    #[must_use]
    pub fn null() -> Self {
        Self(vec![None])
    }

    /// Arguments bound from captured values.
    #[must_use]
    pub fn from_values(values: Vec<String>) -> Self {
        Self(values.into_iter().map(Some).collect())
    }

    /// Gets the value at a position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(Option::as_deref)
    }

    /// Parses the value at a position.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, index: usize) -> Option<T> {
        self.get(index).and_then(|v| v.parse().ok())
    }

    /// Number of positional slots, the null slot included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no slots at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` for the single null argument of a literal route.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.0.as_slice(), [None])
    }

    /// Iterates over the slots.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(Option::as_deref)
    }

    /// Returns the underlying slots.
    #[must_use]
    pub fn into_inner(self) -> Vec<Option<String>> {
        self.0
    }
}

/// What a route entry invokes.
#[derive(Clone)]
pub enum HandlerRef {
    /// A callable registered with the route.
    Callable(Handler),
    /// A `module@action` reference, or a bare `module` for its `index` action.
    Reference(String),
}

impl HandlerRef {
    /// Splits a reference into its module locator and action name.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] for an empty module or action
    /// and for references with more than one `@`.
    pub fn split_reference(reference: &str) -> Result<(&str, &str)> {
        let (module, action) = reference
            .split_once('@')
            .unwrap_or((reference, DEFAULT_ACTION));

        if module.is_empty() {
            return Err(RouterError::contract(reference, "empty module locator"));
        }
        if action.is_empty() {
            return Err(RouterError::contract(reference, "empty action name"));
        }
        if action.contains('@') {
            return Err(RouterError::contract(reference, "more than one `@`"));
        }
        Ok((module, action))
    }

    /// Returns `true` for a reference that still needs resolving.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl From<Handler> for HandlerRef {
    fn from(handler: Handler) -> Self {
        Self::Callable(handler)
    }
}

impl From<&str> for HandlerRef {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

/// An application object exposing named actions.
pub trait Controller: Send + Sync {
    /// Returns the handler for an action, or `None` if there is no such action.
    fn handler_for(&self, name: &str) -> Option<Handler>;
}

/// A controller assembled from closures.
///
/// # Example
///
/// ```
/// use waypoint_router::{handler, Actions, Args, Request, Response};
///
/// let users = Actions::new()
///     .action("index", handler(|_: Request, res: Response, _: Args| async move { res }))
///     .action("show", handler(|_: Request, res: Response, _: Args| async move { res }));
/// ```
#[derive(Clone, Default)]
pub struct Actions {
    actions: HashMap<String, Handler>,
}

impl Actions {
    /// Creates a controller without actions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action.
    #[must_use]
    pub fn action(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.actions.insert(name.into(), handler);
        self
    }
}

impl Controller for Actions {
    fn handler_for(&self, name: &str) -> Option<Handler> {
        self.actions.get(name).cloned()
    }
}

/// Lookup table from module locators to controllers.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller under a module locator.
    #[must_use]
    pub fn controller(mut self, locator: impl Into<String>, controller: impl Controller + 'static) -> Self {
        self.controllers.insert(locator.into(), Arc::new(controller));
        self
    }

    /// Returns `true` if a controller is registered under `locator`.
    #[must_use]
    pub fn contains(&self, locator: &str) -> bool {
        self.controllers.contains_key(locator)
    }

    /// Resolves a `module@action` reference to a handler.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] if the reference is malformed,
    /// the module is not registered or the controller has no such action.
    pub fn resolve(&self, reference: &str) -> Result<Handler> {
        let (module, action) = HandlerRef::split_reference(reference)?;
        let controller = self
            .controllers
            .get(module)
            .ok_or_else(|| RouterError::contract(reference, format!("unknown module `{module}`")))?;
        controller.handler_for(action).ok_or_else(|| {
            RouterError::contract(
                reference,
                format!("module `{module}` has no action `{action}`"),
            )
        })
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<&String> = self.controllers.keys().collect();
        modules.sort();
        f.debug_struct("ControllerRegistry")
            .field("modules", &modules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(tag: &'static str) -> Handler {
        handler(move |_req: Request, res: Response, _args: Args| async move { res.body(tag) })
    }

    #[test]
    fn test_args() {
        let args = Args::from_values(vec!["7".to_string(), "x".to_string()]);
        assert_eq!(args.len(), 2);
        assert_eq!(args.get(0), Some("7"));
        assert_eq!(args.parse::<u32>(0), Some(7));
        assert_eq!(args.get(2), None);
        assert!(!args.is_null());

        let null = Args::null();
        assert_eq!(null.len(), 1);
        assert!(null.is_null());
        assert_eq!(null.get(0), None);
        assert_eq!(null.iter().collect::<Vec<_>>(), vec![None]);
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(
            HandlerRef::split_reference("app/controllers/User@show").unwrap(),
            ("app/controllers/User", "show")
        );
        assert_eq!(
            HandlerRef::split_reference("app/controllers/User").unwrap(),
            ("app/controllers/User", "index")
        );
        for bad in ["@show", "user@", "a@b@c", ""] {
            assert!(
                matches!(
                    HandlerRef::split_reference(bad),
                    Err(RouterError::HandlerContract { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_registry_resolves_actions() {
        let registry = ControllerRegistry::new().controller(
            "user",
            Actions::new()
                .action("index", echo("list"))
                .action("show", echo("detail")),
        );
        assert!(registry.contains("user"));

        let index = registry.resolve("user").unwrap();
        let res = index(Request::get("/"), Response::ok(), Args::null()).await;
        assert_eq!(res.body_string(), Some("list".to_string()));

        let show = registry.resolve("user@show").unwrap();
        let res = show(Request::get("/"), Response::ok(), Args::null()).await;
        assert_eq!(res.body_string(), Some("detail".to_string()));
    }

    #[test]
    fn test_registry_contract_errors() {
        let registry =
            ControllerRegistry::new().controller("user", Actions::new().action("index", echo("")));

        let err = registry.resolve("post@index").err().unwrap();
        assert_eq!(
            err.to_string(),
            "invalid handler `post@index`: unknown module `post`"
        );

        let err = registry.resolve("user@edit").err().unwrap();
        assert_eq!(
            err.to_string(),
            "invalid handler `user@edit`: module `user` has no action `edit`"
        );
    }

    #[test]
    fn test_handler_ref_conversions() {
        assert!(HandlerRef::from("user@show").is_reference());
        assert!(!HandlerRef::from(echo("x")).is_reference());
        assert_eq!(
            format!("{:?}", HandlerRef::from("user")),
            r#"Reference("user")"#
        );
    }
}
