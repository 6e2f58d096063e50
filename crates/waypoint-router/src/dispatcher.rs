//! Request dispatch.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::config::{MatchStrategy, RoutesConfig};
use crate::error::{Result, RouterError};
use crate::handler::{Args, ControllerRegistry, HandlerRef};
use crate::pattern::CombinedPattern;
use crate::request::{Method, PathParams, Request};
use crate::response::Response;
use crate::table::{RouteEntry, RouteTable};

/// The route selected for a request.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched entry.
    pub entry: &'a RouteEntry,
    /// Position of the entry among the routes of its method.
    pub index: usize,
    /// Captured values, in placeholder order.
    pub values: Vec<String>,
}

impl RouteMatch<'_> {
    /// Positional arguments for the handler.
    ///
    /// A literal route yields the single null argument.
    #[must_use]
    pub fn args(&self) -> Args {
        if self.entry.pattern().param_names().is_none() {
            Args::null()
        } else {
            Args::from_values(self.values.clone())
        }
    }

    /// Captured values keyed by placeholder name.
    ///
    /// A repeated placeholder name keeps its last value.
    #[must_use]
    pub fn params(&self) -> PathParams {
        let mut params = PathParams::new();
        for (name, value) in self
            .entry
            .pattern()
            .param_names()
            .unwrap_or_default()
            .iter()
            .zip(&self.values)
        {
            params.insert(name.as_str(), value.as_str());
        }
        params
    }
}

/// Dispatches requests to the handlers of a [`RouteTable`].
///
/// The table is frozen once moved in: every handler reference has been
/// resolved and, for [`MatchStrategy::Combined`], every method's combined
/// pattern built. Dispatch only reads, so one dispatcher can serve concurrent
/// requests behind an `Arc`.
///
/// # Example
///
/// ```
/// use waypoint_router::{handler, Args, Dispatcher, Request, Response, RouteTable};
///
/// # tokio_test::block_on(async {
/// let table = RouteTable::new().get(
///     "/home/{uid}",
///     handler(|req: Request, res: Response, _: Args| async move {
///         res.body(format!("home of {}", req.param("uid").unwrap_or("?")))
///     }),
/// )?;
/// let dispatcher = Dispatcher::new(table)?;
///
/// let res = dispatcher.dispatch(Request::get("/home/42"), Response::ok()).await?;
/// assert_eq!(res.body_string().as_deref(), Some("home of 42"));
/// # Ok::<(), waypoint_router::RouterError>(())
/// # }).unwrap();
/// ```
#[derive(Debug)]
pub struct Dispatcher {
    table: RouteTable,
    strategy: MatchStrategy,
    combined: BTreeMap<Method, CombinedPattern>,
}

impl Dispatcher {
    /// Creates a sequential dispatcher over a table of callables.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] if the table still holds
    /// `module@action` references; use [`Dispatcher::with_controllers`] for
    /// those.
    pub fn new(table: RouteTable) -> Result<Self> {
        Self::with_strategy(table, &ControllerRegistry::new(), MatchStrategy::Sequential)
    }

    /// Creates a sequential dispatcher, resolving references through
    /// `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] for the first reference that
    /// does not resolve.
    pub fn with_controllers(table: RouteTable, registry: &ControllerRegistry) -> Result<Self> {
        Self::with_strategy(table, registry, MatchStrategy::Sequential)
    }

    /// Creates a dispatcher with an explicit lookup strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] for the first reference that
    /// does not resolve.
    pub fn with_strategy(
        mut table: RouteTable,
        registry: &ControllerRegistry,
        strategy: MatchStrategy,
    ) -> Result<Self> {
        table.resolve_handlers(registry)?;

        let mut combined = BTreeMap::new();
        if strategy == MatchStrategy::Combined {
            for method in table.methods() {
                combined.insert(method, table.combined(method)?);
            }
        }

        debug!(routes = table.len(), ?strategy, "dispatcher ready");
        Ok(Self {
            table,
            strategy,
            combined,
        })
    }

    /// Builds a dispatcher from a declaration file's contents.
    ///
    /// # Errors
    ///
    /// Fails on unknown methods, malformed templates and unresolved
    /// references.
    pub fn from_config(config: &RoutesConfig, registry: &ControllerRegistry) -> Result<Self> {
        let table = RouteTable::from_config(config)?;
        Self::with_strategy(table, registry, config.strategy)
    }

    /// The routes being dispatched.
    #[must_use]
    pub const fn table(&self) -> &RouteTable {
        &self.table
    }

    /// The lookup strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Selects the first route of `method` whose template matches `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NotFound`] if no route matches.
    pub fn find(&self, method: Method, path: &str) -> Result<RouteMatch<'_>> {
        let found = match self.strategy {
            MatchStrategy::Sequential => self.table.find(method, path),
            MatchStrategy::Combined => self
                .combined
                .get(&method)
                .and_then(|combined| combined.match_path(path)),
        };

        let Some((index, values)) = found else {
            trace!(%method, path, "no route matched");
            return Err(RouterError::NotFound {
                method: method.to_string(),
                path: path.to_string(),
            });
        };

        let entry = &self.table.entries(method)[index];
        debug!(%method, path, template = entry.template(), "route matched");
        Ok(RouteMatch {
            entry,
            index,
            values,
        })
    }

    /// Routes a request and invokes the matched handler once.
    ///
    /// The captured values are bound into `request.params` by name before the
    /// handler runs and are also passed positionally.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NotFound`] if no route matches; in that case no
    /// handler runs and nothing is bound.
    pub async fn dispatch(&self, mut request: Request, response: Response) -> Result<Response> {
        let matched = self.find(request.method, &request.path)?;

        let handler = match matched.entry.handler() {
            HandlerRef::Callable(handler) => handler.clone(),
            HandlerRef::Reference(reference) => {
                return Err(RouterError::contract(reference, "reference was never resolved"));
            }
        };

        for (name, value) in matched.params().iter() {
            request.params.insert(name, value);
        }
        let args = matched.args();

        Ok(handler(request, response, args).await)
    }

    /// Routes a request and turns routing errors into responses.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request, Response::ok()).await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "dispatch failed");
                err.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler, Actions, Handler};

    fn echo_args() -> Handler {
        handler(|_req: Request, res: Response, args: Args| async move {
            let rendered: Vec<&str> = args.iter().map(|a| a.unwrap_or("null")).collect();
            res.body(rendered.join(","))
        })
    }

    fn table() -> RouteTable {
        RouteTable::new()
            .get("/", echo_args())
            .unwrap()
            .get(r"/home/{uid:\d+}", echo_args())
            .unwrap()
            .get("/home/{name}", echo_args())
            .unwrap()
            .get("/pair/{a}/{b}", echo_args())
            .unwrap()
    }

    #[test]
    fn test_find_binds_values() {
        let dispatcher = Dispatcher::new(table()).unwrap();

        let matched = dispatcher.find(Method::Get, "/home/42").unwrap();
        assert_eq!(matched.index, 1);
        assert_eq!(matched.entry.template(), r"/home/{uid:\d+}");
        assert_eq!(matched.params().get("uid"), Some("42"));
        assert_eq!(matched.args(), Args::from_values(vec!["42".to_string()]));

        let matched = dispatcher.find(Method::Get, "/home/bob").unwrap();
        assert_eq!(matched.index, 2);
        assert_eq!(matched.params().get("name"), Some("bob"));
    }

    #[test]
    fn test_find_literal_route_gets_null_arg() {
        let dispatcher = Dispatcher::new(table()).unwrap();
        let matched = dispatcher.find(Method::Get, "/").unwrap();
        assert!(matched.args().is_null());
        assert!(matched.params().is_empty());
    }

    #[test]
    fn test_find_not_found() {
        let dispatcher = Dispatcher::new(table()).unwrap();
        assert_eq!(
            dispatcher.find(Method::Get, "/nothing").unwrap_err(),
            RouterError::NotFound {
                method: "GET".to_string(),
                path: "/nothing".to_string(),
            }
        );
        assert!(dispatcher.find(Method::Delete, "/").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unresolved_reference_is_rejected() {
        let table = RouteTable::new().get("/", "home@index").unwrap();
        let err = Dispatcher::new(table).unwrap_err();
        assert!(matches!(err, RouterError::HandlerContract { .. }));
    }

    #[test]
    fn test_strategies_agree() {
        let sequential = Dispatcher::new(table()).unwrap();
        let combined =
            Dispatcher::with_strategy(table(), &ControllerRegistry::new(), MatchStrategy::Combined)
                .unwrap();
        assert_eq!(combined.strategy(), MatchStrategy::Combined);

        for path in ["/", "/home/42", "/home/bob/", "/pair/x/y", "/missing", "/home/"] {
            let a = sequential.find(Method::Get, path);
            let b = combined.find(Method::Get, path);
            match (a, b) {
                (Ok(a), Ok(b)) => {
                    assert_eq!(a.index, b.index, "{path}");
                    assert_eq!(a.values, b.values, "{path}");
                }
                (Err(a), Err(b)) => assert_eq!(a, b, "{path}"),
                (a, b) => panic!("strategies disagree on {path}: {a:?} vs {b:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_invokes_handler() {
        let dispatcher = Dispatcher::new(table()).unwrap();

        let res = dispatcher
            .dispatch(Request::get("/pair/1/2?x=y"), Response::ok())
            .await
            .unwrap();
        assert_eq!(res.body_string(), Some("1,2".to_string()));

        let res = dispatcher
            .dispatch(Request::get("/"), Response::ok())
            .await
            .unwrap();
        assert_eq!(res.body_string(), Some("null".to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_binds_request_params() {
        let table = RouteTable::new()
            .get(
                "/users/{id}",
                handler(|req: Request, res: Response, _args: Args| async move {
                    res.body(req.param("id").unwrap_or("missing").to_string())
                }),
            )
            .unwrap();
        let dispatcher = Dispatcher::new(table).unwrap();

        let res = dispatcher.handle(Request::get("/users/9")).await;
        assert_eq!(res.body_string(), Some("9".to_string()));

        let res = dispatcher.handle(Request::get("/users")).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn test_dispatch_through_controllers() {
        let registry = ControllerRegistry::new().controller(
            "user",
            Actions::new()
                .action("index", echo_args())
                .action("show", echo_args()),
        );
        let table = RouteTable::new()
            .get("/users", "user")
            .unwrap()
            .get("/users/{id}", "user@show")
            .unwrap();
        let dispatcher = Dispatcher::with_controllers(table, &registry).unwrap();

        let res = dispatcher.handle(Request::get("/users/5")).await;
        assert_eq!(res.body_string(), Some("5".to_string()));
        let res = dispatcher.handle(Request::get("/users")).await;
        assert_eq!(res.body_string(), Some("null".to_string()));
    }
}
