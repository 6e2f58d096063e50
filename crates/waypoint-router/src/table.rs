//! Route registration.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::debug;

use crate::config::{MatchStrategy, RoutesConfig};
use crate::error::{Result, RouterError};
use crate::handler::{ControllerRegistry, HandlerRef};
use crate::pattern::{CombinedPattern, CompiledPattern};
use crate::request::Method;

/// One or more HTTP methods a route is registered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Methods(Vec<Method>);

impl Methods {
    /// Parses a list of method names.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownMethod`] for the first unknown name.
    pub fn parse<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().trim().parse())
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Iterates over the methods.
    pub fn iter(&self) -> impl Iterator<Item = Method> + '_ {
        self.0.iter().copied()
    }
}

/// Accepts a single name or a comma-separated list such as `GET,POST`.
impl FromStr for Methods {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.split(','))
    }
}

impl From<Method> for Methods {
    fn from(method: Method) -> Self {
        Self(vec![method])
    }
}

impl<const N: usize> From<[Method; N]> for Methods {
    fn from(methods: [Method; N]) -> Self {
        Self(methods.to_vec())
    }
}

impl From<&[Method]> for Methods {
    fn from(methods: &[Method]) -> Self {
        Self(methods.to_vec())
    }
}

impl From<Vec<Method>> for Methods {
    fn from(methods: Vec<Method>) -> Self {
        Self(methods)
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    method: Method,
    pattern: CompiledPattern,
    handler: HandlerRef,
}

impl RouteEntry {
    /// HTTP method of the route.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The template the route was registered with.
    #[must_use]
    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    /// The compiled template.
    #[must_use]
    pub const fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// The route's handler.
    #[must_use]
    pub const fn handler(&self) -> &HandlerRef {
        &self.handler
    }
}

/// Routes grouped by HTTP method, in registration order.
///
/// Registration order is match priority: when several routes match a path the
/// one registered first is selected, however specific the others are.
///
/// # Example
///
/// ```
/// use waypoint_router::{handler, Args, Method, Request, Response, RouteTable};
///
/// let show = handler(|_: Request, res: Response, _: Args| async move { res });
/// let table = RouteTable::new()
///     .get("/users/{id:\\d+}", show.clone())?
///     .add_route([Method::Put, Method::Patch], "/users/{id}", show)?
///     .post("/users", "app/controllers/User@create")?;
///
/// assert_eq!(table.len(), 4);
/// assert_eq!(table.entries(Method::Delete).len(), 0);
/// # Ok::<(), waypoint_router::RouterError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<Method, Vec<RouteEntry>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from route declarations, in declaration order.
    ///
    /// # Errors
    ///
    /// Fails on the first unknown method or malformed template.
    pub fn from_config(config: &RoutesConfig) -> Result<Self> {
        let mut table = Self::new();
        for decl in &config.routes {
            table.register(decl.methods()?, &decl.pattern, decl.handler.as_str())?;
        }
        Ok(table)
    }

    /// Appends a route for every given method.
    ///
    /// The template is compiled here, so a malformed template is reported at
    /// registration rather than on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn register(
        &mut self,
        methods: impl Into<Methods>,
        pattern: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<()> {
        let compiled = CompiledPattern::compile(pattern)?;
        let methods: Methods = methods.into();
        let handler: HandlerRef = handler.into();

        for method in methods.iter() {
            debug!(%method, template = pattern, "registered route");
            self.routes.entry(method).or_default().push(RouteEntry {
                method,
                pattern: compiled.clone(),
                handler: handler.clone(),
            });
        }
        Ok(())
    }

    /// Adds a route for one or more methods.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn add_route(
        mut self,
        methods: impl Into<Methods>,
        pattern: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<Self> {
        self.register(methods, pattern, handler)?;
        Ok(self)
    }

    /// Adds a GET route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn get(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Get, pattern, handler)
    }

    /// Adds a POST route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn post(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Post, pattern, handler)
    }

    /// Adds a PUT route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn put(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Put, pattern, handler)
    }

    /// Adds a DELETE route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn delete(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Delete, pattern, handler)
    }

    /// Adds a PATCH route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn patch(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Patch, pattern, handler)
    }

    /// Adds a HEAD route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn head(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Head, pattern, handler)
    }

    /// Adds an OPTIONS route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::PatternSyntax`] if the template does not compile.
    pub fn options(self, pattern: &str, handler: impl Into<HandlerRef>) -> Result<Self> {
        self.add_route(Method::Options, pattern, handler)
    }

    /// Routes registered for a method, in registration order.
    ///
    /// A method without routes has an empty list.
    #[must_use]
    pub fn entries(&self, method: Method) -> &[RouteEntry] {
        self.routes.get(&method).map_or(&[][..], Vec::as_slice)
    }

    /// Total number of entries across all methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every entry, grouped by method.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values().flatten()
    }

    /// Methods that have at least one route.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.routes.keys().copied()
    }

    /// Finds the first route of `method` matching `path`, with its captured
    /// values.
    #[must_use]
    pub fn find(&self, method: Method, path: &str) -> Option<(usize, Vec<String>)> {
        self.entries(method)
            .iter()
            .enumerate()
            .find_map(|(index, entry)| entry.pattern.match_path(path).map(|v| (index, v)))
    }

    /// Joins the templates of a method into one [`CombinedPattern`], in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Fails if the joined expression cannot be compiled.
    pub fn combined(&self, method: Method) -> Result<CombinedPattern> {
        CombinedPattern::from_patterns(
            self.entries(method)
                .iter()
                .map(|entry| entry.pattern.clone())
                .collect(),
        )
    }

    /// Finds the first matching route with the given strategy.
    ///
    /// The combined expression is built on every call, so this suits one-off
    /// lookups; a [`Dispatcher`](crate::Dispatcher) keeps it compiled.
    ///
    /// # Errors
    ///
    /// Fails if the combined expression cannot be compiled.
    pub fn find_with(
        &self,
        strategy: MatchStrategy,
        method: Method,
        path: &str,
    ) -> Result<Option<(usize, Vec<String>)>> {
        match strategy {
            MatchStrategy::Sequential => Ok(self.find(method, path)),
            MatchStrategy::Combined => Ok(self.combined(method)?.match_path(path)),
        }
    }

    /// Checks that every `module@action` reference is well formed, without
    /// resolving it.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] for the first malformed
    /// reference.
    pub fn check_references(&self) -> Result<()> {
        for entry in self.iter() {
            if let HandlerRef::Reference(reference) = &entry.handler {
                HandlerRef::split_reference(reference)?;
            }
        }
        Ok(())
    }

    /// Replaces every `module@action` reference with the handler it names.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::HandlerContract`] for the first reference that
    /// does not resolve.
    pub fn resolve_handlers(&mut self, registry: &ControllerRegistry) -> Result<()> {
        for entry in self.routes.values_mut().flatten() {
            if let HandlerRef::Reference(reference) = &entry.handler {
                let resolved = registry.resolve(reference)?;
                debug!(handler = %reference, template = entry.template(), "resolved handler reference");
                entry.handler = HandlerRef::Callable(resolved);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler, Actions, Args, Handler};
    use crate::request::Request;
    use crate::response::Response;

    fn noop() -> Handler {
        handler(|_req: Request, res: Response, _args: Args| async move { res })
    }

    #[test]
    fn test_methods_conversions() {
        assert_eq!(Methods::from(Method::Get).iter().collect::<Vec<_>>(), vec![Method::Get]);
        assert_eq!(
            Methods::from([Method::Put, Method::Patch]).iter().collect::<Vec<_>>(),
            vec![Method::Put, Method::Patch]
        );
        assert_eq!(
            "get, post".parse::<Methods>(),
            Ok(Methods(vec![Method::Get, Method::Post]))
        );
        assert_eq!(
            "GET,FETCH".parse::<Methods>(),
            Err(RouterError::UnknownMethod("FETCH".to_string()))
        );
    }

    #[test]
    fn test_register_per_method() {
        let table = RouteTable::new()
            .add_route([Method::Get, Method::Head], "/", noop())
            .unwrap()
            .post("/users", "user@create")
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.entries(Method::Get).len(), 1);
        assert_eq!(table.entries(Method::Head).len(), 1);
        assert_eq!(table.entries(Method::Post)[0].template(), "/users");
        assert!(table.entries(Method::Options).is_empty());
        assert_eq!(
            table.methods().collect::<Vec<_>>(),
            vec![Method::Get, Method::Post, Method::Head]
        );
    }

    #[test]
    fn test_register_rejects_bad_template() {
        let err = RouteTable::new().get("/users/{id", noop()).unwrap_err();
        assert!(matches!(err, RouterError::PatternSyntax { .. }));
    }

    #[test]
    fn test_find_first_registered_wins() {
        let table = RouteTable::new()
            .get("/users/{name}", noop())
            .unwrap()
            .get(r"/users/{id:\d+}", noop())
            .unwrap()
            .get("/users/{name}", noop())
            .unwrap();

        assert_eq!(table.find(Method::Get, "/users/42"), Some((0, vec!["42".to_string()])));
        assert_eq!(table.find(Method::Post, "/users/42"), None);
        assert_eq!(table.find(Method::Get, "/posts/42"), None);
    }

    #[test]
    fn test_combined_follows_registration_order() {
        let table = RouteTable::new()
            .get("/a/{x}", noop())
            .unwrap()
            .get("/b", noop())
            .unwrap();

        let combined = table.combined(Method::Get).unwrap();
        assert_eq!(combined.match_path("/b"), Some((1, vec![])));
        assert!(table.combined(Method::Put).unwrap().is_empty());
    }

    #[test]
    fn test_find_with_strategy() {
        let table = RouteTable::new()
            .get("/users/{name}", noop())
            .unwrap()
            .get(r"/users/{id:\d+}/{tab}", noop())
            .unwrap()
            .get("/", noop())
            .unwrap();

        for path in ["/users/bob", "/users/7/posts", "/", "/users", "/users/é"] {
            let sequential = table.find_with(MatchStrategy::Sequential, Method::Get, path);
            let combined = table.find_with(MatchStrategy::Combined, Method::Get, path);
            assert_eq!(sequential, combined, "{path}");
        }
        assert_eq!(
            table.find_with(MatchStrategy::Combined, Method::Get, "/users/7/posts"),
            Ok(Some((1, vec!["7".to_string(), "posts".to_string()])))
        );
        assert_eq!(
            table.find_with(MatchStrategy::Combined, Method::Post, "/"),
            Ok(None)
        );
    }

    #[test]
    fn test_check_references() {
        let table = RouteTable::new()
            .get("/", "home")
            .unwrap()
            .get("/users", "user@list")
            .unwrap()
            .get("/x", noop())
            .unwrap();
        assert_eq!(table.check_references(), Ok(()));

        let table = table.post("/users", "user@create@now").unwrap();
        assert_eq!(
            table.check_references(),
            Err(RouterError::HandlerContract {
                handler: "user@create@now".to_string(),
                reason: "more than one `@`".to_string(),
            })
        );
        assert!(RouteTable::new().get("/", "@show").unwrap().check_references().is_err());
    }

    #[test]
    fn test_resolve_handlers() {
        let registry = ControllerRegistry::new()
            .controller("user", Actions::new().action("index", noop()));
        let mut table = RouteTable::new()
            .get("/users", "user")
            .unwrap()
            .get("/", noop())
            .unwrap();

        table.resolve_handlers(&registry).unwrap();
        assert!(table.iter().all(|entry| !entry.handler().is_reference()));

        let mut table = RouteTable::new().get("/users", "user@show").unwrap();
        assert!(matches!(
            table.resolve_handlers(&registry),
            Err(RouterError::HandlerContract { .. })
        ));
    }
}
