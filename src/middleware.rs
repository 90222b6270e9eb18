//! Middleware hooks and chain routing.
//!
//! A [`Middleware`] is a pair of hooks: [`pre_request`](Middleware::pre_request)
//! runs before every network attempt and may rewrite the request or abort it;
//! [`post_response`](Middleware::post_response) runs after every attempt and
//! decides whether the pipeline moves on or restarts the whole request.
//!
//! Each middleware has a [`Scope`]. [`partition`] splits the registered
//! middlewares into the global ones and the path-scoped ones that apply to a
//! given URL. Both phases invoke the global group first, then the scoped group,
//! each in registration order.

use crate::request::Request;
use crate::transport::{BoxFuture, RawResponse};
use crate::BoxError;
use std::sync::Arc;
use url::Url;

/// Which requests a middleware applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every request.
    Global,
    /// Requests whose URL has this exact path segment.
    Path(String),
}

impl Scope {
    /// Builds a scope from a path component.
    ///
    /// `"/"` (or an empty string) means global; otherwise surrounding slashes
    /// are stripped and the rest must equal one path segment.
    ///
    /// ```
    /// use reqflow::Scope;
    ///
    /// assert_eq!(Scope::path("/"), Scope::Global);
    /// assert_eq!(Scope::path("/users/"), Scope::Path("users".to_string()));
    /// ```
    pub fn path(component: impl AsRef<str>) -> Self {
        let token = component.as_ref().trim_matches('/');
        if token.is_empty() {
            Scope::Global
        } else {
            Scope::Path(token.to_string())
        }
    }

    /// Returns `true` if a middleware with this scope runs for `url`.
    pub fn applies_to(&self, url: &Url) -> bool {
        match self {
            Scope::Global => true,
            Scope::Path(token) => url
                .path_segments()
                .is_some_and(|mut segments| segments.any(|segment| segment == token)),
        }
    }
}

/// What a post-response hook wants the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the outcome to the next middleware.
    Next,
    /// Drop this outcome and run the whole request again.
    Retry,
}

/// A pre-request / post-response hook pair.
///
/// Both hooks have pass-through defaults, so a middleware only implements the
/// phases it cares about.
///
/// # Examples
///
/// ```
/// use reqflow::{BoxError, BoxFuture, Decision, Middleware, RawResponse, Request, Scope};
/// use http::{HeaderValue, StatusCode};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Auth {
///     refreshed: AtomicBool,
/// }
///
/// impl Middleware for Auth {
///     fn scope(&self) -> Scope {
///         Scope::path("accounts")
///     }
///
///     fn pre_request(&self, request: &mut Request) -> Result<(), BoxError> {
///         let token = if self.refreshed.load(Ordering::SeqCst) { "new" } else { "old" };
///         request.headers.insert("authorization", HeaderValue::from_str(token)?);
///         Ok(())
///     }
///
///     fn post_response<'a>(
///         &'a self,
///         outcome: &'a RawResponse,
///     ) -> BoxFuture<'a, Result<Decision, BoxError>> {
///         Box::pin(async move {
///             if outcome.status() == Some(StatusCode::UNAUTHORIZED)
///                 && !self.refreshed.swap(true, Ordering::SeqCst)
///             {
///                 return Ok(Decision::Retry);
///             }
///             Ok(Decision::Next)
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Which requests this middleware applies to. Defaults to [`Scope::Global`].
    fn scope(&self) -> Scope {
        Scope::Global
    }

    /// Runs before each network attempt.
    ///
    /// Returning an error aborts the request with
    /// [`Error::Middleware`](crate::Error::Middleware); nothing is sent.
    fn pre_request(&self, _request: &mut Request) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after each network attempt with its raw outcome.
    ///
    /// Returning an error ends the request with
    /// [`Error::Middleware`](crate::Error::Middleware).
    fn post_response<'a>(
        &'a self,
        _outcome: &'a RawResponse,
    ) -> BoxFuture<'a, Result<Decision, BoxError>> {
        Box::pin(async { Ok(Decision::Next) })
    }
}

/// The middlewares that apply to one request, in invocation order.
#[derive(Default)]
pub struct Chain<'m> {
    global: Vec<&'m dyn Middleware>,
    scoped: Vec<&'m dyn Middleware>,
}

impl<'m> Chain<'m> {
    /// Global middlewares, in registration order.
    pub fn global(&self) -> &[&'m dyn Middleware] {
        &self.global
    }

    /// Path-scoped middlewares matching the URL, in registration order.
    pub fn scoped(&self) -> &[&'m dyn Middleware] {
        &self.scoped
    }

    /// All applicable middlewares: global first, then scoped.
    pub fn iter(&self) -> impl Iterator<Item = &'m dyn Middleware> + '_ {
        self.global.iter().chain(self.scoped.iter()).copied()
    }

    /// Number of applicable middlewares.
    pub fn len(&self) -> usize {
        self.global.len() + self.scoped.len()
    }

    /// Returns `true` if no middleware applies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits `middlewares` into the global group and the scoped group matching `url`.
///
/// Pure and cheap; the pipeline calls it anew for each phase of each attempt
/// since a pre-request hook may have changed the URL.
pub fn partition<'m>(middlewares: &'m [Arc<dyn Middleware>], url: &Url) -> Chain<'m> {
    let mut chain = Chain::default();
    for middleware in middlewares {
        match middleware.scope() {
            Scope::Global => chain.global.push(middleware.as_ref()),
            scope if scope.applies_to(url) => chain.scoped.push(middleware.as_ref()),
            _ => {}
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, Scope);

    impl Middleware for Named {
        fn scope(&self) -> Scope {
            self.1.clone()
        }

        fn pre_request(&self, request: &mut Request) -> Result<(), BoxError> {
            request
                .headers
                .append("x-trace", http::HeaderValue::from_static(self.0));
            Ok(())
        }
    }

    fn middlewares() -> Vec<Arc<dyn Middleware>> {
        vec![
            Arc::new(Named("users", Scope::path("users"))),
            Arc::new(Named("global-a", Scope::Global)),
            Arc::new(Named("orders", Scope::path("orders"))),
            Arc::new(Named("global-b", Scope::path("/"))),
            Arc::new(Named("profile", Scope::path("profile"))),
        ]
    }

    fn names(chain: &Chain<'_>) -> Vec<String> {
        let mut request = crate::request::materialize(
            &crate::Endpoint::get("/"),
            &crate::NetworkConfig::new(Url::parse("http://localhost").unwrap()),
        )
        .unwrap();
        for middleware in chain.iter() {
            middleware.pre_request(&mut request).unwrap();
        }
        request
            .headers
            .get_all("x-trace")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn global_before_scoped_in_registration_order() {
        let middlewares = middlewares();
        let url = Url::parse("http://localhost/v1/users/42/profile").unwrap();
        let chain = partition(&middlewares, &url);

        assert_eq!(chain.global().len(), 2);
        assert_eq!(chain.scoped().len(), 2);
        assert_eq!(names(&chain), ["global-a", "global-b", "users", "profile"]);
    }

    #[test]
    fn scope_matches_whole_segments_only() {
        let scope = Scope::path("user");
        assert!(!scope.applies_to(&Url::parse("http://h/users/1").unwrap()));
        assert!(!scope.applies_to(&Url::parse("http://h/a?x=user").unwrap()));
        assert!(scope.applies_to(&Url::parse("http://h/a/user").unwrap()));
    }

    #[test]
    fn only_globals_for_unrelated_paths() {
        let middlewares = middlewares();
        let chain = partition(&middlewares, &Url::parse("http://localhost/health").unwrap());
        assert_eq!(names(&chain), ["global-a", "global-b"]);
        assert!(!chain.is_empty());
    }

    #[test]
    fn empty_registration_gives_empty_chain() {
        let chain = partition(&[], &Url::parse("http://localhost/").unwrap());
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }
}
