use std::sync::Arc;

use axum::http::Method;

use crate::app::App;
use crate::path::join;
use crate::route::{Middleware, Route};
use crate::security::Security;

/// A path prefix with tags, securities and middlewares shared by the routes
/// registered through it. Groups nest.
pub struct Group<'a> {
    app: &'a mut App,
    prefix: String,
    tags: Vec<String>,
    securities: Vec<Arc<dyn Security>>,
    middlewares: Vec<Middleware>,
}

impl<'a> Group<'a> {
    pub(crate) fn new(app: &'a mut App, prefix: &str) -> Self {
        Self {
            app,
            prefix: prefix.to_owned(),
            tags: Vec::new(),
            securities: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn security(mut self, security: impl Security) -> Self {
        self.securities.push(Arc::new(security));
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// A nested group inheriting this group's prefix and settings.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: join(&self.prefix, prefix),
            tags: self.tags.clone(),
            securities: self.securities.clone(),
            middlewares: self.middlewares.clone(),
            app: &mut *self.app,
        }
    }

    pub fn handle(&mut self, path: &str, method: Method, route: Route) -> &mut Self {
        let route = route.inherit(&self.tags, &self.securities, &self.middlewares);
        self.app.handle(&join(&self.prefix, path), method, route);
        self
    }

    pub fn get(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::GET, route)
    }

    pub fn post(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::POST, route)
    }

    pub fn put(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::PUT, route)
    }

    pub fn patch(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::PATCH, route)
    }

    pub fn delete(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::DELETE, route)
    }

    pub fn head(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::HEAD, route)
    }

    pub fn options(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::OPTIONS, route)
    }
}
