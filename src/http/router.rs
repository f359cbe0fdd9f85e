use std::collections::HashMap;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::static_files;
use crate::server::state::AppState;

/// The unread part of the request body (multipart uploads only).
pub type BodyReader<'a> = &'a mut (dyn AsyncRead + Unpin + Send);

/// An endpoint in the route table.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, app: &AppState, request: &Request, body: BodyReader<'_>) -> Response;
}

struct Route {
    methods: &'static [Method],
    handler: Box<dyn Handler>,
}

/// Exact-match route table with static content as the fallback.
#[derive(Default)]
pub struct Router {
    routes: HashMap<&'static str, Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        path: &'static str,
        methods: &'static [Method],
        handler: impl Handler + 'static,
    ) -> Self {
        self.routes.insert(
            path,
            Route {
                methods,
                handler: Box::new(handler),
            },
        );
        self
    }

    /// Routes a request; unknown paths are served from the content directory.
    pub async fn dispatch(&self, app: &AppState, request: &Request, body: BodyReader<'_>) -> Response {
        match self.routes.get(request.path.as_str()) {
            Some(route) if route.methods.contains(&request.method) => {
                route.handler.handle(app, request, body).await
            }
            Some(_) => Response::method_not_allowed(),
            None => {
                let relative = request.path.strip_prefix('/').unwrap_or(&request.path);
                static_files::serve(app.content_dir(), relative).await
            }
        }
    }
}
