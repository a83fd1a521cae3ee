use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;

use axum::AddExtensionLayer;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::cache::ResponseCache;
use crate::context::{self, AppContext};
use crate::cors;
use crate::hub::vhost::VhostRegistry;
use crate::routes::routes;
use crate::shutdown;

pub fn run(listener: TcpListener) -> anyhow::Result<impl Future<Output = Result<(), hyper::Error>>> {
    let ctx = AppContext::new(
        Arc::new(VhostRegistry::new()),
        Arc::new(ResponseCache::new(context::cache_root())),
    );

    let app = routes().layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(ConcurrencyLimitLayer::new(64))
            .layer(cors::cors_layer())
            .layer(AddExtensionLayer::new(ctx)),
    );

    let server = axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown::signal());

    Ok(server)
}
