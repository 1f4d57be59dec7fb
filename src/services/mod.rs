// Services module - business logic layer

pub mod auth;
pub mod cache;
pub mod rate_limiter;

// Schedule pipeline
pub mod anilist;
pub mod backlog;
pub mod episode;
pub mod media_resolver;
pub mod schedule;
pub mod schedule_cache;

/// Local HTTP server standing in for AniList and the backlog host in tests
#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;

    /// Serve `router` on an ephemeral port and return its base URL
    pub async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
