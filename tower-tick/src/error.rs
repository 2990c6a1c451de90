/// Errors produced by the Tower Tick middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TickError {
    /// The request was rejected due to rate limiting.
    ///
    /// The duration indicates when the client should retry.
    /// When the `axum` feature is enabled, this converts to `429 Too Many Requests`
    /// with a `Retry-After` header.
    #[error("Rate limit exceeded; retry after {retry_after:?}")]
    RateLimited {
        /// The duration to wait before retrying.
        retry_after: std::time::Duration,
    },
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for TickError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let msg = self.to_string();
        match self {
            Self::RateLimited { retry_after } => {
                // Retry-After is whole seconds; round up so clients never retry early.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                let val = axum::http::HeaderValue::from(secs.max(1));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, msg).into_response();
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, val);
                response
            }
        }
    }
}
