use std::ops::ControlFlow;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tick_limit::Reason;
use tick_limit::Strategy;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use crate::error::TickError;

#[derive(Clone, Debug)]
struct RateLimitServiceMetrics {
    granted: Counter<u64>,
    rejected: Counter<u64>,
}

/// Holds at most one permit, taken in `poll_ready` and spent by `call`.
#[derive(Debug)]
pub struct RateLimitService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    permit_acquired: bool,
    instruments: RateLimitServiceMetrics,
}

// A clone starts without a permit; permits are not shared.
impl<L, S> Clone for RateLimitService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            permit_acquired: false,
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S, Req> Service<Req> for RateLimitService<L, S>
where
    L: Strategy + ?Sized,
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Wait for the inner service first to avoid taking tokens we cannot use
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        if !self.permit_acquired {
            match self.limiter.process() {
                ControlFlow::Continue(_) => {
                    self.instruments.granted.add(1, &[]);
                    self.permit_acquired = true;
                }
                ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                    self.instruments.rejected.add(1, &[]);
                    debug!(?retry_after, "request rate limited");
                    return Poll::Ready(Err(Box::new(TickError::RateLimited { retry_after })));
                }
            }
        }

        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.permit_acquired = false;
        self.inner.call(req)
    }
}

impl<L, S> RateLimitService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        let meter = global::meter("rate_limit_service");
        let instruments = RateLimitServiceMetrics {
            granted: meter.u64_counter("permits_granted").build(),
            rejected: meter.u64_counter("permits_rejected").build(),
        };

        Self {
            inner,
            limiter,
            permit_acquired: false,
            instruments,
        }
    }

    /// Whether a permit is being held for the next `call`.
    pub fn has_permit(&self) -> bool {
        self.permit_acquired
    }
}
