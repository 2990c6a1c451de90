use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use futures::future::Ready;
use futures::future::ready;
use quanta::Clock;
use quanta::Mock;
use tick_limit::ClockedBucket;
use tick_limit::Rate;
use tick_limit::TokenBucket;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceExt;

use super::*;

#[derive(Clone, Debug)]
struct MockService {
    pub count: Arc<AtomicUsize>,
}

impl Service<()> for MockService {
    type Response = ();
    type Error = BoxError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ()) -> Self::Future {
        self.count.fetch_add(1, Ordering::SeqCst);
        ready(Ok(()))
    }
}

/// A full bucket of `capacity` tokens refilling 1 per 100ms tick on a mock clock.
fn mock_limiter(capacity: u64) -> (Arc<ClockedBucket>, Arc<Mock>) {
    let capacity = NonZeroU64::new(capacity).unwrap();
    let rate = Rate::per_tick(NonZeroU64::new(1).unwrap());
    let bucket = TokenBucket::with_tokens(rate, capacity, capacity.get(), 0).unwrap();
    let (clock, mock) = Clock::mock();
    let limiter =
        ClockedBucket::with_clock(bucket, clock).with_resolution(Duration::from_millis(100));
    (Arc::new(limiter), mock)
}

fn mock_service() -> (MockService, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (
        MockService {
            count: Arc::clone(&count),
        },
        count,
    )
}

#[tokio::test]
async fn test_rejects_immediately_then_recovers() {
    let (limiter, mock) = mock_limiter(2);
    let (inner, count) = mock_service();
    let mut service = RateLimitLayer::new(limiter).layer(inner);

    for _ in 0..2 {
        ServiceExt::<()>::ready(&mut service).await.unwrap();
        service.call(()).await.unwrap();
    }

    let err = ServiceExt::<()>::ready(&mut service)
        .await
        .expect_err("should be rate limited");
    assert_eq!(
        err.downcast_ref::<TickError>(),
        Some(&TickError::RateLimited {
            retry_after: Duration::from_millis(100)
        })
    );
    assert_eq!(count.load(Ordering::SeqCst), 2);

    mock.increment(Duration::from_millis(100));

    ServiceExt::<()>::ready(&mut service)
        .await
        .expect("should recover");
    service.call(()).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permit_is_held_until_call() {
    let (limiter, _mock) = mock_limiter(2);
    let (inner, count) = mock_service();
    let mut service = RateLimitService::new(inner, Arc::clone(&limiter));

    ServiceExt::<()>::ready(&mut service).await.unwrap();
    ServiceExt::<()>::ready(&mut service).await.unwrap();
    assert!(service.has_permit());
    assert_eq!(limiter.bucket().available(0), 1);

    service.call(()).await.unwrap();
    assert!(!service.has_permit());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clones_share_the_limiter() {
    let (limiter, _mock) = mock_limiter(1);
    let (inner, _count) = mock_service();
    let mut first = RateLimitLayer::new(limiter).layer(inner);
    let mut second = first.clone();

    ServiceExt::<()>::ready(&mut first).await.unwrap();
    assert!(ServiceExt::<()>::ready(&mut second).await.is_err());
    first.call(()).await.unwrap();
}

#[tokio::test]
async fn test_inner_errors_pass_through() {
    let (limiter, _mock) = mock_limiter(1);
    let inner = tower::service_fn(|_req: ()| async { Err::<(), BoxError>("boom".into()) });
    let mut service = RateLimitLayer::new(limiter).layer(inner);

    let err = service.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(err.downcast_ref::<TickError>().is_none());
    assert_eq!(err.to_string(), "boom");
}

#[tokio::test]
async fn test_actual_concurrency() {
    let capacity = 100;
    let (limiter, _mock) = mock_limiter(capacity as u64);
    let (inner, count) = mock_service();
    let service = RateLimitLayer::new(limiter).layer(inner);

    let mut handles = vec![];

    for _ in 0..capacity + 10 {
        let mut svc = service.clone();
        handles.push(tokio::spawn(async move {
            match ServiceExt::<()>::ready(&mut svc).await {
                Ok(ready_svc) => ready_svc.call(()).await,
                Err(e) => Err(e),
            }
        }));
    }

    let results = futures::future::join_all(handles).await;
    let success_count = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(()))))
        .count();

    // Even with multiple tasks, exactly 'capacity' should pass
    assert_eq!(success_count, capacity);
    assert_eq!(count.load(Ordering::SeqCst), capacity);
}

#[tokio::test]
async fn test_rejection_does_not_wait() {
    tokio::time::pause();
    let start = tokio::time::Instant::now();

    let (limiter, _mock) = mock_limiter(1);
    let (inner, _count) = mock_service();
    let mut service = RateLimitLayer::new(limiter).layer(inner);

    ServiceExt::<()>::ready(&mut service).await.unwrap();
    service.call(()).await.unwrap();

    // With time frozen, a service that slept for capacity would never resolve.
    let rejected = tokio::time::timeout(
        Duration::from_secs(1),
        ServiceExt::<()>::ready(&mut service),
    )
    .await
    .expect("rejection should be immediate");
    assert!(rejected.is_err());
    assert_eq!(tokio::time::Instant::now(), start);
}
