//! End-to-end scenarios across bus, strategies and chains.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chainbus::{
    Bus, BusConfig, BusRegistry, ChainPublisher, HandlerError, MessageHandler, Narrow,
    PublishStrategy,
};

fn counter(hits: &Arc<AtomicUsize>) -> impl Fn(&i32) + Send + Sync + 'static {
    let hits = Arc::clone(hits);
    move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn int_counter_publish_and_unsubscribe() {
    let bus = Bus::<i32>::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let sub = bus.subscribe_sync(counter(&hits));

    bus.publish(123);
    bus.publish_async(123, CancellationToken::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    sub.unsubscribe();
    bus.publish(123);
    bus.publish_async(123, CancellationToken::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscriber_count_settles_to_live_handles() {
    let bus = Bus::<i32>::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let bus = bus.clone();
        let hits = Arc::clone(&hits);
        tasks.push(tokio::spawn(async move {
            let sub = bus.subscribe_sync(counter(&hits));
            bus.publish_async(i, CancellationToken::new()).await.unwrap();
            if i % 2 == 0 {
                sub.unsubscribe();
                sub.unsubscribe();
                None
            } else {
                Some(sub)
            }
        }));
    }

    let mut live = Vec::new();
    for t in tasks {
        if let Some(sub) = t.await.unwrap() {
            live.push(sub);
        }
    }

    assert_eq!(bus.subscriber_count(), live.len());
    assert_eq!(live.len(), 8);
}

#[tokio::test]
async fn parallel_publish_waits_for_all_and_reports_failure() {
    let bus = Bus::<i32>::new();
    let done = Arc::new(AtomicUsize::new(0));

    for ms in [30u64, 10, 20] {
        let done = Arc::clone(&done);
        bus.subscribe_fn(move |_m, _c| {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                done.fetch_add(1, Ordering::SeqCst);
                if ms == 10 {
                    Err(HandlerError::fail("ten"))
                } else {
                    Ok(())
                }
            }
        });
    }

    let res = bus.publish_async(1, CancellationToken::new()).await;
    assert_eq!(res, Err(HandlerError::fail("ten")));
    assert_eq!(done.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn serial_strategy_stops_at_first_failure() {
    let bus = Bus::<i32>::with_config(&BusConfig::with_strategy(PublishStrategy::Serial));
    let ran = Arc::new(AtomicUsize::new(0));

    for fail in [false, true, false, false] {
        let ran = Arc::clone(&ran);
        bus.subscribe_fn(move |_m, _c| {
            ran.fetch_add(1, Ordering::SeqCst);
            async move {
                if fail {
                    Err(HandlerError::fatal("stop"))
                } else {
                    Ok(())
                }
            }
        });
    }

    let res = bus.publish_async(1, CancellationToken::new()).await;
    assert_eq!(res, Err(HandlerError::fatal("stop")));
    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn detached_bus_hides_failures() {
    let config = BusConfig {
        strategy: PublishStrategy::Parallel,
        detached: true,
    };
    let bus = Bus::<i32>::with_config(&config);
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    bus.subscribe_fn(move |_m, _c| {
        h.fetch_add(1, Ordering::SeqCst);
        async { Err(HandlerError::fail("never seen")) }
    });

    assert_eq!(bus.publish_async(1, CancellationToken::new()).await, Ok(()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_cap_holds_under_many_publishes() {
    let bus = Bus::<i32>::with_config(&BusConfig::with_strategy(PublishStrategy::ForcedParallel));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let (r, p, d) = (Arc::clone(&running), Arc::clone(&peak), Arc::clone(&done));
    let sub = bus
        .subscribe_chain(|b| {
            b.concurrent(2).handler(move |_m: Arc<i32>, _c| {
                let (r, p, d) = (Arc::clone(&r), Arc::clone(&p), Arc::clone(&d));
                async move {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    r.fetch_sub(1, Ordering::SeqCst);
                    d.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        })
        .unwrap();

    let publishes = (0..50).map(|i| {
        let bus = bus.clone();
        tokio::spawn(async move { bus.publish_async(i, CancellationToken::new()).await })
    });
    for p in futures::future::join_all(publishes).await {
        p.unwrap().unwrap();
    }

    assert_eq!(done.load(Ordering::SeqCst), 50);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    sub.unsubscribe();
}

struct Inbox(Arc<AtomicUsize>);

#[async_trait]
impl MessageHandler<i32> for Inbox {
    async fn handle(&self, _m: Arc<i32>, _c: CancellationToken) -> Result<(), HandlerError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn weak_binding_ends_with_its_target() {
    let bus = Bus::<i32>::new();
    let weak_hits = Arc::new(AtomicUsize::new(0));
    let strong_hits = Arc::new(AtomicUsize::new(0));

    let weak_target = Arc::new(Inbox(Arc::clone(&weak_hits)));
    let strong_target = Arc::new(Inbox(Arc::clone(&strong_hits)));
    bus.subscribe_chain(|b| b.weak_reference(&weak_target)).unwrap();
    bus.subscribe_chain(|b| b.handler_ref(Arc::clone(&strong_target))).unwrap();
    drop(strong_target);

    bus.publish_async(1, CancellationToken::new()).await.unwrap();
    drop(weak_target);
    assert_eq!(bus.subscriber_count(), 2);

    bus.publish_async(2, CancellationToken::new()).await.unwrap();
    bus.publish_async(3, CancellationToken::new()).await.unwrap();

    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(weak_hits.load(Ordering::SeqCst), 1);
    assert_eq!(strong_hits.load(Ordering::SeqCst), 3);
}

enum Reading {
    Temperature(Arc<i32>),
    Humidity(Arc<u8>),
}

impl Narrow<i32> for Reading {
    fn narrow(message: &Arc<Self>) -> Option<Arc<i32>> {
        match message.as_ref() {
            Reading::Temperature(t) => Some(Arc::clone(t)),
            Reading::Humidity(_) => None,
        }
    }
}

#[tokio::test]
async fn filtered_message_never_reaches_the_terminal() {
    let bus = Bus::<Reading>::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    bus.subscribe_chain(|b| {
        b.filter(|r: &Reading| !matches!(r, Reading::Humidity(h) if **h > 90))
            .of_type::<i32>()
            .handler_sync(counter(&h))
    })
    .unwrap();

    bus.publish_async(Reading::Humidity(Arc::new(95)), CancellationToken::new())
        .await
        .unwrap();
    bus.publish_async(Reading::Humidity(Arc::new(40)), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    bus.publish_async(Reading::Temperature(Arc::new(21)), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chain_publisher_caps_deliveries_bus_wide() {
    let publisher = ChainPublisher::<i32>::new(|b| b.concurrent(1).deliver()).unwrap();
    let bus = Bus::with_publisher(Arc::new(publisher));
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        bus.subscribe_sync(counter(&hits));
    }

    bus.publish_async(7, CancellationToken::new()).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn registry_hands_out_shared_buses() {
    let registry = BusRegistry::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let _sub = registry.bus::<i32>().subscribe_sync(counter(&hits));

    registry
        .bus::<i32>()
        .publish_async(1, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);
}
