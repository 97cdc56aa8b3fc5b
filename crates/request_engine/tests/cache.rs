mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{delayed, init, manual, options, sleep_ms};
use request_engine::{clear_cache, CacheKey, CachedData, Request, RequestContext, RequestOptions, Ttl};

fn cached<D, P>(context: &Arc<RequestContext>, key: &str, stale_time: Ttl) -> RequestOptions<D, P> {
    RequestOptions {
        cache_key: Some(CacheKey::from(key)),
        stale_time,
        ..manual(context)
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_cache_answers_without_calling_the_service() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(50), |_: (), n| Ok(n as u32));
    let first = Request::new(
        Arc::clone(&service),
        cached(&context, "fresh", Ttl::Finite(Duration::from_secs(10))),
    );
    assert_eq!(first.run_async(()).await.unwrap(), 1);

    sleep_ms(2_000).await;
    let second = Request::new(service, cached(&context, "fresh", Ttl::Finite(Duration::from_secs(10))));
    assert_eq!(second.data(), Some(1));
    assert!(!second.loading());

    assert_eq!(second.run_async(()).await.unwrap(), 1);
    assert!(!second.loading());
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_cache_serves_interim_data_and_refetches() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(50), |_: (), n| Ok(n as u32));
    let stale_after = Ttl::Finite(Duration::from_secs(1));
    let first = Request::new(Arc::clone(&service), cached(&context, "stale", stale_after));
    first.run_async(()).await.unwrap();

    sleep_ms(1_000).await;
    let second = Request::new(service, cached(&context, "stale", stale_after));
    assert_eq!(second.data(), Some(1));

    let refetch = second.run_async(());
    assert_eq!(second.data(), Some(1));
    assert!(second.loading());
    assert_eq!(refetch.await.unwrap(), 2);
    assert_eq!(calls.count(), 2);
    // the sibling hears about the new entry
    assert_eq!(first.data(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_call_and_one_value() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(500), |_: (), _| {
        Ok(Arc::new("payload".to_string()))
    });
    let opts = || RequestOptions {
        cache_key: Some(CacheKey::from("k")),
        cache_time: Ttl::Finite(Duration::from_secs(5)),
        ..options(&context)
    };

    let first = Request::new(Arc::clone(&service), opts());
    sleep_ms(100).await;
    let second = Request::new(service, opts());
    assert!(second.loading());

    sleep_ms(1_000).await;
    assert_eq!(calls.count(), 1);
    let (a, b) = (first.data().unwrap(), second.data().unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(context.promises().is_empty());
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_cache_time() {
    let context = init();
    let (service, _calls) = delayed(Duration::from_millis(10), |_: (), n| Ok(n as u32));
    let request = Request::new(
        service,
        RequestOptions {
            cache_time: Ttl::Finite(Duration::from_secs(1)),
            ..cached(&context, "expiring", Ttl::Finite(Duration::ZERO))
        },
    );
    request.run_async(()).await.unwrap();
    assert_eq!(context.cache().len(), 1);

    sleep_ms(1_500).await;
    assert!(context.cache().is_empty());
    // state is untouched by eviction
    assert_eq!(request.data(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn clear_cache_drops_global_entries() {
    request_logging::initialize_for_tests();
    let key = "cache-test-global-clear";
    let (service, _calls) = delayed(Duration::from_millis(10), |_: (), n| Ok(n as u32));
    let request = Request::new(
        service,
        RequestOptions {
            manual: true,
            cache_key: Some(CacheKey::from(key)),
            ..RequestOptions::default()
        },
    );
    request.run_async(()).await.unwrap();
    assert!(RequestContext::global().cache().get(&CacheKey::from(key)).is_some());

    clear_cache([key]);
    assert!(RequestContext::global().cache().get(&CacheKey::from(key)).is_none());
}

#[tokio::test(start_paused = true)]
async fn mutate_broadcasts_to_siblings() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(10), |_: (), n| Ok(n as u32));
    let first = Request::new(Arc::clone(&service), cached(&context, "shared", Ttl::Infinite));
    let second = Request::new(service, cached(&context, "shared", Ttl::Infinite));

    first.mutate(Some(5));
    assert_eq!(first.data(), Some(5));
    assert_eq!(second.data(), Some(5));
    assert!(context.cache().get(&CacheKey::from("shared")).is_some());
    assert_eq!(calls.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn custom_cache_adapters_replace_the_shared_store() {
    let context = init();
    let slot: Arc<Mutex<Option<CachedData<u32, ()>>>> = Arc::new(Mutex::new(None));
    let (writer, reader) = (Arc::clone(&slot), Arc::clone(&slot));
    let (service, calls) = delayed(Duration::from_millis(10), |_: (), n| Ok(n as u32 * 100));
    let adapters = || RequestOptions {
        set_cache: Some(Arc::new({
            let writer = Arc::clone(&writer);
            move |entry: &CachedData<u32, ()>| *writer.lock().unwrap() = Some(entry.clone())
        })),
        get_cache: Some(Arc::new({
            let reader = Arc::clone(&reader);
            move |_: &()| reader.lock().unwrap().clone()
        })),
        ..cached(&context, "custom", Ttl::Infinite)
    };

    let first = Request::new(Arc::clone(&service), adapters());
    first.run_async(()).await.unwrap();
    assert_eq!(slot.lock().unwrap().as_ref().and_then(|c| c.data), Some(100));
    assert!(context.cache().is_empty());

    let second = Request::new(service, adapters());
    assert_eq!(second.run_async(()).await.unwrap(), 100);
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn a_fresh_entry_without_data_still_calls_the_service() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(50), |_: (), n| Ok(n as u32));
    let request = Request::new(
        service,
        cached(&context, "emptied", Ttl::Finite(Duration::from_secs(10))),
    );
    assert_eq!(request.run_async(()).await.unwrap(), 1);

    request.mutate(None);
    let refetch = tokio::time::timeout(Duration::from_secs(1), request.run_async(()));
    assert_eq!(refetch.await.expect("settles").unwrap(), 2);
    assert_eq!(calls.count(), 2);
    assert_eq!(request.data(), Some(2));
}
