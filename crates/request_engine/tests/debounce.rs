mod common;

use std::time::Duration;

use common::{delayed, init, manual, sleep_ms};
use futures_util::future::join_all;
use request_engine::{DebounceOptions, Request, RequestOptions, ThrottleOptions};

#[tokio::test(start_paused = true)]
async fn a_debounced_burst_makes_one_call_and_every_caller_gets_its_result() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(50), |n: u32, _| Ok(n * 10));
    let request = Request::new(
        service,
        RequestOptions {
            debounce: Some(DebounceOptions::new(Duration::from_millis(200))),
            ..manual(&context)
        },
    );

    let mut pending = Vec::new();
    for n in 0..5 {
        pending.push(request.run_async(n));
        sleep_ms(20).await;
    }
    assert_eq!(calls.count(), 0);

    let results = join_all(pending).await;
    assert_eq!(calls.params(), vec![4]);
    for result in results {
        assert_eq!(result.unwrap(), 40);
    }
    assert_eq!(request.params(), 4);
}

#[tokio::test(start_paused = true)]
async fn leading_only_debounce_drops_the_rest_of_the_burst() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(10), |n: u32, _| Ok(n));
    let request = Request::new(
        service,
        RequestOptions {
            debounce: Some(DebounceOptions {
                leading: true,
                trailing: false,
                ..DebounceOptions::new(Duration::from_millis(100))
            }),
            ..manual(&context)
        },
    );

    let first = request.run_async(1);
    let second = request.run_async(2);
    assert_eq!(first.await.unwrap(), 1);
    assert!(tokio::time::timeout(Duration::from_secs(1), second)
        .await
        .is_err());
    assert_eq!(calls.params(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn cancel_discards_a_pending_debounced_call() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(10), |n: u32, _| Ok(n));
    let request = Request::new(
        service,
        RequestOptions {
            debounce: Some(DebounceOptions::new(Duration::from_millis(200))),
            ..manual(&context)
        },
    );

    request.run(1);
    sleep_ms(50).await;
    request.cancel();
    sleep_ms(1_000).await;
    assert_eq!(calls.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn throttle_runs_the_leading_and_trailing_calls() {
    let context = init();
    let (service, calls) = delayed(Duration::from_millis(10), |n: u32, _| Ok(n));
    let request = Request::new(
        service,
        RequestOptions {
            throttle: Some(ThrottleOptions::new(Duration::from_millis(300))),
            ..manual(&context)
        },
    );

    let first = request.run_async(0);
    sleep_ms(100).await;
    let second = request.run_async(1);
    sleep_ms(100).await;
    let third = request.run_async(2);

    assert_eq!(first.await.unwrap(), 0);
    assert_eq!(second.await.unwrap(), 2);
    assert_eq!(third.await.unwrap(), 2);
    assert_eq!(calls.params(), vec![0, 2]);
}
