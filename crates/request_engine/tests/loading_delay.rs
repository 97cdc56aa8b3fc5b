mod common;

use std::time::Duration;

use common::{init, manual, scripted, sleep_ms};
use request_engine::{Request, RequestOptions};

#[tokio::test(start_paused = true)]
async fn fast_requests_never_show_loading() {
    let context = init();
    let (service, _calls) = scripted(|delay: u64, _| (Duration::from_millis(delay), Ok(delay)));
    let request = Request::new(
        service,
        RequestOptions {
            loading_delay: Some(Duration::from_millis(300)),
            ..manual(&context)
        },
    );

    request.run(100);
    assert!(!request.loading());
    sleep_ms(200).await;
    assert!(!request.loading());
    assert_eq!(request.data(), Some(100));
    sleep_ms(500).await;
    assert!(!request.loading());
}

#[tokio::test(start_paused = true)]
async fn slow_requests_show_loading_after_the_delay() {
    let context = init();
    let (service, _calls) = scripted(|delay: u64, _| (Duration::from_millis(delay), Ok(delay)));
    let request = Request::new(
        service,
        RequestOptions {
            loading_delay: Some(Duration::from_millis(300)),
            ..manual(&context)
        },
    );

    request.run(1_000);
    sleep_ms(200).await;
    assert!(!request.loading());
    sleep_ms(200).await;
    assert!(request.loading());
    sleep_ms(700).await;
    assert!(!request.loading());
    assert_eq!(request.data(), Some(1_000));
}
