// Integration tests for the request binding's trigger semantics

mod common;

use std::time::Duration;

use common::{Log, immediate, init_tracing, provider, wait_until};
use serde_json::{Value, json};
use tears_request::request::mock::MockService;
use tears_request::request::{
    Hooks, HttpMethod, ProviderConfig, RequestError, RequestOptions, RequestProvider, Status,
};

#[tokio::test]
async fn test_success_settles_state() {
    init_tracing();
    let mock = MockService::new().respond(json!({"data": "x"}));
    let binding = provider().bind(mock.service("items.get"), immediate().success_key("data"));

    let result = binding.run(Some(json!({"id": 1}))).await;

    assert_eq!(result, Ok(Some(json!("x"))));
    assert_eq!(mock.calls(), vec![Some(json!({"id": 1}))]);

    let state = binding.state();
    assert_eq!(state.data, Some(json!("x")));
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert_eq!(state.status(), Status::Success);
}

#[tokio::test]
async fn test_rejection_reports_error_once() {
    let network = RequestError::transport("Network Error").with_status(500);
    let mock = MockService::new().fail_with(network.clone());
    let errors: Log<(RequestError, Option<Value>)> = Log::new();

    let hooks = {
        let errors = errors.clone();
        Hooks::new().on_error(move |error, info| errors.push((error.clone(), info.params.cloned())))
    };
    let binding = provider().bind(mock.service("items.get"), immediate().hooks(hooks));

    let result = binding.run(Some(json!({"id": 1}))).await;

    assert_eq!(result, Err(network.clone()));
    let state = binding.state();
    assert_eq!(state.error, Some(network.clone()));
    assert!(state.data.is_none());
    assert_eq!(state.status(), Status::Error);
    assert_eq!(errors.items(), vec![(network, Some(json!({"id": 1})))]);
}

#[tokio::test]
async fn test_blank_error_is_unknown() {
    let mock = MockService::new().fail_with(RequestError::transport("  "));
    let binding = provider().bind(mock.service("blank"), immediate());

    assert_eq!(binding.run(None).await, Err(RequestError::Unknown));
    assert_eq!(binding.state().error, Some(RequestError::Unknown));
}

#[tokio::test]
async fn test_single_flight_drops_concurrent_trigger() {
    let mock = MockService::new().gated().respond(json!(1)).respond(json!(2));
    let binding = provider().bind(mock.service("slow"), immediate());

    let first = tokio::spawn(binding.run(Some(json!("first"))));
    wait_until(|| binding.in_flight()).await;

    let second = binding.run(Some(json!("second"))).await;
    assert_eq!(second, Ok(None));
    assert_eq!(mock.call_count(), 1);

    mock.release(1);
    assert_eq!(first.await.expect("run task"), Ok(Some(json!(1))));
    assert_eq!(mock.calls(), vec![Some(json!("first"))]);
    assert!(!binding.in_flight());
}

#[tokio::test]
async fn test_dropped_trigger_leaves_state_untouched() {
    let mock = MockService::new().gated();
    let binding = provider().bind(mock.service("slow"), immediate());

    let first = tokio::spawn(binding.run(Some(json!("first"))));
    wait_until(|| binding.in_flight()).await;
    let _ = binding.run(Some(json!("second"))).await;

    assert_eq!(binding.state().params, Some(json!("first")));
    mock.release(1);
    let _ = first.await;
}

#[tokio::test(start_paused = true)]
async fn test_debounce_collapses_to_last_trigger() {
    let mock = MockService::new().respond_always(json!("ok"));
    let binding = provider().bind(mock.service("search"), RequestOptions::new());

    let (a, b, c) = tokio::join!(
        binding.run(Some(json!("r"))),
        binding.run(Some(json!("ru"))),
        binding.run(Some(json!("rust"))),
    );

    assert_eq!(a, Ok(None));
    assert_eq!(b, Ok(None));
    assert_eq!(c, Ok(Some(json!("ok"))));
    assert_eq!(mock.calls(), vec![Some(json!("rust"))]);
}

#[tokio::test(start_paused = true)]
async fn test_triggers_outside_window_both_execute() {
    let mock = MockService::new().respond_always(json!("ok"));
    let binding = provider().bind(
        mock.service("search"),
        RequestOptions::new().debounce(Duration::from_millis(1000)),
    );

    binding.run(Some(json!(1))).await.expect("first run");
    binding.run(Some(json!(2))).await.expect("second run");

    assert_eq!(mock.calls(), vec![Some(json!(1)), Some(json!(2))]);
}

#[tokio::test]
async fn test_cache_round_trip_across_bindings() {
    let provider = RequestProvider::new(ProviderConfig::new().cached(true));
    let mock = MockService::new().respond(json!({"id": 1, "name": "Ada"}));
    let fetches = Log::new();
    let successes = Log::new();
    let hooks = {
        let fetches = fetches.clone();
        let successes = successes.clone();
        Hooks::new()
            .on_fetch(move |_| fetches.push(()))
            .on_success(move |data, _| successes.push(data.clone()))
    };

    let first = provider.bind(mock.service("users.get"), immediate().hooks(hooks.clone()));
    let fetched = first.run(Some(json!({"id": 1, "lang": "en"}))).await;

    let second = provider.bind(mock.service("users.get"), immediate().hooks(hooks));
    let params: Value = serde_json::from_str(r#"{"lang": "en", "id": 1}"#).expect("valid json");
    let served = second.run(Some(params)).await;

    assert_eq!(served, fetched);
    assert_eq!(second.state().data, Some(json!({"id": 1, "name": "Ada"})));
    assert_eq!(mock.call_count(), 1);
    assert_eq!(fetches.len(), 1, "cache hits skip on_fetch");
    assert_eq!(successes.len(), 2, "cache hits still fire on_success");
}

#[tokio::test]
async fn test_cache_skipped_while_data_held() {
    let provider = RequestProvider::new(ProviderConfig::new().cached(true));
    let mock = MockService::new().respond(json!(1)).respond(json!(2));
    let binding = provider.bind(mock.service("counter"), immediate());

    binding.run(Some(json!({}))).await.expect("first run");
    let second = binding.run(Some(json!({}))).await;

    assert_eq!(second, Ok(Some(json!(2))));
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_uncacheable_method_never_cached() {
    let provider = RequestProvider::new(ProviderConfig::new().cached(true));
    let mock = MockService::new().respond_always(json!("created"));
    let service = mock.service("users.create").method(HttpMethod::Post);

    let binding = provider.bind(service.clone(), immediate());
    binding.run(Some(json!({"name": "Ada"}))).await.expect("first run");
    provider
        .bind(service, immediate())
        .run(Some(json!({"name": "Ada"})))
        .await
        .expect("second run");

    assert_eq!(mock.call_count(), 2);
    assert!(provider.get_cache(r#"users.create-{"name":"Ada"}"#).is_none());
}

#[tokio::test]
async fn test_failure_never_writes_cache() {
    let provider = RequestProvider::new(ProviderConfig::new().cached(true));
    let mock = MockService::new().fail_with(RequestError::transport("down"));
    let binding = provider.bind(mock.service("users.get"), immediate());

    let _ = binding.run(Some(json!({"id": 1}))).await;
    assert!(provider.get_cache(r#"users.get-{"id":1}"#).is_none());
}

#[tokio::test]
async fn test_clear_drops_data_and_cache_entry() {
    let provider = RequestProvider::new(ProviderConfig::new().cached(true));
    let mock = MockService::new().respond_always(json!("v"));
    let binding = provider.bind(mock.service("users.get"), immediate());

    binding.run(Some(json!({"id": 1}))).await.expect("run");
    assert!(provider.get_cache(r#"users.get-{"id":1}"#).is_some());

    binding.clear();
    assert!(binding.state().data.is_none());
    assert!(provider.get_cache(r#"users.get-{"id":1}"#).is_none());
}

#[tokio::test]
async fn test_success_key_extraction() {
    let provider = RequestProvider::new(ProviderConfig::new().cached(true));
    let mock = MockService::new().respond(json!({"result": {"id": 1}}));
    let seen = Log::new();
    let hooks = {
        let seen = seen.clone();
        Hooks::new().on_success(move |data, _| seen.push(data.clone()))
    };
    let binding = provider.bind(
        mock.service("users.get"),
        immediate().success_key("result").hooks(hooks),
    );

    binding.run(Some(json!({"id": 1}))).await.expect("run");

    assert_eq!(binding.state().data, Some(json!({"id": 1})));
    assert_eq!(seen.items(), vec![json!({"id": 1})]);
    assert_eq!(provider.get_cache(r#"users.get-{"id":1}"#), Some(json!({"id": 1})));
}

#[tokio::test]
async fn test_error_clears_data() {
    let mock = MockService::new()
        .respond(json!({"id": 1}))
        .fail_with(RequestError::transport("gone").with_status(404));
    let binding = provider().bind(mock.service("users.get"), immediate());

    binding.run(None).await.expect("first run");
    assert!(binding.state().data.is_some());

    let _ = binding.run(None).await;
    let state = binding.state();
    assert!(state.data.is_none());
    assert_eq!(state.error.as_ref().and_then(RequestError::status), Some(404));
    assert_eq!(state.progress, 0);
}

#[tokio::test]
async fn test_staged_params_take_precedence_once() {
    let mock = MockService::new().respond_always(Value::Null);
    let binding = provider().bind(mock.service("users.get"), immediate());

    binding.set_next_params(json!("A"));
    binding.run(Some(json!("B"))).await.expect("staged run");
    binding.run(Some(json!("C"))).await.expect("plain run");

    assert_eq!(mock.calls(), vec![Some(json!("A")), Some(json!("C"))]);
}

#[tokio::test]
async fn test_staged_params_cleared_after_failure() {
    let mock = MockService::new()
        .fail_with(RequestError::transport("down"))
        .respond_always(Value::Null);
    let binding = provider().bind(mock.service("users.get"), immediate());

    binding.set_next_params(json!("A"));
    let _ = binding.run(Some(json!("B"))).await;
    binding.run(Some(json!("C"))).await.expect("plain run");

    assert_eq!(mock.calls(), vec![Some(json!("A")), Some(json!("C"))]);
}

#[tokio::test]
async fn test_refresh_without_prior_run_is_noop() {
    let mock = MockService::new();
    let binding = provider().bind(mock.service("users.get"), immediate());

    assert_eq!(binding.refresh().await, Ok(None));
    assert_eq!(mock.call_count(), 0);
    assert!(!binding.state().dirty);
}

#[tokio::test]
async fn test_refresh_repeats_last_params() {
    let mock = MockService::new().respond(json!(1)).respond(json!(2));
    let binding = provider().bind(mock.service("users.get"), immediate());

    binding.run(Some(json!({"page": 3}))).await.expect("run");
    binding.set_next_params(json!({"page": 9}));
    let refreshed = binding.refresh().await;

    assert_eq!(refreshed, Ok(Some(json!(2))));
    assert_eq!(mock.calls(), vec![Some(json!({"page": 3})), Some(json!({"page": 3}))]);

    // the staged override survives the refresh
    binding.run(None).await.expect("staged run");
    assert_eq!(mock.calls()[2], Some(json!({"page": 9})));
}

#[tokio::test]
async fn test_progress_reports() {
    let mock = MockService::new().report_progress([30, 60]);
    let progress = Log::new();
    let hooks = {
        let progress = progress.clone();
        Hooks::new().on_progress(move |p, _| progress.push(p))
    };
    let binding = provider().bind(mock.service("upload"), immediate().hooks(hooks));

    binding.run(None).await.expect("upload");

    assert_eq!(progress.items(), vec![0, 30, 60]);
    assert_eq!(binding.state().progress, 100);
}

#[tokio::test]
async fn test_every_hooks_fire_after_primary() {
    let order = Log::new();
    let provider = RequestProvider::new(
        ProviderConfig::new()
            .defaults(Hooks::new().on_success({
                let order = order.clone();
                move |_, _| order.push("defaults")
            }))
            .every(Hooks::new().on_success({
                let order = order.clone();
                move |_, info| order.push(if info.name == "users.get" { "every" } else { "?" })
            })),
    );
    let call_site = Hooks::new().on_success({
        let order = order.clone();
        move |_, _| order.push("call-site")
    });

    let mock = MockService::new();
    provider
        .bind(mock.service("users.get"), immediate().hooks(call_site))
        .run(None)
        .await
        .expect("run");
    provider
        .bind(mock.service("users.get"), immediate())
        .run(None)
        .await
        .expect("run");

    assert_eq!(order.items(), vec!["call-site", "every", "defaults", "every"]);
}

#[tokio::test]
async fn test_typed_params_and_data() {
    #[derive(serde::Serialize)]
    struct Query {
        id: u32,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    let mock = MockService::new().respond(json!({"id": 4, "name": "Grace"}));
    let binding = provider().bind(mock.service("users.get"), immediate());

    binding.run_with(&Query { id: 4 }).await.expect("run");

    assert_eq!(mock.calls(), vec![Some(json!({"id": 4}))]);
    assert_eq!(
        binding.state().data_as::<User>(),
        Ok(Some(User {
            id: 4,
            name: "Grace".into()
        }))
    );
}

#[tokio::test]
async fn test_set_data_overrides_error() {
    let mock = MockService::new().fail_with(RequestError::transport("down"));
    let binding = provider().bind(mock.service("users.get"), immediate());

    let _ = binding.run(None).await;
    binding.set_data(Some(json!("patched")));

    let state = binding.state();
    assert_eq!(state.data, Some(json!("patched")));
    assert!(state.error.is_none());
}
