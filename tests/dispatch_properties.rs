//! Dispatcher behaviour against a recording backend: precedence, timeout handling,
//! provider lookup, sync/async equivalence and ambient context.

mod common;

use std::sync::Arc;
use std::time::Duration;

use ai_lib_dispatch::config::MapEnv;
use ai_lib_dispatch::context::REQUEST_ID_KEY;
use ai_lib_dispatch::registry::InvocationModes;
use ai_lib_dispatch::timeout::{normalize_with, MAX_TIMEOUT};
use ai_lib_dispatch::{
    AmbientContext, BackendTimeout, Dispatcher, Error, ErrorKind, ProcessDefaults,
    ProviderRegistry, StructuredTimeout, TimeoutSpec, UnknownKeyPolicy,
};
use common::{dispatcher, dispatcher_with, mock_descriptor, RecordingBackend};
use serde_json::json;

fn layered_env() -> MapEnv {
    MapEnv::new()
        .with("MOCK_API_BASE", "https://env.invalid/v1")
        .with("MOCK_API_KEY", "env-key")
        .with("MOCK_ORGANIZATION", "env-org")
        .with("MOCK_TIMEOUT", "30")
        .with("MOCK_MAX_RETRIES", "4")
}

fn layered_defaults() -> ProcessDefaults {
    ProcessDefaults::new()
        .api_base("https://defaults.invalid/v1")
        .api_key("defaults-key")
        .organization("defaults-org")
        .timeout(60u64)
        .max_retries(3)
}

#[test]
fn explicit_arguments_win_over_every_other_layer() {
    let backend = RecordingBackend::new();
    let d = dispatcher_with(backend.clone(), false, layered_defaults(), layered_env());

    d.create_job("gpt-4o-mini", "file-abc")
        .api_base("https://explicit.invalid/v1/")
        .api_key("explicit-key")
        .organization("explicit-org")
        .timeout(5u64)
        .max_retries(1)
        .override_value("api_base", json!("https://bag.invalid/v1"))
        .override_value("api_key", json!("bag-key"))
        .override_value("timeout", json!(10))
        .execute()
        .unwrap();

    let seen = backend.last();
    assert_eq!(seen.config.api_base, "https://explicit.invalid/v1");
    assert_eq!(seen.config.api_key.as_deref(), Some("explicit-key"));
    assert_eq!(seen.config.organization.as_deref(), Some("explicit-org"));
    assert_eq!(seen.timeout.seconds(), 5.0);
    assert_eq!(seen.config.max_retries, Some(1));
}

#[test]
fn overrides_bag_beats_defaults_and_env() {
    let backend = RecordingBackend::new();
    let d = dispatcher_with(backend.clone(), false, layered_defaults(), layered_env());

    d.create_job("gpt-4o-mini", "file-abc")
        .override_value("api_base", json!("https://bag.invalid/v1"))
        .override_value("api_key", json!("bag-key"))
        .override_value("organization", json!("bag-org"))
        .override_value("timeout", json!(10))
        .override_value("max_retries", json!(0))
        .execute()
        .unwrap();

    let seen = backend.last();
    assert_eq!(seen.config.api_base, "https://bag.invalid/v1");
    assert_eq!(seen.config.api_key.as_deref(), Some("bag-key"));
    assert_eq!(seen.config.organization.as_deref(), Some("bag-org"));
    assert_eq!(seen.timeout.seconds(), 10.0);
    assert_eq!(seen.config.max_retries, Some(0));
}

#[test]
fn process_defaults_beat_env() {
    let backend = RecordingBackend::new();
    let d = dispatcher_with(backend.clone(), false, layered_defaults(), layered_env());

    d.create_job("gpt-4o-mini", "file-abc").execute().unwrap();

    let seen = backend.last();
    assert_eq!(seen.config.api_base, "https://defaults.invalid/v1");
    assert_eq!(seen.config.api_key.as_deref(), Some("defaults-key"));
    assert_eq!(seen.config.organization.as_deref(), Some("defaults-org"));
    assert_eq!(seen.timeout.seconds(), 60.0);
    assert_eq!(seen.config.max_retries, Some(3));
}

#[test]
fn env_is_used_when_nothing_else_is_set() {
    let backend = RecordingBackend::new();
    let d = dispatcher_with(backend.clone(), false, ProcessDefaults::new(), layered_env());

    d.create_job("gpt-4o-mini", "file-abc").execute().unwrap();

    let seen = backend.last();
    assert_eq!(seen.config.api_base, "https://env.invalid/v1");
    assert_eq!(seen.config.api_key.as_deref(), Some("env-key"));
    assert_eq!(seen.config.organization.as_deref(), Some("env-org"));
    assert_eq!(seen.timeout.seconds(), 30.0);
    assert_eq!(seen.config.max_retries, Some(4));
}

#[test]
fn hardcoded_fallbacks_apply_last() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());

    d.create_job("gpt-4o-mini", "file-abc").execute().unwrap();

    let seen = backend.last();
    assert_eq!(seen.config.api_base, "https://mock.invalid/v1");
    assert_eq!(seen.config.api_key, None);
    assert_eq!(seen.config.organization, None);
    assert_eq!(seen.timeout, BackendTimeout::Scalar(Duration::from_secs(600)));
    assert_eq!(seen.config.max_retries, None);
}

#[test]
fn normalization_is_total() {
    let structured = TimeoutSpec::Structured(
        StructuredTimeout::new()
            .connect(Duration::from_secs(5))
            .read(Duration::from_secs(42)),
    );
    let inputs = [
        None,
        Some(TimeoutSpec::Seconds(12.5)),
        Some(TimeoutSpec::Seconds(f64::NAN)),
        Some(TimeoutSpec::Seconds(-3.0)),
        Some(TimeoutSpec::Seconds(1e19)),
        Some(TimeoutSpec::Duration(Duration::ZERO)),
        Some(TimeoutSpec::Duration(Duration::MAX)),
        Some(TimeoutSpec::Text("not a duration".into())),
        Some(TimeoutSpec::Text("90s".into())),
        Some(TimeoutSpec::Structured(StructuredTimeout::new())),
        Some(structured),
    ];
    for supports in [true, false] {
        for input in &inputs {
            let out = normalize_with(input.as_ref(), supports);
            assert!(out.seconds() > 0.0, "{input:?} / {supports} gave {out:?}");
            assert!(out.total() <= MAX_TIMEOUT, "{input:?} / {supports} gave {out:?}");
            if !supports {
                assert!(matches!(out, BackendTimeout::Scalar(_)));
            }
        }
    }
    assert_eq!(normalize_with(None, true).seconds(), 600.0);
    assert_eq!(normalize_with(Some(&TimeoutSpec::Seconds(12.5)), false).seconds(), 12.5);
}

#[test]
fn structured_timeout_collapses_to_read_phase_when_unsupported() {
    let timeout = StructuredTimeout::new()
        .connect(Duration::from_secs(5))
        .read(Duration::from_secs(42))
        .write(Duration::from_secs(5))
        .pool(Duration::from_secs(5));

    let scalar_backend = RecordingBackend::new();
    dispatcher(scalar_backend.clone())
        .create_job("gpt-4o-mini", "file-abc")
        .timeout(timeout)
        .execute()
        .unwrap();
    assert_eq!(
        scalar_backend.last().timeout,
        BackendTimeout::Scalar(Duration::from_secs(42))
    );
    assert_eq!(scalar_backend.last().timeout.seconds(), 42.0);

    let structured_backend = RecordingBackend::new();
    dispatcher_with(
        structured_backend.clone(),
        true,
        ProcessDefaults::new(),
        MapEnv::new(),
    )
    .create_job("gpt-4o-mini", "file-abc")
    .timeout(timeout)
    .execute()
    .unwrap();
    assert_eq!(
        structured_backend.last().timeout,
        BackendTimeout::Structured(timeout)
    );
}

#[test]
fn unknown_provider_fails_before_resolution() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());

    // A malformed bag would fail resolution; the lookup must fail first.
    let err = d
        .create_job("gpt-4o-mini", "file-abc")
        .provider("does-not-exist")
        .override_value("max_retries", json!("many"))
        .execute()
        .unwrap_err();

    match &err {
        Error::UnsupportedProvider {
            provider,
            operation,
        } => {
            assert_eq!(provider, "does-not-exist");
            assert_eq!(operation, "create_fine_tuning_job");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.http_status(), 400);
    assert_eq!(err.report().kind, ErrorKind::UnsupportedProvider);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn unknown_provider_fails_the_same_way_non_blocking() {
    let backend = RecordingBackend::new();
    let err = dispatcher(backend.clone())
        .retrieve_job("ftjob-1")
        .provider("does-not-exist")
        .execute_async()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedProvider { .. }));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn bridge_failures_name_the_call() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());

    // No tokio runtime is driving this future.
    let err = futures::executor::block_on(d.list_jobs().execute_async()).unwrap_err();

    assert!(matches!(err, Error::Bridge { .. }));
    let report = err.report();
    assert_eq!(report.kind, ErrorKind::Bridge);
    assert_eq!(report.provider_id.as_deref(), Some("mock"));
    assert_eq!(report.operation.as_deref(), Some("list_fine_tuning_jobs"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn blocking_and_non_blocking_results_are_equal() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());

    let worker = d.clone();
    let blocking = tokio::task::spawn_blocking(move || {
        worker.create_job("gpt-4o-mini", "file-abc").execute()
    })
    .await
    .unwrap()
    .unwrap();
    assert!(!backend.last().is_async);

    let non_blocking = d
        .create_job("gpt-4o-mini", "file-abc")
        .execute_async()
        .await
        .unwrap();
    assert!(backend.last().is_async);

    assert_eq!(blocking, non_blocking);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn equality_holds_for_deferred_results() {
    let backend = RecordingBackend::deferring();
    let d = dispatcher(backend.clone());

    let worker = d.clone();
    let blocking = tokio::task::spawn_blocking(move || worker.list_jobs().execute())
        .await
        .unwrap()
        .unwrap();
    let non_blocking = d.list_jobs().execute_async().await.unwrap();
    assert_eq!(blocking, non_blocking);
}

#[tokio::test]
async fn ambient_context_reaches_backend_through_bridge() {
    let backend = RecordingBackend::deferring();
    let d = dispatcher(backend.clone());

    let ctx = AmbientContext::new()
        .with("tenant", "acme")
        .with(REQUEST_ID_KEY, "req-42");
    ctx.scope(d.create_job("gpt-4o-mini", "file-abc").execute_async())
        .await
        .unwrap();

    let seen = backend.last();
    assert_eq!(seen.ambient.get("tenant"), Some("acme"));
    assert_eq!(seen.request_id, "req-42");
    let deferred = backend.deferred_ambient().expect("deferred future ran");
    assert_eq!(deferred.get("tenant"), Some("acme"));
}

#[test]
fn ambient_context_is_visible_in_blocking_mode() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());

    AmbientContext::new()
        .with("tenant", "acme")
        .sync_scope(|| d.create_job("gpt-4o-mini", "file-abc").execute())
        .unwrap();

    let seen = backend.last();
    assert_eq!(seen.ambient.get("tenant"), Some("acme"));
    // No request id in context: one is generated.
    assert_eq!(seen.request_id.len(), 36);
}

#[test]
fn request_timeout_alias_is_honoured() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());

    d.create_job("gpt-4o-mini", "file-abc")
        .override_value("request_timeout", json!(120))
        .execute()
        .unwrap();
    assert_eq!(backend.last().timeout.seconds(), 120.0);

    d.create_job("gpt-4o-mini", "file-abc")
        .override_value("request_timeout", json!(120))
        .override_value("timeout", json!(30))
        .execute()
        .unwrap();
    assert_eq!(backend.last().timeout.seconds(), 30.0);
}

#[test]
fn unknown_override_keys_follow_policy() {
    let backend = RecordingBackend::new();
    let d = dispatcher(backend.clone());
    d.create_job("gpt-4o-mini", "file-abc")
        .override_value("temperature", json!(0.2))
        .execute()
        .unwrap();
    assert_eq!(backend.last().passthrough.get("temperature"), Some(&json!(0.2)));

    let strict_backend = RecordingBackend::new();
    let mut registry = ProviderRegistry::new();
    registry.register(mock_descriptor(strict_backend.clone(), false));
    let strict = Dispatcher::builder()
        .registry(registry)
        .default_provider("mock")
        .env_source(Arc::new(MapEnv::new()))
        .unknown_keys(UnknownKeyPolicy::Reject)
        .build()
        .unwrap();
    let err = strict
        .create_job("gpt-4o-mini", "file-abc")
        .override_value("temperature", json!(0.2))
        .execute()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.context().and_then(|c| c.field_path.as_deref()),
        Some("overrides.temperature")
    );
    assert_eq!(strict_backend.calls(), 0);
}

#[test]
fn empty_required_parameter_is_rejected_before_backend() {
    let backend = RecordingBackend::new();
    let err = dispatcher(backend.clone())
        .create_job("gpt-4o-mini", "")
        .execute()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let report = err.report();
    assert_eq!(report.provider_id.as_deref(), Some("mock"));
    assert_eq!(report.operation.as_deref(), Some("create_fine_tuning_job"));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn configuration_errors_carry_call_context() {
    let backend = RecordingBackend::new();
    let err = dispatcher(backend.clone())
        .retrieve_job("ftjob-1")
        .api_base("ftp://files.invalid")
        .execute()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.http_status(), 500);
    let ctx = err.context().unwrap();
    assert_eq!(ctx.provider_id.as_deref(), Some("mock"));
    assert_eq!(ctx.operation.as_deref(), Some("retrieve_fine_tuning_job"));
    assert_eq!(ctx.field_path.as_deref(), Some("api_base"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn unsupported_invocation_mode_is_rejected() {
    let backend = RecordingBackend::new();
    let mut registry = ProviderRegistry::new();
    registry.register(mock_descriptor(backend.clone(), false).invocation(InvocationModes {
        blocking: true,
        non_blocking: false,
    }));
    let d = Dispatcher::builder()
        .registry(registry)
        .default_provider("mock")
        .env_source(Arc::new(MapEnv::new()))
        .build()
        .unwrap();

    let err = d.list_jobs().execute_async().await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedProvider { .. }));
    assert_eq!(backend.calls(), 0);
}

#[test]
fn operations_without_backend_support_are_unsupported() {
    let backend = RecordingBackend::new();
    let err = dispatcher(backend.clone())
        .cancel_job("ftjob-1")
        .execute()
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedProvider { .. }));
}
