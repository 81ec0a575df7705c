//! End-to-end tests for variable resolution through the public API.

use ctxvars::{
    Callbacks, ConfigLayer, EnvSource, ErrorCode, GetOptions, PromptMode, Resolver, SafeGet,
    Source, Validation, Variable,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn write_context(dir: &Path, name: &str, values: Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(format!("{}.context.json", name)),
        serde_json::to_string_pretty(&values).unwrap(),
    )
    .unwrap();
}

fn resolver(dir: &Path, env: EnvSource, layer: ConfigLayer) -> Resolver {
    Resolver::builder()
        .start_dir(dir)
        .env(env)
        .configure(layer)
        .build()
        .unwrap()
}

fn counting_callbacks(answer: &'static str) -> (Callbacks, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let callbacks = Callbacks::builder()
        .prompt(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(answer.to_string())
        })
        .build();
    (callbacks, calls)
}

#[tokio::test]
async fn test_default_returned_unchanged() {
    let temp = TempDir::new().unwrap();
    for mode in [PromptMode::Never, PromptMode::Fallback] {
        let resolver = resolver(
            temp.path(),
            EnvSource::empty(),
            ConfigLayer::new().with_prompt(mode),
        );
        let var: Variable = Variable::new("Region").with_default("eu-west-1");
        assert_eq!(resolver.get(&var).await.unwrap(), "eu-west-1");

        let resolution = resolver.resolve(&var, &GetOptions::new()).await.unwrap();
        assert_eq!(resolution.source, Source::Default);
        assert!(!resolution.prompted);
    }
}

#[tokio::test]
async fn test_precedence_falls_through_each_source() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "dev", json!({"api_url": "from-context"}));
    let env = EnvSource::fixed([("API_URL", "from-env")]);
    let var: Variable = Variable::new("API URL").with_default("from-default");
    let options = GetOptions::new();

    let resolver = resolver(
        temp.path(),
        env,
        ConfigLayer::new()
            .with_context(["dev"])
            .with_override("api_url", "from-override"),
    );
    let resolution = resolver.resolve(&var, &options).await.unwrap();
    assert_eq!((resolution.value.as_str(), resolution.source), ("from-override", Source::Override));

    // Without the override, the environment wins.
    resolver.reset();
    resolver.configure(ConfigLayer::new().with_context(["dev"]));
    let resolution = resolver.resolve(&var, &options).await.unwrap();
    assert_eq!((resolution.value.as_str(), resolution.source), ("from-env", Source::Environment));

    resolver.configure(ConfigLayer::new().with_ignore_env(true));
    let resolution = resolver.resolve(&var, &options).await.unwrap();
    assert_eq!((resolution.value.as_str(), resolution.source), ("from-context", Source::Context));

    resolver.configure(ConfigLayer::new().with_ignore_context(true));
    let resolution = resolver.resolve(&var, &options).await.unwrap();
    assert_eq!((resolution.value.as_str(), resolution.source), ("from-default", Source::Default));
}

#[tokio::test]
async fn test_context_merge_order() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "a", json!({"k": "from-a", "only_a": "1"}));
    write_context(temp.path(), "b", json!({"k": "from-b"}));
    let var: Variable = Variable::new("k");

    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_context(["a", "b"]),
    );
    assert_eq!(resolver.get(&var).await.unwrap(), "from-b");

    resolver.configure(ConfigLayer::new().with_context(["b", "a"]));
    assert_eq!(resolver.get(&var).await.unwrap(), "from-a");

    let values = resolver.context_values().await;
    assert_eq!(values.get("only_a").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_missing_context_name_is_skipped() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "a", json!({"k": "from-a"}));
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_context(["a", "ghost"]),
    );
    let var: Variable = Variable::new("k");
    assert_eq!(resolver.get(&var).await.unwrap(), "from-a");
}

#[tokio::test]
async fn test_context_references() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "shared", json!({"api_url": "https://shared", "db": "postgres://db"}));
    write_context(
        temp.path(),
        "dev",
        json!({"api_url": "@shared", "database_url": "@shared:db"}),
    );
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_context(["dev"]),
    );

    let api: Variable = Variable::new("API URL");
    assert_eq!(resolver.get(&api).await.unwrap(), "https://shared");

    let db: Variable = Variable::new("Database URL");
    assert_eq!(resolver.get(&db).await.unwrap(), "postgres://db");

    // Defaults are expanded too.
    let fallback: Variable = Variable::new("Backup").with_default("@shared:db");
    assert_eq!(resolver.get(&fallback).await.unwrap(), "postgres://db");
}

#[tokio::test]
async fn test_env_interpolation_in_values() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "dev", json!({"api_url": "http://${HOST}:$PORT/api"}));
    let resolver = resolver(
        temp.path(),
        EnvSource::fixed([("HOST", "localhost"), ("PORT", "4000")]),
        ConfigLayer::new().with_context(["dev"]),
    );
    let var: Variable = Variable::new("API URL");
    assert_eq!(resolver.get(&var).await.unwrap(), "http://localhost:4000/api");
}

#[tokio::test]
async fn test_broken_reference_is_not_missing_value() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "shared", json!({"other": "x"}));
    write_context(
        temp.path(),
        "dev",
        json!({"no_context": "@nowhere:key", "no_key": "@shared:absent"}),
    );
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_context(["dev"]),
    );

    let var: Variable = Variable::new("No Context").with_default("unused");
    let err = resolver.get(&var).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ContextNotFound);
    assert!(err.is_reference_error());
    assert!(!err.is_missing_value());
    assert!(err.message.contains("nowhere"));
    assert_eq!(err.key.as_deref(), Some("no_context"));

    let var: Variable = Variable::new("No Key");
    match resolver.safe_get(&var).await {
        SafeGet::Failure(err) => {
            assert_eq!(err.code, ErrorCode::ReferenceKeyNotFound);
            assert!(err.message.contains("absent"));
            assert!(err.message.contains("shared"));
        }
        SafeGet::Success(value) => panic!("expected failure, got {}", value),
    }
}

#[tokio::test]
async fn test_reference_cycle_is_an_error() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "a", json!({"k": "@b:k"}));
    write_context(temp.path(), "b", json!({"k": "@a:k"}));
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_context(["a"]),
    );

    let var: Variable = Variable::new("k");
    let err = resolver.get(&var).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ReferenceDepthExceeded);
}

#[tokio::test]
async fn test_prompt_happens_once_per_process() {
    let temp = TempDir::new().unwrap();
    let (callbacks, calls) = counting_callbacks("typed");
    let resolver = Resolver::builder()
        .start_dir(temp.path())
        .env(EnvSource::empty())
        .callbacks(callbacks)
        .configure(ConfigLayer::new().with_prompt(PromptMode::Always))
        .build()
        .unwrap();
    let var: Variable = Variable::new("Token");

    assert_eq!(resolver.get(&var).await.unwrap(), "typed");
    assert_eq!(resolver.get(&var).await.unwrap(), "typed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let resolution = resolver.resolve(&var, &GetOptions::new()).await.unwrap();
    assert_eq!(resolution.source, Source::Session);
    // Nothing written without a save policy.
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_always_mode_with_env_prompts_once() {
    let temp = TempDir::new().unwrap();
    let (callbacks, calls) = counting_callbacks("typed");
    let resolver = Resolver::builder()
        .start_dir(temp.path())
        .env(EnvSource::fixed([("TOKEN", "env-token")]))
        .callbacks(callbacks)
        .configure(ConfigLayer::new().with_prompt(PromptMode::Always))
        .build()
        .unwrap();
    let var: Variable = Variable::new("Token");

    assert_eq!(resolver.get(&var).await.unwrap(), "typed");
    assert_eq!(resolver.get(&var).await.unwrap(), "typed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let resolution = resolver.resolve(&var, &GetOptions::new()).await.unwrap();
    assert_eq!(resolution.value, "typed");
    assert_eq!(resolution.source, Source::Session);
    assert!(!resolution.prompted);
}

#[tokio::test]
async fn test_no_env_mode_prompts_over_context_value() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "dev", json!({"token": "ctx-token"}));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let resolver = Resolver::builder()
        .start_dir(temp.path())
        .env(EnvSource::empty())
        .callbacks(
            Callbacks::builder()
                .prompt(move |req| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(req.suggested.as_deref(), Some("ctx-token"));
                    Ok("typed".to_string())
                })
                .build(),
        )
        .configure(
            ConfigLayer::new()
                .with_context(["dev"])
                .with_prompt(PromptMode::NoEnv),
        )
        .build()
        .unwrap();
    let var: Variable = Variable::new("Token");

    assert_eq!(resolver.get(&var).await.unwrap(), "typed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prompt_receives_suggestion() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "dev", json!({"region": "eu"}));
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new()
            .with_context(["dev"])
            .with_prompt(PromptMode::Always),
    );

    let var: Variable = Variable::new("Region")
        .with_prompt(|req| Ok(format!("{}-confirmed", req.suggested.as_deref().unwrap_or("none"))));
    assert_eq!(resolver.get(&var).await.unwrap(), "eu-confirmed");

    let other: Variable = Variable::new("Zone")
        .with_default("@dev:region")
        .with_prompt(|req| Ok(format!("{}:{}", req.name, req.suggested.clone().unwrap_or_default())));
    assert_eq!(resolver.get(&other).await.unwrap(), "Zone:eu");
}

#[tokio::test]
async fn test_prompt_answer_is_expanded() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "prod", json!({"api_url": "https://prod"}));
    let resolver = resolver(temp.path(), EnvSource::empty(), ConfigLayer::new());

    let var: Variable = Variable::new("API URL").with_prompt(|_| Ok("@prod".to_string()));
    assert_eq!(resolver.get(&var).await.unwrap(), "https://prod");
}

#[tokio::test]
async fn test_missing_prompt_callback_is_fatal() {
    let temp = TempDir::new().unwrap();
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_prompt(PromptMode::Always),
    );
    let var: Variable = Variable::new("API URL").with_default("http://localhost:4000");

    let err = resolver.get(&var).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingCallback);
    assert_eq!(err.variable.as_deref(), Some("API URL"));
}

#[tokio::test]
async fn test_api_url_scenario() {
    let temp = TempDir::new().unwrap();
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_prompt(PromptMode::Fallback),
    );

    let with_default: Variable = Variable::new("API URL").with_default("http://localhost:4000");
    assert_eq!(with_default.key(), "api_url");
    assert_eq!(
        resolver.get(&with_default).await.unwrap(),
        "http://localhost:4000"
    );

    // No default: fallback mode needs a prompt, and none is configured.
    let without_default: Variable = Variable::new("API URL");
    assert!(resolver.get(&without_default).await.is_err());

    resolver.configure(ConfigLayer::new().with_prompt(PromptMode::Never));
    let err = resolver.get(&without_default).await.unwrap_err();
    assert!(err.is_missing_value());
    assert!(err.message.contains("API URL"));
    assert!(err.message.contains("api_url"));
}

#[tokio::test]
async fn test_safe_get_never_panics() {
    let temp = TempDir::new().unwrap();
    write_context(temp.path(), "dev", json!({"port": "not-a-number", "loop": "@dev:loop"}));
    let resolver = resolver(
        temp.path(),
        EnvSource::empty(),
        ConfigLayer::new().with_context(["dev"]),
    );

    let port: Variable<u16> = Variable::new("Port");
    assert_eq!(
        resolver.safe_get(&port).await.into_result().unwrap_err().code,
        ErrorCode::ValidationFailed
    );

    let looping: Variable = Variable::new("Loop");
    assert!(!resolver.safe_get(&looping).await.is_success());

    let missing: Variable = Variable::new("Nothing");
    assert!(!resolver.safe_get(&missing).await.is_success());

    let fine: Variable<u16> = Variable::new("Fine").with_default("8080");
    assert_eq!(resolver.safe_get(&fine).await, SafeGet::Success(8080));
}

#[tokio::test]
async fn test_validator_payload_reaches_caller() {
    let temp = TempDir::new().unwrap();
    let resolver = resolver(temp.path(), EnvSource::fixed([("URL", "ftp://x")]), ConfigLayer::new());
    let payload = json!({"issues": [{"path": "url", "message": "must use https"}]});
    let expected = payload.clone();

    let var: Variable = Variable::new("URL").with_validator(move |raw| {
        if raw.starts_with("https://") {
            Validation::ok()
        } else {
            Validation::fail(payload.clone())
        }
    });

    let err = resolver.get(&var).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(err.details, Some(expected.clone()));

    match resolver.safe_get(&var).await {
        SafeGet::Failure(err) => assert_eq!(err.details, Some(expected)),
        SafeGet::Success(_) => panic!("expected validation failure"),
    }
}

#[tokio::test]
async fn test_validator_replacement_and_typed_values() {
    let temp = TempDir::new().unwrap();
    let resolver = resolver(
        temp.path(),
        EnvSource::fixed([("REGION", "  EU-West "), ("RETRIES", "5")]),
        ConfigLayer::new(),
    );

    let region: Variable = Variable::new("Region")
        .with_validator(|raw| Validation::replace(raw.trim().to_lowercase()));
    assert_eq!(resolver.get(&region).await.unwrap(), "eu-west");
    assert_eq!(resolver.last_value("region").as_deref(), Some("eu-west"));

    let retries: Variable<u32> = Variable::new("Retries");
    assert_eq!(resolver.get(&retries).await.unwrap(), 5);
}

#[tokio::test]
async fn test_per_call_options_do_not_stick() {
    let temp = TempDir::new().unwrap();
    let resolver = resolver(temp.path(), EnvSource::empty(), ConfigLayer::new());
    let var: Variable = Variable::new("Name").with_default("base");

    let options = GetOptions::new().with_default("call");
    assert_eq!(resolver.get_with(&var, &options).await.unwrap(), "call");
    assert_eq!(resolver.get(&var).await.unwrap(), "base");
    assert_eq!(var.default_raw(), Some("base"));
}
