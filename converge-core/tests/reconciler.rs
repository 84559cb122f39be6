//! Reconciler integration tests against the in-memory remote.

use std::sync::Arc;
use std::time::Duration;

use converge_core::testing::{Call, MemoryRemote, RecordingSleeper};
use converge_core::variants::{AwsAccount, AzureAccount, Team};
use converge_core::{
    Action, Deleted, DesiredState, Error, Operation, Payload, PollPolicy, Poller, Reconciler,
    ReconcilerConfig, RemoteError, RequestKind, Variant, VariantRegistry,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

struct Harness {
    remote: Arc<MemoryRemote>,
    sleeper: Arc<RecordingSleeper>,
    reconciler: Reconciler,
}

fn config(attempts: u32) -> ReconcilerConfig {
    ReconcilerConfig {
        default_poll: PollPolicy::fixed(attempts, Duration::from_millis(100)),
        update_recheck: PollPolicy::fixed(3, Duration::from_millis(100)),
        ..Default::default()
    }
}

fn harness(remote: MemoryRemote, config: ReconcilerConfig) -> Harness {
    let remote = Arc::new(remote);
    let sleeper = Arc::new(RecordingSleeper::new());
    let reconciler = Reconciler::new(
        remote.clone(),
        Arc::new(VariantRegistry::builtin()),
        config,
    )
    .with_poller(Poller::new(sleeper.clone(), CancellationToken::new()));
    Harness {
        remote,
        sleeper,
        reconciler,
    }
}

fn aws(role: &str) -> DesiredState {
    DesiredState::new(
        Variant::AWS,
        Payload::Aws(AwsAccount {
            name: "prod".to_string(),
            enabled: true,
            role_arn: role.to_string(),
            external_id: "ext-1".to_string(),
            queue_url: None,
        }),
    )
}

fn azure() -> DesiredState {
    DesiredState::new(
        Variant::AZURE,
        Payload::Azure(AzureAccount {
            name: "prod".to_string(),
            enabled: true,
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            queue_url: "https://queue".to_string(),
        }),
    )
}

fn team(members: &[&str]) -> DesiredState {
    DesiredState::new(
        Variant::TEAM,
        Payload::Team(Team {
            name: "platform".to_string(),
            description: "platform team".to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }),
    )
}

fn stored_aws_account() -> serde_json::Value {
    json!({
        "name": "legacy",
        "type": "AwsCfg",
        "enabled": 1,
        "data": {
            "crossAccountCredentials": { "roleArn": "arn:legacy", "externalId": "ext-9" }
        }
    })
}

#[tokio::test]
async fn test_create_waits_for_visibility() {
    let h = harness(MemoryRemote::new().with_hidden_reads(3), config(5));
    let desired = aws("arn:role/a");

    let created = h.reconciler.create(&desired).await.unwrap();

    assert_eq!(created.id.variant(), &Variant::AWS);
    assert_eq!(created.observed.payload, desired.payload);
    assert_eq!(h.remote.count(Call::Get), 4);
    assert_eq!(h.sleeper.delays(), vec![Duration::from_millis(100); 3]);
}

#[tokio::test]
async fn test_create_times_out_when_hidden_for_every_attempt() {
    let h = harness(MemoryRemote::new().with_hidden_reads(3), config(3));

    let err = h.reconciler.create(&aws("arn:role/a")).await.unwrap_err();

    match err {
        Error::VisibilityTimeout {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(source.is_not_found());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.remote.count(Call::Get), 3);
}

#[tokio::test]
async fn test_create_uses_backend_native_id() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("acct-123");

    let created = h.reconciler.create(&aws("arn:role/a")).await.unwrap();

    assert_eq!(created.id.to_string(), "aws:acct-123");
    assert_eq!(created.id.native_id(), "acct-123");
}

#[tokio::test]
async fn test_create_unknown_variant_makes_no_call() {
    let h = harness(MemoryRemote::new(), config(3));
    let mut desired = aws("arn:role/a");
    desired.variant = Variant::new("digitalocean");

    let err = h.reconciler.create(&desired).await.unwrap_err();

    assert!(matches!(
        err,
        Error::UnknownVariant { variant, op: Some(Operation::Create), id: None }
            if variant.as_str() == "digitalocean"
    ));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_create_rejects_payload_of_other_variant() {
    let h = harness(MemoryRemote::new(), config(3));
    let mut desired = aws("arn:role/a");
    desired.variant = Variant::AZURE;

    let err = h.reconciler.create(&desired).await.unwrap_err();

    assert!(matches!(err, Error::Encoding { .. }));
    assert_eq!(h.remote.count(Call::Create), 0);
}

#[tokio::test]
async fn test_create_remote_failure_yields_no_id() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.fail_next(
        Call::Create,
        RemoteError::Api {
            status: Some(500),
            message: "boom".to_string(),
        },
    );

    let err = h.reconciler.create(&aws("arn:role/a")).await.unwrap_err();

    assert!(matches!(err, Error::Remote { id: None, .. }));
    assert!(h.remote.is_empty());
    assert_eq!(h.remote.count(Call::Get), 0);
}

#[tokio::test]
async fn test_create_rejects_native_id_containing_separator() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("a:b");

    let err = h.reconciler.create(&aws("arn:role/a")).await.unwrap_err();

    assert!(matches!(err, Error::Encoding { .. }));
    assert_eq!(h.remote.count(Call::Get), 0);
}

#[tokio::test]
async fn test_create_permission_denied_stops_polling() {
    let h = harness(MemoryRemote::new(), config(10));
    h.remote.fail_next(
        Call::Get,
        RemoteError::PermissionDenied("role cannot read".to_string()),
    );

    let err = h.reconciler.create(&aws("arn:role/a")).await.unwrap_err();

    match err {
        Error::VisibilityTimeout {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 1);
            assert!(source.is_permission_denied());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_create_cancelled_while_waiting() {
    let token = CancellationToken::new();
    let remote = Arc::new(MemoryRemote::new().with_hidden_reads(5));
    let reconciler = Reconciler::new(
        remote.clone(),
        Arc::new(VariantRegistry::builtin()),
        config(10),
    )
    .with_poller(Poller::new(
        Arc::new(RecordingSleeper::cancelling(token.clone(), 1)),
        token,
    ));

    let err = reconciler.create(&aws("arn:role/a")).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled { attempts: 1, .. }));
    assert_eq!(remote.count(Call::Get), 1);
}

#[tokio::test]
async fn test_read_absent_returns_none() {
    let h = harness(MemoryRemote::new(), config(3));
    assert!(h.reconciler.read("aws:missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_malformed_id() {
    let h = harness(MemoryRemote::new(), config(3));

    let err = h.reconciler.read("no-separator").await.unwrap_err();

    assert!(matches!(err, Error::MalformedId { .. }));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_read_propagates_transport_error() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote
        .fail_next(Call::Get, RemoteError::Transport("reset".to_string()));

    let err = h.reconciler.read("aws:acct-1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Remote {
            source: RemoteError::Transport(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_update_full_replace() {
    let h = harness(MemoryRemote::new(), config(3));
    let created = h.reconciler.create(&aws("arn:role/a")).await.unwrap();
    let id = created.id.to_string();

    let updated = h
        .reconciler
        .update(&id, &aws("arn:role/b"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.changes.fields, vec!["role_arn".to_string()]);
    assert_eq!(updated.observed.payload, aws("arn:role/b").payload);
    let request = h.remote.last_request(Call::Update).unwrap();
    assert_eq!(request.request.kind, RequestKind::Full);
}

#[tokio::test]
async fn test_update_team_sends_membership_delta() {
    let h = harness(MemoryRemote::new(), config(3));
    let created = h.reconciler.create(&team(&["a", "b", "c"])).await.unwrap();
    let id = created.id.to_string();

    let updated = h
        .reconciler
        .update(&id, &team(&["a", "b", "d"]))
        .await
        .unwrap()
        .unwrap();

    let request = h.remote.last_request(Call::Update).unwrap();
    assert_eq!(request.request.kind, RequestKind::Incremental);
    assert_eq!(request.request.body["addMembers"], json!(["d"]));
    assert_eq!(request.request.body["removeMembers"], json!(["c"]));
    assert_eq!(updated.changes.to_string(), "members: +[d] -[c]");
    assert_eq!(updated.observed.payload, team(&["a", "b", "d"]).payload);
}

#[tokio::test]
async fn test_update_after_out_of_band_delete() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("acct-1");
    h.reconciler.create(&aws("arn:role/a")).await.unwrap();
    assert!(h.remote.remove("CloudAccounts", "acct-1"));

    let updated = h
        .reconciler
        .update("aws:acct-1", &aws("arn:role/b"))
        .await
        .unwrap();

    assert!(updated.is_none());
    assert_eq!(h.remote.count(Call::Update), 0);
    assert!(h.reconciler.read("aws:acct-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_when_object_vanishes_before_write() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("t1");
    h.reconciler.create(&team(&["a"])).await.unwrap();
    h.remote
        .fail_next(Call::Update, RemoteError::NotFound("Teams/t1".to_string()));

    let updated = h
        .reconciler
        .update("team:t1", &team(&["a", "b"]))
        .await
        .unwrap();

    assert!(updated.is_none());
    assert_eq!(h.remote.count(Call::Update), 1);
}

#[tokio::test]
async fn test_update_when_recheck_never_finds_object() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("t1");
    h.reconciler.create(&team(&["a"])).await.unwrap();
    let gets_before = h.remote.count(Call::Get);

    // The pre-read succeeds; every re-check read after the write misses.
    let gone = RemoteError::NotFound("Teams/t1".to_string());
    h.remote.fail_after(Call::Get, 1, gone.clone());
    h.remote.fail_next(Call::Get, gone.clone());
    h.remote.fail_next(Call::Get, gone);

    let updated = h
        .reconciler
        .update("team:t1", &team(&["a", "b"]))
        .await
        .unwrap();

    assert!(updated.is_none());
    assert_eq!(h.remote.count(Call::Update), 1);
    assert_eq!(h.remote.count(Call::Get) - gets_before, 4);
}

#[tokio::test]
async fn test_update_recheck_recovers_from_late_visibility() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("t1");
    h.reconciler.create(&team(&["a"])).await.unwrap();
    h.remote
        .fail_after(Call::Get, 1, RemoteError::NotFound("Teams/t1".to_string()));

    let updated = h
        .reconciler
        .update("team:t1", &team(&["a", "b"]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.observed.payload, team(&["a", "b"]).payload);
}

#[tokio::test]
async fn test_update_encoding_error_names_operation_and_id() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote
        .insert("CloudAccounts", "acct-9", stored_aws_account());
    let desired = DesiredState::new(Variant::AWS, team(&["a"]).payload);

    let err = h
        .reconciler
        .update("aws:acct-9", &desired)
        .await
        .unwrap_err();

    match err {
        Error::Encoding { op, id, .. } => {
            assert_eq!(op, Some(Operation::Update));
            assert_eq!(id.as_deref(), Some("aws:acct-9"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.remote.count(Call::Update), 0);
}

#[tokio::test]
async fn test_unknown_variant_names_operation_and_id() {
    let h = harness(MemoryRemote::new(), config(3));

    let read = h.reconciler.read("digitalocean:d-1").await.unwrap_err();
    let delete = h.reconciler.delete("digitalocean:d-1").await.unwrap_err();

    assert_eq!(read.to_string(), "read digitalocean:d-1: unknown variant: digitalocean");
    assert!(matches!(
        delete,
        Error::UnknownVariant { op: Some(Operation::Delete), id: Some(_), .. }
    ));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_update_rejects_variant_change() {
    let h = harness(MemoryRemote::new(), config(3));

    let err = h
        .reconciler
        .update("aws:acct-1", &azure())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::VariantChange { .. }));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = harness(MemoryRemote::new(), config(3));
    let created = h.reconciler.create(&aws("arn:role/a")).await.unwrap();
    let id = created.id.to_string();

    assert_eq!(h.reconciler.delete(&id).await.unwrap(), Deleted::Removed);
    assert_eq!(
        h.reconciler.delete(&id).await.unwrap(),
        Deleted::AlreadyAbsent
    );
    assert!(h.reconciler.read(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_propagates_other_errors() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.fail_next(
        Call::Delete,
        RemoteError::PermissionDenied("read only".to_string()),
    );

    let err = h.reconciler.delete("aws:acct-1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Remote {
            id: Some(_),
            source: RemoteError::PermissionDenied(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_import_composite_id() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote
        .insert("CloudAccounts", "acct-9", stored_aws_account());

    let imported = h.reconciler.import("aws:acct-9").await.unwrap();

    assert_eq!(imported.id.to_string(), "aws:acct-9");
    assert_eq!(imported.observed.payload.name(), "legacy");
}

#[tokio::test]
async fn test_import_bare_id_with_default_variant() {
    let config = ReconcilerConfig {
        import_default_variant: Some(Variant::AWS),
        ..config(3)
    };
    let h = harness(MemoryRemote::new(), config);
    h.remote
        .insert("CloudAccounts", "acct-9", stored_aws_account());

    let imported = h.reconciler.import("acct-9").await.unwrap();

    assert_eq!(imported.id.to_string(), "aws:acct-9");
}

#[tokio::test]
async fn test_import_bare_id_without_default_variant() {
    let h = harness(MemoryRemote::new(), config(3));

    let err = h.reconciler.import("acct-9").await.unwrap_err();

    assert!(matches!(err, Error::MalformedId { .. }));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_import_missing_object_times_out() {
    let h = harness(MemoryRemote::new(), config(4));

    let err = h.reconciler.import("aws:ghost").await.unwrap_err();

    assert!(matches!(err, Error::VisibilityTimeout { attempts: 4, .. }));
    assert_eq!(h.remote.count(Call::Get), 4);
}

#[tokio::test]
async fn test_import_under_wrong_variant_fails_to_decode() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote
        .insert("CloudAccounts", "acct-9", stored_aws_account());

    let err = h.reconciler.import("azure:acct-9").await.unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
    assert_eq!(h.remote.count(Call::Get), 1);
}

#[tokio::test]
async fn test_converge_creates_then_updates() {
    let h = harness(MemoryRemote::new(), config(3));

    let first = h.reconciler.converge(None, &team(&["a"])).await.unwrap();
    assert_eq!(first.action, Action::Created);
    assert!(first.changes.is_none());

    let id = first.id.to_string();
    let second = h
        .reconciler
        .converge(Some(&id), &team(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(second.action, Action::Updated);
    assert_eq!(second.id, first.id);
    assert_eq!(second.changes.unwrap().to_string(), "members: +[b]");
}

#[tokio::test]
async fn test_converge_recreates_vanished_object() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("t-1");
    h.reconciler.create(&team(&["a"])).await.unwrap();
    h.remote.remove("Teams", "t-1");

    let converged = h
        .reconciler
        .converge(Some("team:t-1"), &team(&["a"]))
        .await
        .unwrap();

    assert_eq!(converged.action, Action::Recreated);
    assert_ne!(converged.id.native_id(), "t-1");
    assert_eq!(h.remote.len(), 1);
}

#[tokio::test]
async fn test_converge_replaces_on_variant_change() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("acct-1");
    h.reconciler.create(&aws("arn:role/a")).await.unwrap();

    let converged = h
        .reconciler
        .converge(Some("aws:acct-1"), &azure())
        .await
        .unwrap();

    assert_eq!(converged.action, Action::Replaced);
    assert_eq!(converged.id.variant(), &Variant::AZURE);
    assert!(h.remote.object("CloudAccounts", "acct-1").is_none());
    assert_eq!(h.remote.len(), 1);
}

#[tokio::test]
async fn test_converge_keeps_old_object_when_new_variant_unknown() {
    let h = harness(MemoryRemote::new(), config(3));
    h.remote.queue_native_id("acct-1");
    h.reconciler.create(&aws("arn:role/a")).await.unwrap();

    let mut desired = azure();
    desired.variant = Variant::new("digitalocean");
    let err = h
        .reconciler
        .converge(Some("aws:acct-1"), &desired)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownVariant { .. }));
    assert!(h.remote.object("CloudAccounts", "acct-1").is_some());
    assert_eq!(h.remote.count(Call::Delete), 0);
}

#[tokio::test]
async fn test_concurrent_creates_are_independent() {
    let h = harness(MemoryRemote::new().with_hidden_reads(1), config(3));

    let (first, second) = (aws("arn:role/a"), team(&["x"]));
    let (a, b) = tokio::join!(h.reconciler.create(&first), h.reconciler.create(&second));

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id.variant(), &Variant::AWS);
    assert_eq!(b.id.variant(), &Variant::TEAM);
    assert_eq!(h.remote.len(), 2);
}
