//! End-to-end verification scenarios against a pushed auth database

use authcache::{
    AuthError, Authenticator, Bucket, Coordinator, Credential, HttpSessionVerifier, Node,
    Snapshot, User, UserType,
};
use authcache_core::HttpClientConfig;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use std::time::Duration;

fn authenticator(grace_period: Duration) -> Authenticator {
    let coordinator = Arc::new(Coordinator::new(grace_period));
    let session = HttpSessionVerifier::new(&HttpClientConfig::default()).unwrap();
    Authenticator::new(coordinator, Arc::new(session))
}

fn can_access_bucket(credential: &Credential, bucket: &str) -> bool {
    credential.is_allowed(&format!("cluster.bucket[{}].data!write", bucket))
}

fn assert_admins(credential: &Credential, need_admin: bool, need_ro_admin: bool) {
    let admin = credential.is_allowed("cluster.admin.settings!write");
    let ro_admin = !admin && credential.is_allowed("cluster.admin.security!read");
    assert_eq!(admin, need_admin, "admin access");
    assert_eq!(ro_admin, need_ro_admin, "ro-admin access");
}

#[tokio::test]
async fn test_stale_basic() {
    for period in [Duration::ZERO, Duration::from_millis(1)] {
        let auth = authenticator(period);
        tokio::time::sleep(period).await;

        let err = auth.auth("asd", "bsd").await.unwrap_err();
        assert!(err.is_stale(), "period {:?}: {}", period, err);
        assert_eq!(err.to_string(), "auth database is stale: never updated yet");
    }
}

#[tokio::test(start_paused = true)]
async fn test_stale_carries_last_failure() {
    let auth = authenticator(Duration::from_secs(1));
    auth.coordinator()
        .push_failure("Need 200 status!. Got 500 Internal Server Error");

    let err = auth.auth("a", "b").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "auth database is stale: last reason: Need 200 status!. Got 500 Internal Server Error"
    );
    assert!(err.is_recoverable());
}

async fn stale_then_admin(update_before_timer: bool) {
    let auth = authenticator(Duration::from_secs(10));
    let admin_db = Snapshot::builder()
        .user(User::with_password("admin", UserType::Admin, "asdasd", "nacl"))
        .build();

    let reader = {
        let auth = auth.clone();
        tokio::spawn(async move { auth.auth("admin", "asdasd").await })
    };
    while auth.coordinator().waiting_readers() < 1 {
        tokio::task::yield_now().await;
    }

    if update_before_timer {
        auth.coordinator().push(admin_db.clone());
    } else {
        tokio::time::sleep(Duration::from_secs(11)).await;
    }

    match reader.await.unwrap() {
        Ok(credential) => {
            assert!(update_before_timer);
            assert_admins(&credential, true, false);
        }
        Err(err) => {
            assert!(!update_before_timer);
            assert!(err.is_stale());
        }
    }

    auth.coordinator().push(admin_db);

    assert!(matches!(
        auth.auth("admin", "badpass").await,
        Err(AuthError::NoSuchIdentity)
    ));
    let credential = auth.auth("admin", "asdasd").await.unwrap();
    assert_admins(&credential, true, false);
}

#[tokio::test(start_paused = true)]
async fn test_stale_then_admin_timer_case() {
    stale_then_admin(false).await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_then_admin_update_case() {
    stale_then_admin(true).await;
}

#[tokio::test]
async fn test_buckets_auth() {
    let auth = authenticator(Duration::from_secs(5));
    auth.coordinator().push(
        Snapshot::builder()
            .bucket(Bucket::new("default", ""))
            .bucket(Bucket::new("foo", "bar"))
            .build(),
    );

    let credential = auth.auth("foo", "bar").await.unwrap();
    assert!(can_access_bucket(&credential, "foo"));
    assert!(!can_access_bucket(&credential, "default"));
    assert!(!can_access_bucket(&credential, "unknown"));
    assert_admins(&credential, false, false);

    assert!(matches!(
        auth.auth("foo", "notbar").await,
        Err(AuthError::NoSuchIdentity)
    ));

    let anonymous = auth.auth("", "").await.unwrap();
    assert_admins(&anonymous, false, false);
    assert!(!can_access_bucket(&anonymous, "foo"));
    assert!(can_access_bucket(&anonymous, "default"));

    // Drop the default bucket
    auth.coordinator()
        .push(Snapshot::builder().bucket(Bucket::new("foo", "bar")).build());

    let credential = auth.auth("foo", "bar").await.unwrap();
    assert_admins(&credential, false, false);
    assert!(can_access_bucket(&credential, "foo"));

    assert!(matches!(
        auth.auth("", "").await,
        Err(AuthError::NoSuchIdentity)
    ));
}

#[tokio::test]
async fn test_readonly_admin_user() {
    let auth = authenticator(Duration::from_secs(5));
    auth.coordinator().push(
        Snapshot::builder()
            .user(User::with_password(
                "viewer",
                UserType::ReadOnlyAdmin,
                "look",
                "salt",
            ))
            .build(),
    );

    let credential = auth.auth("viewer", "look").await.unwrap();
    assert_admins(&credential, false, true);
    assert!(!can_access_bucket(&credential, "default"));
}

#[tokio::test]
async fn test_service_pwd() {
    let auth = authenticator(Duration::from_secs(5));
    auth.coordinator().push(
        Snapshot::builder()
            .node(Node::new("beta.local", [9000, 12000], "_admin", "foobar", false))
            .node(Node::new("chi.local", [9001, 12001], "_admin", "barfoo", false))
            .special_user("@component")
            .build(),
    );

    match auth.memcached_service_auth("unknown:9000").await {
        Err(AuthError::UnknownHostPort(hostport)) => assert_eq!(hostport, "unknown:9000"),
        other => panic!("expected unknown hostport, got {:?}", other),
    }

    assert_eq!(
        auth.memcached_service_auth("beta.local:9000").await.unwrap(),
        ("_admin".to_string(), "foobar".to_string())
    );
    assert_eq!(
        auth.memcached_service_auth("chi.local:12001").await.unwrap(),
        ("_admin".to_string(), "barfoo".to_string())
    );
    assert_eq!(
        auth.http_service_auth("chi.local:9001").await.unwrap(),
        ("@component".to_string(), "barfoo".to_string())
    );
}

#[tokio::test]
async fn test_web_creds_basic_auth() {
    let auth = authenticator(Duration::from_secs(5));
    auth.coordinator().push(
        Snapshot::builder()
            .bucket(Bucket::new("default", ""))
            .bucket(Bucket::new("foo", "bar"))
            .build(),
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {}", BASE64.encode("foo:bar"))).unwrap(),
    );
    let credential = auth.auth_web_creds(&headers).await.unwrap();
    assert_eq!(credential.name(), "foo");
    assert!(can_access_bucket(&credential, "foo"));

    let anonymous = auth.auth_web_creds(&HeaderMap::new()).await.unwrap();
    assert_eq!(anonymous.source(), "anonymous");

    let mut garbage = HeaderMap::new();
    garbage.insert(AUTHORIZATION, HeaderValue::from_static("Digest abc"));
    assert!(matches!(
        auth.auth_web_creds(&garbage).await,
        Err(AuthError::InvalidCredentials { .. })
    ));
}

#[tokio::test]
async fn test_snapshot_from_feed_payload() {
    let auth = authenticator(Duration::from_secs(5));
    let salt = b"nacl";
    let payload = serde_json::json!({
        "Users": [{
            "User": "admin",
            "Type": "admin",
            "Salt": BASE64.encode(salt),
            "Mac": BASE64.encode(authcache::hash_password("asdasd", salt)),
        }],
        "Buckets": [{"Name": "default", "Password": ""}],
        "Nodes": null,
    });
    auth.coordinator()
        .push(Snapshot::from_json(payload.to_string().as_bytes()).unwrap());

    let credential = auth.auth("admin", "asdasd").await.unwrap();
    assert_eq!(credential.source(), "builtin");
    assert_admins(&credential, true, false);
}
