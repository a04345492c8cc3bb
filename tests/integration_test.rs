//! Integration tests for ream-grid
//!
//! Two nodes wired over the in-process transport exchange member records
//! and query each other's executor service.

use std::io::Write;
use std::sync::Arc;

use ream_grid::cluster::MembershipError;
use ream_grid::executor::{IsShutdownRequest, ShutdownRequest};
use ream_grid::invocation::RoundRobinTargets;
use ream_grid::{GridConfig, GridError, GridNode, InvocationError, LocalTransport, Member, PortableCodec};

fn node(config: &str, transport: &Arc<LocalTransport>) -> GridNode {
    let config = GridConfig::from_toml_str(config).unwrap();
    let node = GridNode::new(&config, transport.clone()).unwrap();
    transport.bind(node.address(), Arc::clone(&node.server));
    node
}

fn pair() -> (GridNode, GridNode) {
    let transport = Arc::new(LocalTransport::new());
    let a = node(
        r#"
        [member]
        bind_address = "10.0.0.1:5701"
        [member.attributes]
        region = { type = "string", value = "us-east" }
        "#,
        &transport,
    );
    let b = node(
        r#"
        [member]
        bind_address = "10.0.0.2:5701"
        [invocation]
        attempt_timeout_ms = 200
        "#,
        &transport,
    );
    (a, b)
}

#[tokio::test]
async fn test_executor_shutdown_scenario() {
    let (a, b) = pair();

    let query = IsShutdownRequest::new("exec-pool-1");
    assert!(!b.invoke(&query, a.address()).await.unwrap());

    assert!(b.invoke(&ShutdownRequest::new("exec-pool-1"), a.address()).await.unwrap());
    assert!(b.invoke(&query, a.address()).await.unwrap());

    // only the target node's executor changed
    assert!(a.executor.is_shutdown("exec-pool-1"));
    assert!(!b.executor.is_shutdown("exec-pool-1"));

    // a second shutdown is a no-op
    assert!(!b.invoke(&ShutdownRequest::new("exec-pool-1"), a.address()).await.unwrap());
}

#[test]
fn test_member_scenario() {
    let member = Member::with_id("abc123", "10.0.0.1:5701".parse().unwrap(), true);
    member.set_attribute("region", "us-east");

    let codec = PortableCodec::new(ream_grid::default_registry().unwrap());
    let decoded: Member = codec.decode_as(&codec.encode(&member).unwrap()).unwrap();
    assert_eq!(decoded.id(), "abc123");
    assert_eq!(decoded.socket_address().to_string(), "10.0.0.1:5701");
    assert_eq!(decoded.attribute::<String>("region").unwrap().as_deref(), Some("us-east"));

    member.remove_attribute("region");
    assert_eq!(member.attribute::<String>("region").unwrap(), None);
    let decoded: Member = codec.decode_as(&codec.encode(&member).unwrap()).unwrap();
    assert_eq!(decoded.attribute::<String>("region").unwrap(), None);
}

#[tokio::test]
async fn test_member_records_between_nodes() {
    let (a, b) = pair();

    b.view.apply_member_record(&a.view.member_record().unwrap()).unwrap();
    a.view.apply_member_record(&b.view.member_record().unwrap()).unwrap();
    assert_eq!(a.view.len(), 2);
    assert_eq!(b.view.len(), 2);

    let seen = b.view.member(a.local_member().id()).unwrap();
    assert!(!seen.is_local());
    assert_eq!(seen.attribute::<String>("region").unwrap().as_deref(), Some("us-east"));

    a.local_member().remove_attribute("region");
    b.view.apply_member_record(&a.view.member_record().unwrap()).unwrap();
    assert_eq!(seen.attribute::<String>("region").unwrap(), None);

    let err = a.view.apply_member_record(&a.view.member_record().unwrap()).unwrap_err();
    assert!(matches!(err, MembershipError::LocalRecord(_)));
}

#[tokio::test]
async fn test_query_every_member_in_turn() {
    let (a, b) = pair();
    a.executor.shutdown("exec-pool-1");

    let resolver = RoundRobinTargets::from_members(&[a.local_member().clone(), b.local_member().clone()]);
    let query = IsShutdownRequest::new("exec-pool-1");
    assert!(b.controller.invoke(&query, &resolver).await.unwrap());
    assert!(!b.controller.invoke(&query, &resolver).await.unwrap());
}

#[tokio::test]
async fn test_unbound_member_exhausts_retries() {
    let (a, b) = pair();
    let missing = "10.0.0.3:5701".parse().unwrap();

    match a.invoke(&IsShutdownRequest::new("exec-pool-1"), missing).await {
        Err(GridError::Invocation(InvocationError::RetryExhausted { attempts, last })) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, InvocationError::ConnectionLost { .. }));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // non-retryable requests fail on the first lost connection
    match b.invoke(&ShutdownRequest::new("exec-pool-1"), missing).await {
        Err(GridError::Invocation(InvocationError::ConnectionLost { target, .. })) => assert_eq!(target, missing),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [member]
        bind_address = "192.168.1.10:5702"

        [member.attributes]
        rack = {{ type = "int16", value = 4 }}
        ssd = {{ type = "bool", value = true }}

        [invocation]
        max_attempts = 4
        retry_backoff_ms = 0
        "#
    )
    .unwrap();

    let config = GridConfig::load(file.path()).unwrap();
    assert_eq!(config.member.bind_address.port(), 5702);
    assert_eq!(config.invocation.max_attempts, 4);

    let node = GridNode::new(&config, Arc::new(LocalTransport::new())).unwrap();
    assert_eq!(node.local_member().attribute::<i16>("rack").unwrap(), Some(4));
    assert_eq!(node.local_member().attribute::<bool>("ssd").unwrap(), Some(true));
    assert!(node.controller.policy().backoff.is_zero());
}

#[test]
fn test_load_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = GridConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ream_grid::config::ConfigError::Io(_))));
}
