use std::time::Duration;

use meshcore_core::config::StreamsConfig;
use meshcore_streams::{build_read_group_args, connect_timeout, resolve_deployment_mode, DeploymentMode, StreamsClient};

#[test]
fn deployment_mode_prefers_cluster_over_sentinel() {
    let config = StreamsConfig {
        cluster_enabled: true,
        sentinel_enabled: true,
        ..Default::default()
    };
    assert_eq!(resolve_deployment_mode(&config), DeploymentMode::Cluster);
}

#[test]
fn deployment_mode_defaults_to_single() {
    let config = StreamsConfig::default();
    assert_eq!(resolve_deployment_mode(&config), DeploymentMode::Single);
}

#[test]
fn connect_timeout_sums_dial_and_read_with_fallback() {
    let config = StreamsConfig {
        dial_timeout_secs: 5,
        read_timeout_secs: 7,
        ..Default::default()
    };
    assert_eq!(connect_timeout(&config), Duration::from_secs(12));

    let zeroed = StreamsConfig {
        dial_timeout_secs: 0,
        read_timeout_secs: 0,
        ..Default::default()
    };
    assert_eq!(connect_timeout(&zeroed), Duration::from_secs(20));
}

#[test]
fn read_group_args_places_one_new_messages_marker_per_stream() {
    let streams = vec!["stream-a".to_string(), "stream-b".to_string()];
    let (keys, ids) = build_read_group_args(&streams);
    assert_eq!(keys, streams);
    assert_eq!(ids, vec![">".to_string(), ">".to_string()]);
}

/// Requires a live Redis instance; not exercised in this environment.
#[tokio::test]
#[ignore]
async fn connect_and_round_trip_against_live_redis() {
    let client = StreamsClient::connect(StreamsConfig::default()).await.unwrap();
    assert!(client.is_healthy());
    client
        .add_to_stream("test-stream", &[("field".into(), "value".into())])
        .await
        .unwrap();
}
