//! Redis Streams Transport (spec §4.2): typed stream/consumer-group client
//! over single/cluster/sentinel Redis deployments, fail-closed on health.

pub mod client;

pub use client::{
    build_read_group_args, connect_timeout, resolve_deployment_mode, DeploymentMode,
    StreamEntry, StreamField, StreamsClient, TrimMode,
};
