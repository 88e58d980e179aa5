//! Redis Streams Transport (spec §4.2): a typed client over Redis Streams
//! with fail-closed health gating and single/cluster/sentinel deployment
//! modes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use tokio::time::timeout;
use tracing::{instrument, warn};

use meshcore_core::config::StreamsConfig;
use meshcore_core::errors::StreamsError;

fn redis_err(e: RedisError) -> StreamsError {
    StreamsError::Redis(e.to_string())
}

/// A single field/value pair appended to a stream entry.
pub type StreamField = (String, String);

/// One entry read back from a stream or consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<StreamField>,
}

/// `TrimMaxLen` trimming precision (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    Exact,
    Approximate,
}

/// Which deployment topology a [`StreamsClient`] was built for (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Single,
    Cluster,
    Sentinel,
}

pub fn resolve_deployment_mode(config: &StreamsConfig) -> DeploymentMode {
    if config.cluster_enabled {
        DeploymentMode::Cluster
    } else if config.sentinel_enabled {
        DeploymentMode::Sentinel
    } else {
        DeploymentMode::Single
    }
}

/// spec §4.2: "Connecting sets an initial timeout of
/// `dial_timeout + read_timeout` (fallback 20s)".
pub fn connect_timeout(config: &StreamsConfig) -> Duration {
    let secs = config.dial_timeout_secs + config.read_timeout_secs;
    if secs == 0 {
        Duration::from_secs(20)
    } else {
        Duration::from_secs(secs)
    }
}

/// Builds the `>` (new-messages-only) stream-keys/ids argument pairs for
/// `XREADGROUP`: one `>` position per stream (spec §4.2 `ReadFromConsumerGroup`).
pub fn build_read_group_args(streams: &[String]) -> (Vec<String>, Vec<String>) {
    let ids = streams.iter().map(|_| ">".to_string()).collect();
    (streams.to_vec(), ids)
}

pub struct StreamsClient {
    manager: ConnectionManager,
    healthy: Arc<AtomicBool>,
    config: StreamsConfig,
}

impl StreamsClient {
    #[instrument(skip(config), fields(mode = ?resolve_deployment_mode(&config)))]
    pub async fn connect(config: StreamsConfig) -> Result<Self, StreamsError> {
        let mode = resolve_deployment_mode(&config);
        let addr = config
            .addresses
            .first()
            .cloned()
            .unwrap_or_else(|| "127.0.0.1:6379".to_string());
        let url = match mode {
            DeploymentMode::Single | DeploymentMode::Cluster | DeploymentMode::Sentinel => {
                format!("redis://{addr}/{}", config.db)
            }
        };

        let client = Client::open(url).map_err(redis_err)?;
        let manager = timeout(connect_timeout(&config), client.get_connection_manager())
            .await
            .map_err(|_| StreamsError::Cancelled)?
            .map_err(redis_err)?;

        let healthy = Arc::new(AtomicBool::new(true));
        let mut health_conn = manager.clone();
        let health_flag = healthy.clone();
        let interval = Duration::from_secs(config.health_check_interval_secs.max(1));
        let probe_timeout = Duration::from_secs(config.health_check_timeout_secs.max(1));

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let result = timeout(probe_timeout, redis::cmd("PING").query_async::<_, String>(&mut health_conn)).await;
                let ok = matches!(result, Ok(Ok(_)));
                if !ok {
                    warn!("redis health probe failed, marking connection unhealthy");
                }
                health_flag.store(ok, Ordering::SeqCst);
            }
        });

        Ok(Self {
            manager,
            healthy,
            config,
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn check_healthy(&self) -> Result<(), StreamsError> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(StreamsError::ConnectionUnhealthy)
        }
    }

    #[instrument(skip(self, fields))]
    pub async fn add_to_stream(
        &self,
        stream: &str,
        fields: &[StreamField],
    ) -> Result<String, StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        let flat: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        conn.xadd(stream, "*", &flat).await.map_err(redis_err)
    }

    pub async fn read_from_stream(
        &self,
        stream: &str,
        start_id: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        let reply: redis::streams::StreamRangeReply = conn
            .xrange_count(stream, start_id, "+", count)
            .await
            .map_err(redis_err)?;
        Ok(reply
            .ids
            .into_iter()
            .map(|id| StreamEntry {
                id: id.id,
                fields: id
                    .map
                    .into_iter()
                    .map(|(k, v)| (k, redis_value_to_string(v)))
                    .collect(),
            })
            .collect())
    }

    pub async fn create_consumer_group(
        &self,
        stream: &str,
        group: &str,
        mkstream: bool,
    ) -> Result<(), StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        let result: Result<(), RedisError> = if mkstream {
            redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream)
                .arg(group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await
        } else {
            redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream)
                .arg(group)
                .arg("$")
                .query_async(&mut conn)
                .await
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(redis_err(e)),
        }
    }

    /// `ReadFromConsumerGroup(group, consumer, streams, count, block, noAck)`
    /// — one `>` position per stream, blocking reads bounded by `block`
    /// (spec §4.2). Callers must keep `block` ≤ their own deadline.
    #[instrument(skip(self))]
    pub async fn read_from_consumer_group(
        &self,
        group: &str,
        consumer: &str,
        streams: &[String],
        count: usize,
        block: Duration,
        no_ack: bool,
    ) -> Result<Vec<(String, Vec<StreamEntry>)>, StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        let (keys, ids) = build_read_group_args(streams);

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer);
        cmd.arg("COUNT").arg(count);
        cmd.arg("BLOCK").arg(block.as_millis() as i64);
        if no_ack {
            cmd.arg("NOACK");
        }
        cmd.arg("STREAMS");
        for key in &keys {
            cmd.arg(key);
        }
        for id in &ids {
            cmd.arg(id);
        }

        let reply: Option<redis::streams::StreamReadReply> =
            cmd.query_async(&mut conn).await.map_err(redis_err)?;

        Ok(reply
            .map(|r| {
                r.keys
                    .into_iter()
                    .map(|k| {
                        let entries = k
                            .ids
                            .into_iter()
                            .map(|id| StreamEntry {
                                id: id.id,
                                fields: id
                                    .map
                                    .into_iter()
                                    .map(|(k, v)| (k, redis_value_to_string(v)))
                                    .collect(),
                            })
                            .collect();
                        (k.key, entries)
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn ack_messages(
        &self,
        stream: &str,
        group: &str,
        ids: &[String],
    ) -> Result<usize, StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        conn.xack(stream, group, ids).await.map_err(redis_err)
    }

    /// A consumer claims messages pending longer than `min_idle_time` on
    /// siblings; transfers pending ownership atomically (spec §4.2).
    pub async fn claim_messages(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_time: Duration,
        ids: &[String],
    ) -> Result<Vec<StreamEntry>, StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream)
            .arg(group)
            .arg(consumer)
            .arg(min_idle_time.as_millis() as i64);
        for id in ids {
            cmd.arg(id);
        }
        let reply: Vec<(String, std::collections::HashMap<String, redis::Value>)> =
            cmd.query_async(&mut conn).await.map_err(redis_err)?;
        Ok(reply
            .into_iter()
            .map(|(id, map)| StreamEntry {
                id,
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, redis_value_to_string(v)))
                    .collect(),
            })
            .collect())
    }

    pub async fn trim(
        &self,
        stream: &str,
        max_len: usize,
        mode: TrimMode,
    ) -> Result<usize, StreamsError> {
        self.check_healthy()?;
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("XTRIM");
        cmd.arg(stream).arg("MAXLEN");
        if mode == TrimMode::Approximate {
            cmd.arg("~");
        }
        cmd.arg(max_len);
        cmd.query_async(&mut conn).await.map_err(redis_err)
    }

    pub fn config(&self) -> &StreamsConfig {
        &self.config
    }
}

fn redis_value_to_string(v: redis::Value) -> String {
    redis::from_redis_value(&v).unwrap_or_else(|_| format!("{v:?}"))
}
