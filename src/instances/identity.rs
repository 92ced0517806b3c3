//! Identity of the running process within the fleet.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::LazyLock;
use std::time::Duration;

use jiff::Timestamp;
use serde::Deserialize;
use sysinfo::{ProcessesToUpdate, System};

use crate::config::{CoordinationConfig, Environment};

/// Environment variable holding the ECS task metadata endpoint.
pub const ECS_METADATA_ENV: &str = "ECS_CONTAINER_METADATA_URI_V4";

static METADATA_CLIENT: LazyLock<Option<reqwest::Client>> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| tracing::warn!(error = %e, "Failed to build metadata HTTP client"))
        .ok()
});

#[derive(Debug, Deserialize)]
struct TaskMetadata {
    #[serde(rename = "TaskARN")]
    task_arn: String,
}

/// Static facts about this process, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub instance_id: String,
    pub host_name: String,
    pub ip_address: String,
    pub environment_tag: String,
    pub started_at: Timestamp,
}

impl InstanceIdentity {
    /// Resolve the identity of this process.
    ///
    /// The instance id is, in order: the configured id, the ECS task id when
    /// running in production with a metadata endpoint, a random UUID v4.
    pub async fn resolve(config: &CoordinationConfig, environment: Environment) -> Self {
        let instance_id = match &config.instance_id {
            Some(id) => id.clone(),
            None if environment.is_production() => match std::env::var(ECS_METADATA_ENV) {
                Ok(uri) if !uri.is_empty() => ecs_task_id(&uri)
                    .await
                    .unwrap_or_else(random_instance_id),
                _ => random_instance_id(),
            },
            None => random_instance_id(),
        };

        Self {
            instance_id,
            host_name: host_name(),
            ip_address: local_ip_address().to_string(),
            environment_tag: environment.tag().to_string(),
            started_at: Timestamp::now(),
        }
    }

    /// Identity with a fixed id and placeholder host facts.
    pub fn with_id(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            host_name: "localhost".to_string(),
            ip_address: Ipv4Addr::LOCALHOST.to_string(),
            environment_tag: Environment::Development.tag().to_string(),
            started_at: Timestamp::now(),
        }
    }
}

fn random_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Task id from the ECS metadata endpoint, `None` on any failure.
async fn ecs_task_id(metadata_uri: &str) -> Option<String> {
    let client = METADATA_CLIENT.as_ref()?;
    let url = format!("{}/task", metadata_uri.trim_end_matches('/'));

    let response = match client.get(&url).send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "ECS metadata request failed, using random id");
            return None;
        }
    };

    match response.json::<TaskMetadata>().await {
        Ok(metadata) => task_id_from_arn(&metadata.task_arn),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Invalid ECS task metadata, using random id");
            None
        }
    }
}

/// Last path segment of a task ARN,
/// e.g. `arn:aws:ecs:region:account:task/cluster/abc123` -> `abc123`.
pub fn task_id_from_arn(arn: &str) -> Option<String> {
    arn.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Address of the interface used for outbound traffic. Connecting a UDP
/// socket sends no packets, it only selects a route.
fn local_ip_address() -> IpAddr {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Resident memory of this process in bytes, 0 when unavailable.
pub fn resident_memory() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}
