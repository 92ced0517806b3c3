use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::jobs::types::{JobContext, JobTask};

/// Logs the live fleet and its leader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceReportTask {
    /// Also log each instance's resident memory
    #[serde(default)]
    pub include_memory: bool,
}

#[async_trait]
impl JobTask for InstanceReportTask {
    fn task_type() -> &'static str
    where
        Self: Sized,
    {
        "instance_report"
    }

    async fn execute(&self, ctx: JobContext) -> AppResult<()> {
        let instances = ctx
            .registry
            .get_all_instances()
            .await
            .map_err(|e| AppError::store("list instances", e))?;

        let leader = instances
            .iter()
            .find(|view| view.is_master)
            .map(|view| view.record.instance_id.as_str())
            .unwrap_or("none");

        tracing::info!(
            job = %ctx.job_name,
            live = instances.len(),
            leader = %leader,
            "Fleet report"
        );

        for view in &instances {
            if self.include_memory {
                tracing::info!(
                    instance_id = %view.record.instance_id,
                    host = %view.record.host_name,
                    ip = %view.record.ip_address,
                    heap_total = view.record.heap_total,
                    is_master = view.is_master,
                    "Instance"
                );
            } else {
                tracing::info!(
                    instance_id = %view.record.instance_id,
                    host = %view.record.host_name,
                    ip = %view.record.ip_address,
                    is_master = view.is_master,
                    "Instance"
                );
            }
        }

        Ok(())
    }

    fn description(&self) -> Option<String> {
        Some("Log the live instances and the current leader".to_string())
    }
}
