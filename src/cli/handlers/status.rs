//! Status command handler
//!
//! Prints the live instances and the current leader.

use crate::config::{Environment, Settings};
use crate::error::{AppError, AppResult};
use crate::node::{FleetStatus, Node};

/// Handler for the status command
pub struct StatusCommandHandler {
    config: Settings,
    environment: Environment,
}

impl StatusCommandHandler {
    /// Create a new status command handler
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
        }
    }

    /// Read the fleet and print it, as a table or as JSON
    pub async fn execute(&self, json: bool) -> AppResult<()> {
        let status = Node::new(self.config.clone(), self.environment)
            .status()
            .await?;

        if json {
            let rendered = serde_json::to_string_pretty(&status)
                .map_err(|e| AppError::Internal { source: e.into() })?;
            println!("{rendered}");
        } else {
            print!("{}", render_table(&status));
        }
        Ok(())
    }
}

fn render_table(status: &FleetStatus) -> String {
    let mut out = format!(
        "Project: {}\nLeader:  {}\nLive instances: {}\n",
        status.project,
        status.leader.as_deref().unwrap_or("none"),
        status.instances.len()
    );

    for view in &status.instances {
        let record = &view.record;
        out.push_str(&format!(
            "  {} {:<38} {:<24} {:<15} {:<12} last update {}\n",
            if view.is_master { "*" } else { " " },
            record.instance_id,
            record.host_name,
            record.ip_address,
            record.environment_tag,
            record.last_update,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::{InstanceIdentity, InstanceRecord, InstanceView};
    use jiff::Timestamp;

    #[test]
    fn test_render_table_marks_leader() {
        let now = Timestamp::now();
        let view = |id: &str, is_master| InstanceView {
            record: InstanceRecord::from_identity(&InstanceIdentity::with_id(id), now, 0),
            is_master,
        };
        let status = FleetStatus {
            project: "shop".to_string(),
            leader: Some("node-a".to_string()),
            instances: vec![view("node-a", true), view("node-b", false)],
        };

        let table = render_table(&status);
        assert!(table.contains("Leader:  node-a"));
        assert!(table.contains("Live instances: 2"));
        assert!(table.lines().any(|l| l.starts_with("  * node-a")));
        assert!(table.lines().any(|l| l.starts_with("    node-b")));
    }

    #[test]
    fn test_render_table_without_leader() {
        let status = FleetStatus {
            project: "shop".to_string(),
            leader: None,
            instances: Vec::new(),
        };
        assert!(render_table(&status).contains("Leader:  none"));
    }
}
