//! Key layout in the shared store.

/// Namespaced store keys for one project.
///
/// - instance records: `instances:{project}:{instance_id}`
/// - leader key: `instances:{project}-master`
/// - locks: `{lock_prefix}{name}`, prefix defaulting to `lock-{project}:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    project: String,
    lock_prefix: String,
}

impl KeySpace {
    pub fn new(project: impl Into<String>, lock_prefix: Option<&str>) -> Self {
        let project = project.into();
        let lock_prefix = match lock_prefix {
            Some(prefix) => prefix.to_string(),
            None => format!("lock-{}:", project),
        };
        Self {
            project,
            lock_prefix,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Prefix shared by every instance record of the project. The leader key
    /// does not start with it.
    pub fn instance_prefix(&self) -> String {
        format!("instances:{}:", self.project)
    }

    pub fn instance_key(&self, instance_id: &str) -> String {
        format!("{}{}", self.instance_prefix(), instance_id)
    }

    pub fn leader_key(&self) -> String {
        format!("instances:{}-master", self.project)
    }

    pub fn lock_prefix(&self) -> &str {
        &self.lock_prefix
    }

    pub fn lock_key(&self, name: &str) -> String {
        format!("{}{}", self.lock_prefix, name)
    }
}
