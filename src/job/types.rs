//! Declarative job description handed to the orchestrator.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::JobSpecError;

/// Scheduler type of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Long-running service.
    Service,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Service => "service",
        }
    }
}

/// Task driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Docker container.
    Container,
}

impl DriverKind {
    /// Driver name understood by Nomad.
    pub fn driver_name(&self) -> &'static str {
        match self {
            DriverKind::Container => "docker",
        }
    }
}

/// A named, discoverable binding of a task to one of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    pub port_label: String,
}

impl ServiceRegistration {
    pub fn new(name: impl Into<String>, port_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_label: port_label.into(),
        }
    }
}

/// A statically reserved host port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortReservation {
    pub label: String,
    pub value: u16,
}

impl PortReservation {
    pub fn new(label: impl Into<String>, value: u16) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// A single container in a task group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub driver: DriverKind,
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub services: Vec<ServiceRegistration>,
    pub reserved_ports: Vec<PortReservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u32>,
}

impl Task {
    /// Creates a container task with no env, services or ports.
    pub fn container(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: DriverKind::Container,
            image: image.into(),
            env: BTreeMap::new(),
            services: Vec::new(),
            reserved_ports: Vec::new(),
            memory_limit_mb: None,
        }
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Reserves `port` under `label` and registers `service` on it.
    pub fn with_service(mut self, service: impl Into<String>, label: &str, port: u16) -> Self {
        self.services.push(ServiceRegistration::new(service, label));
        self.reserved_ports.push(PortReservation::new(label, port));
        self
    }

    /// Sets the memory limit in megabytes.
    pub fn with_memory_limit_mb(mut self, memory_mb: u32) -> Self {
        self.memory_limit_mb = Some(memory_mb);
        self
    }

    fn validate(&self) -> Result<(), JobSpecError> {
        let mut labels = HashSet::new();
        for port in &self.reserved_ports {
            if !labels.insert(port.label.as_str()) {
                return Err(JobSpecError::DuplicatePortLabel {
                    task: self.name.clone(),
                    label: port.label.clone(),
                });
            }
            if port.value == 0 {
                return Err(JobSpecError::InvalidPort {
                    task: self.name.clone(),
                    label: port.label.clone(),
                });
            }
            if !self.services.iter().any(|s| s.port_label == port.label) {
                return Err(JobSpecError::UnusedPortLabel {
                    task: self.name.clone(),
                    label: port.label.clone(),
                });
            }
        }

        for service in &self.services {
            if !labels.contains(service.port_label.as_str()) {
                return Err(JobSpecError::UnknownPortLabel {
                    task: self.name.clone(),
                    service: service.name.clone(),
                    label: service.port_label.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A set of co-located tasks sharing a replica count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub name: String,
    pub replica_count: u32,
    pub tasks: Vec<Task>,
}

/// Declarative description of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    pub name: String,
    pub kind: JobKind,
    pub region: String,
    pub priority: i32,
    pub datacenters: Vec<String>,
    pub task_groups: Vec<TaskGroup>,
}

impl JobSpec {
    /// Checks the structural invariants of the job.
    pub fn validate(&self) -> Result<(), JobSpecError> {
        if self.task_groups.is_empty() {
            return Err(JobSpecError::NoTaskGroups);
        }
        for group in &self.task_groups {
            if group.replica_count < 1 {
                return Err(JobSpecError::InvalidReplicaCount {
                    group: group.name.clone(),
                    count: group.replica_count,
                });
            }
            if group.tasks.is_empty() {
                return Err(JobSpecError::EmptyTaskGroup(group.name.clone()));
            }
            for task in &group.tasks {
                task.validate()?;
            }
        }
        Ok(())
    }

    /// Iterates over every task in every group.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.task_groups.iter().flat_map(|g| g.tasks.iter())
    }

    /// Finds a task by name.
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks().find(|t| t.name == name)
    }
}
