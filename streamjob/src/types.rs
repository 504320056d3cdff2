use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ResourceGroup = String;
pub type JobName = String;
pub type ChildName = String;
pub type Tags = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sku {
    Standard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventsOutOfOrderPolicy {
    Adjust,
    Drop,
}

/// A run-state the job can be driven to. Declared values outside this set request no transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Running,
    Stopped,
}

impl TargetState {
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared {
            "Running" => Some(TargetState::Running),
            "Stopped" => Some(TargetState::Stopped),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStartMode {
    JobStartTime,
    CustomTime,
    LastOutputEventTime,
}
