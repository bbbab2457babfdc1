use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

/// Static description of a published sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescription {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub unit: Option<String>,
    pub state_class: Option<StateClass>,
}

impl SensorDescription {
    pub fn new(key: impl Into<String>, name: impl Into<String>, icon: &str) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            icon: icon.to_string(),
            unit: None,
            state_class: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_state_class(mut self, state_class: StateClass) -> Self {
        self.state_class = Some(state_class);
        self
    }

    /// Sensors with a unit report numbers
    pub fn is_numeric(&self) -> bool {
        self.unit.is_some()
    }
}

/// Current value of a sensor as served over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub unit: Option<String>,
    pub state_class: Option<StateClass>,
    pub state: Value,
    pub attributes: Map<String, Value>,
}

impl SensorState {
    pub fn new(description: &SensorDescription, state: Value, attributes: Map<String, Value>) -> Self {
        Self {
            key: description.key.clone(),
            name: description.name.clone(),
            icon: description.icon.clone(),
            unit: description.unit.clone(),
            state_class: description.state_class,
            state,
            attributes,
        }
    }
}
