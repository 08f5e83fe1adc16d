//! Remote-inspectable property surface.
//!
//! The agent's tunable values are exposed through one explicit table —
//! `{name, kind, getter, setter}` — built once at construction. A server or
//! RPC layer enumerates the table and forwards get/set requests; nothing is
//! registered dynamically at runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::ClusterAgent;
use crate::config::{AxisRange, SearchBounds};
use crate::error::{AgentError, CoreResult};

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Boolean flag.
    Bool,
    /// Integer value.
    Int,
    /// Floating-point value.
    Float,
    /// Flat vector of floats.
    FloatVec,
    /// Free-form text.
    Text,
}

/// A property value crossing the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Flat vector of floats.
    FloatVec(Vec<f64>),
    /// Free-form text.
    Text(String),
}

impl PropertyValue {
    fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::FloatVec(_) => PropertyKind::FloatVec,
            PropertyValue::Text(_) => PropertyKind::Text,
        }
    }
}

type Getter = Box<dyn Fn() -> PropertyValue + Send + Sync>;
type Setter = Box<dyn Fn(PropertyValue) -> CoreResult<()> + Send + Sync>;

/// One table entry.
pub struct Property {
    name: &'static str,
    kind: PropertyKind,
    getter: Getter,
    setter: Option<Setter>,
}

impl Property {
    /// Property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type.
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// True when no setter is declared.
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

/// The enumerated property table over one agent.
pub struct PropertyRegistry {
    entries: Vec<Property>,
}

impl PropertyRegistry {
    /// Build the full table for `agent`.
    pub fn new(agent: Arc<ClusterAgent>) -> Self {
        let mut entries = Vec::new();

        let a = agent.clone();
        entries.push(Property {
            name: "instance_name",
            kind: PropertyKind::Text,
            getter: Box::new(move || PropertyValue::Text(a.config().instance_name)),
            setter: None,
        });

        let a = agent.clone();
        entries.push(Property {
            name: "motor_names",
            kind: PropertyKind::Text,
            getter: Box::new(move || PropertyValue::Text(a.config().motor_names.join(","))),
            setter: None,
        });

        let a = agent.clone();
        let s = agent.clone();
        entries.push(Property {
            name: "motor_resolution",
            kind: PropertyKind::Float,
            getter: Box::new(move || PropertyValue::Float(a.config().motor_resolution)),
            setter: Some(Box::new(move |v| match v {
                PropertyValue::Float(r) => s.set_motor_resolution(r),
                other => Err(type_error("motor_resolution", PropertyKind::Float, &other)),
            })),
        });

        let a = agent.clone();
        let s = agent.clone();
        entries.push(Property {
            name: "n_clusters",
            kind: PropertyKind::Int,
            getter: Box::new(move || PropertyValue::Int(a.config().n_clusters as i64)),
            setter: Some(Box::new(move |v| match v {
                PropertyValue::Int(k) if k > 0 => s.set_n_clusters(k as usize),
                PropertyValue::Int(k) => Err(AgentError::configuration(format!(
                    "n_clusters must be positive, got {k}"
                ))),
                other => Err(type_error("n_clusters", PropertyKind::Int, &other)),
            })),
        });

        let a = agent.clone();
        let s = agent.clone();
        entries.push(Property {
            name: "bounds",
            kind: PropertyKind::FloatVec,
            getter: Box::new(move || PropertyValue::FloatVec(a.config().bounds.flatten())),
            setter: Some(Box::new(move |v| match v {
                PropertyValue::FloatVec(flat) => s.set_bounds(unflatten_bounds(&flat)?),
                other => Err(type_error("bounds", PropertyKind::FloatVec, &other)),
            })),
        });

        let a = agent.clone();
        let s = agent.clone();
        entries.push(Property {
            name: "ask_on_tell",
            kind: PropertyKind::Bool,
            getter: Box::new(move || PropertyValue::Bool(a.config().ask_on_tell)),
            setter: Some(Box::new(move |v| match v {
                PropertyValue::Bool(flag) => {
                    s.set_ask_on_tell(flag);
                    Ok(())
                }
                other => Err(type_error("ask_on_tell", PropertyKind::Bool, &other)),
            })),
        });

        let a = agent.clone();
        let s = agent.clone();
        entries.push(Property {
            name: "report_on_tell",
            kind: PropertyKind::Bool,
            getter: Box::new(move || PropertyValue::Bool(a.config().report_on_tell)),
            setter: Some(Box::new(move |v| match v {
                PropertyValue::Bool(flag) => {
                    s.set_report_on_tell(flag);
                    Ok(())
                }
                other => Err(type_error("report_on_tell", PropertyKind::Bool, &other)),
            })),
        });

        let a = agent.clone();
        let s = agent.clone();
        entries.push(Property {
            name: "direct_to_queue",
            kind: PropertyKind::Bool,
            getter: Box::new(move || PropertyValue::Bool(a.config().direct_to_queue)),
            setter: Some(Box::new(move |v| match v {
                PropertyValue::Bool(flag) => {
                    s.set_direct_to_queue(flag);
                    Ok(())
                }
                other => Err(type_error("direct_to_queue", PropertyKind::Bool, &other)),
            })),
        });

        let a = agent.clone();
        entries.push(Property {
            name: "cache_len",
            kind: PropertyKind::Int,
            getter: Box::new(move || PropertyValue::Int(a.cache_len() as i64)),
            setter: None,
        });

        let a = agent;
        entries.push(Property {
            name: "phase",
            kind: PropertyKind::Text,
            getter: Box::new(move || PropertyValue::Text(a.phase().to_string())),
            setter: None,
        });

        Self { entries }
    }

    /// All entries, in declaration order.
    pub fn entries(&self) -> &[Property] {
        &self.entries
    }

    /// Property names, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|p| p.name).collect()
    }

    /// Read a property.
    ///
    /// # Errors
    ///
    /// [`AgentError::Configuration`] for an unknown name.
    pub fn get(&self, name: &str) -> CoreResult<PropertyValue> {
        let entry = self.lookup(name)?;
        Ok((entry.getter)())
    }

    /// Write a property.
    ///
    /// # Errors
    ///
    /// [`AgentError::Configuration`] for an unknown or read-only name, a
    /// mismatched value type, or a rejected value.
    pub fn set(&self, name: &str, value: PropertyValue) -> CoreResult<()> {
        let entry = self.lookup(name)?;
        match &entry.setter {
            Some(setter) => setter(value),
            None => Err(AgentError::configuration(format!(
                "property '{name}' is read-only"
            ))),
        }
    }

    fn lookup(&self, name: &str) -> CoreResult<&Property> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AgentError::configuration(format!("unknown property '{name}'")))
    }
}

fn type_error(name: &str, expected: PropertyKind, got: &PropertyValue) -> AgentError {
    AgentError::configuration(format!(
        "property '{name}' expects {expected:?}, got {:?}",
        got.kind()
    ))
}

/// Rebuild [`SearchBounds`] from the flat `[lo, hi]`-pairs representation.
fn unflatten_bounds(flat: &[f64]) -> CoreResult<SearchBounds> {
    match flat {
        [lo, hi] => Ok(SearchBounds::Line(AxisRange::new(*lo, *hi))),
        [xlo, xhi, ylo, yhi] => Ok(SearchBounds::Plane {
            x: AxisRange::new(*xlo, *xhi),
            y: AxisRange::new(*ylo, *yhi),
        }),
        other => Err(AgentError::configuration(format!(
            "bounds vector must have 2 or 4 entries, got {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    fn registry() -> (Arc<ClusterAgent>, PropertyRegistry) {
        let agent = Arc::new(
            ClusterAgent::new(AgentConfig::line("motor", AxisRange::new(-5.0, 5.0), 3)).unwrap(),
        );
        let registry = PropertyRegistry::new(agent.clone());
        (agent, registry)
    }

    #[test]
    fn table_is_enumerated_once() {
        let (_, registry) = registry();
        let names = registry.names();
        for expected in [
            "instance_name",
            "motor_names",
            "motor_resolution",
            "n_clusters",
            "bounds",
            "ask_on_tell",
            "report_on_tell",
            "direct_to_queue",
            "cache_len",
            "phase",
        ] {
            assert!(names.contains(&expected), "missing property {expected}");
        }
    }

    #[test]
    fn get_set_round_trip() {
        let (agent, registry) = registry();

        registry
            .set("n_clusters", PropertyValue::Int(5))
            .unwrap();
        assert_eq!(agent.config().n_clusters, 5);
        assert_eq!(
            registry.get("n_clusters").unwrap(),
            PropertyValue::Int(5)
        );

        registry
            .set("motor_resolution", PropertyValue::Float(0.25))
            .unwrap();
        assert_eq!(
            registry.get("motor_resolution").unwrap(),
            PropertyValue::Float(0.25)
        );

        registry
            .set("direct_to_queue", PropertyValue::Bool(false))
            .unwrap();
        assert!(!agent.config().direct_to_queue);
    }

    #[test]
    fn read_only_properties_reject_writes() {
        let (_, registry) = registry();
        assert!(registry
            .set("instance_name", PropertyValue::Text("x".into()))
            .is_err());
        assert!(registry.set("phase", PropertyValue::Text("Idle".into())).is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let (_, registry) = registry();
        assert!(registry
            .set("n_clusters", PropertyValue::Text("three".into()))
            .is_err());
        assert!(registry.set("n_clusters", PropertyValue::Int(0)).is_err());
    }

    #[test]
    fn bounds_round_trip_preserves_shape() {
        let (agent, registry) = registry();
        registry
            .set("bounds", PropertyValue::FloatVec(vec![-2.0, 2.0]))
            .unwrap();
        assert_eq!(agent.config().bounds.flatten(), vec![-2.0, 2.0]);
        // Dimensionality change rejected by the agent.
        assert!(registry
            .set("bounds", PropertyValue::FloatVec(vec![0.0, 1.0, 0.0, 1.0]))
            .is_err());
    }

    #[test]
    fn unknown_property_is_an_error() {
        let (_, registry) = registry();
        assert!(registry.get("no_such_property").is_err());
    }
}
