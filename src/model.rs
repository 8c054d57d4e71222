use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Module,
    Class,
    Function,
    Service,
    Component,
    Config,
    External,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Module => "module",
            ComponentType::Class => "class",
            ComponentType::Function => "function",
            ComponentType::Service => "service",
            ComponentType::Component => "component",
            ComponentType::Config => "config",
            ComponentType::External => "external",
        }
    }

    /// Types that can take part in an inheritance relationship.
    pub fn is_type_like(&self) -> bool {
        matches!(self, ComponentType::Class | ComponentType::Service | ComponentType::Component)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Presentation,
    Business,
    Data,
    Infrastructure,
    External,
}

impl Layer {
    /// Canonical display order, top of the stack first.
    pub const ALL: [Layer; 5] = [
        Layer::Presentation,
        Layer::Business,
        Layer::Data,
        Layer::Infrastructure,
        Layer::External,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Presentation => "presentation",
            Layer::Business => "business",
            Layer::Data => "data",
            Layer::Infrastructure => "infrastructure",
            Layer::External => "external",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Layer::Presentation => "Presentation Layer",
            Layer::Business => "Business Logic Layer",
            Layer::Data => "Data Layer",
            Layer::Infrastructure => "Infrastructure Layer",
            Layer::External => "External Systems",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Imports,
    Calls,
    Extends,
    Implements,
    Uses,
    Configures,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Imports => "imports",
            RelationshipType::Calls => "calls",
            RelationshipType::Extends => "extends",
            RelationshipType::Implements => "implements",
            RelationshipType::Uses => "uses",
            RelationshipType::Configures => "configures",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryType {
    System,
    Container,
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub file: String,
    pub layer: Layer,
    pub dependencies: Vec<String>,
    pub exports: Vec<String>,
    pub imports: Vec<String>,
    pub complexity: u32,
    pub lines: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ComponentNode {
    /// Complexity bucket used by every renderer.
    pub fn complexity_level(&self) -> ComplexityLevel {
        ComplexityLevel::from_score(self.complexity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=2 => ComplexityLevel::Low,
            3..=5 => ComplexityLevel::Medium,
            _ => ComplexityLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "low",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::High => "high",
        }
    }

    /// Indicator colour: green, amber, red.
    pub fn color(&self) -> &'static str {
        match self {
            ComplexityLevel::Low => "#22c55e",
            ComplexityLevel::Medium => "#f59e0b",
            ComplexityLevel::High => "#ef4444",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemBoundary {
    pub id: String,
    pub name: String,
    pub components: Vec<String>,
    #[serde(rename = "type")]
    pub boundary_type: BoundaryType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureMetadata {
    pub total_files: usize,
    pub total_components: usize,
    pub analysis_date: String,
    pub source_identifier: String,
    pub main_languages: Vec<String>,
}

/// Frozen result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureData {
    pub components: Vec<ComponentNode>,
    pub boundaries: Vec<SystemBoundary>,
    pub relationships: Vec<Relationship>,
    pub metadata: ArchitectureMetadata,
}

impl ArchitectureData {
    pub fn component(&self, id: &str) -> Option<&ComponentNode> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn boundary(&self, id: &str) -> Option<&SystemBoundary> {
        self.boundaries.iter().find(|b| b.id == id)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Derives a stable component id from where and what the component is.
///
/// The ordinal disambiguates repeated names inside one file, so two runs over
/// the same input always agree on every id.
pub fn component_id(file: &str, component_type: ComponentType, name: &str, ordinal: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update([0u8]);
    hasher.update(component_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    let digest = hasher.finalize();

    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("{}_{}", component_type.as_str(), hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_ids_are_deterministic() {
        let a = component_id("src/a.ts", ComponentType::Function, "foo", 0);
        let b = component_id("src/a.ts", ComponentType::Function, "foo", 0);
        assert_eq!(a, b);
        assert!(a.starts_with("function_"));
        assert_eq!(a.len(), "function_".len() + 12);
    }

    #[test]
    fn component_ids_differ_by_ordinal_and_path() {
        let first = component_id("src/a.ts", ComponentType::Function, "foo", 0);
        let second = component_id("src/a.ts", ComponentType::Function, "foo", 1);
        let other_file = component_id("src/b.ts", ComponentType::Function, "foo", 0);
        assert_ne!(first, second);
        assert_ne!(first, other_file);
    }

    #[test]
    fn complexity_thresholds() {
        assert_eq!(ComplexityLevel::from_score(1), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::from_score(2), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::from_score(3), ComplexityLevel::Medium);
        assert_eq!(ComplexityLevel::from_score(5), ComplexityLevel::Medium);
        assert_eq!(ComplexityLevel::from_score(6), ComplexityLevel::High);
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let node = ComponentNode {
            id: "module_000000000000".to_string(),
            name: "a.ts".to_string(),
            component_type: ComponentType::Module,
            file: "a.ts".to_string(),
            layer: Layer::Business,
            dependencies: vec![],
            exports: vec![],
            imports: vec![],
            complexity: 1,
            lines: 1,
            description: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "module");
        assert_eq!(json["layer"], "business");
        assert!(json.get("description").is_none());
    }
}
