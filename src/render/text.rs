use super::{complexity_marker, layer_colors, type_icon};
use crate::error::RenderError;
use crate::model::{ArchitectureData, ComponentNode, ComponentType, Layer, Relationship, RelationshipType};
use std::collections::HashSet;
use std::fmt::Write;

/// Mermaid flowchart text for the system, component and C4 views.
pub struct TextDiagramRenderer;

impl TextDiagramRenderer {
    /// Every component, one subgraph per boundary.
    pub fn system_view(data: &ArchitectureData) -> Result<String, RenderError> {
        let mut out = String::from("graph TB\n");

        for boundary in &data.boundaries {
            writeln!(out, "    subgraph {}[\"{}\"]", boundary.id, label_text(&boundary.name))?;
            for component in boundary.components.iter().filter_map(|id| data.component(id)) {
                write_node(&mut out, component, &summary_label(component), 8)?;
            }
            writeln!(out, "    end")?;
        }

        let scope: HashSet<&str> = data.components.iter().map(|c| c.id.as_str()).collect();
        write_edges(&mut out, &data.relationships, &scope)?;
        write_layer_classes(&mut out, &data.components)?;
        Ok(out)
    }

    /// One boundary's components and the edges between them.
    pub fn component_view(data: &ArchitectureData, boundary_id: &str) -> Result<String, RenderError> {
        let boundary = data
            .boundary(boundary_id)
            .ok_or_else(|| RenderError::UnknownBoundary(boundary_id.to_string()))?;

        let members: Vec<&ComponentNode> = boundary.components.iter().filter_map(|id| data.component(id)).collect();
        let scope: HashSet<&str> = members.iter().map(|c| c.id.as_str()).collect();

        let mut out = String::from("graph LR\n");
        for component in &members {
            write_node(&mut out, component, &summary_label(component), 4)?;
        }
        write_edges(&mut out, &data.relationships, &scope)?;
        write_type_classes(&mut out, &members)?;
        Ok(out)
    }

    /// Boundaries as containers with full component detail.
    pub fn c4_view(data: &ArchitectureData) -> Result<String, RenderError> {
        let mut out = String::from("graph TB\n");

        for boundary in &data.boundaries {
            writeln!(
                out,
                "    subgraph {}[\"{} ({} components)\"]",
                boundary.id,
                label_text(&boundary.name),
                boundary.components.len()
            )?;
            writeln!(out, "        direction TB")?;
            for component in boundary.components.iter().filter_map(|id| data.component(id)) {
                write_node(&mut out, component, &detail_label(component), 8)?;
            }
            writeln!(out, "    end")?;
        }

        let scope: HashSet<&str> = data.components.iter().map(|c| c.id.as_str()).collect();
        write_edges(&mut out, &data.relationships, &scope)?;
        write_layer_classes(&mut out, &data.components)?;
        Ok(out)
    }
}

/// Mermaid labels cannot carry raw quotes or angle brackets.
fn label_text(text: &str) -> String {
    text.replace('"', "#quot;").replace('<', "#lt;").replace('>', "#gt;")
}

fn summary_label(component: &ComponentNode) -> String {
    let level = component.complexity_level();
    format!(
        "{} {}<br/>{} {}",
        type_icon(component.component_type),
        label_text(&component.name),
        complexity_marker(level),
        level.as_str()
    )
}

fn detail_label(component: &ComponentNode) -> String {
    format!(
        "{} <b>{}</b><br/>{}<br/>{}<br/>{} lines · complexity {}",
        type_icon(component.component_type),
        label_text(&component.name),
        component.component_type,
        label_text(&component.file),
        component.lines,
        component.complexity
    )
}

fn write_node(out: &mut String, component: &ComponentNode, label: &str, indent: usize) -> Result<(), RenderError> {
    writeln!(out, "{:indent$}{}[\"{}\"]", "", component.id, label, indent = indent)?;
    Ok(())
}

fn arrow(relationship_type: RelationshipType) -> &'static str {
    match relationship_type {
        RelationshipType::Imports => "-->",
        RelationshipType::Calls => "==>",
        RelationshipType::Extends => "-.->|extends|",
        RelationshipType::Implements => "-.->|implements|",
        RelationshipType::Uses => "-->|uses|",
        RelationshipType::Configures => "-.-o",
    }
}

fn write_edges(out: &mut String, relationships: &[Relationship], scope: &HashSet<&str>) -> Result<(), RenderError> {
    for relationship in relationships {
        if !scope.contains(relationship.from.as_str()) || !scope.contains(relationship.to.as_str()) {
            continue;
        }
        writeln!(
            out,
            "    {} {} {}",
            relationship.from,
            arrow(relationship.relationship_type),
            relationship.to
        )?;
    }
    Ok(())
}

fn write_layer_classes(out: &mut String, components: &[ComponentNode]) -> Result<(), RenderError> {
    for layer in Layer::ALL {
        let ids: Vec<&str> = components
            .iter()
            .filter(|c| c.layer == layer)
            .map(|c| c.id.as_str())
            .collect();
        if ids.is_empty() {
            continue;
        }
        let (fill, stroke) = layer_colors(layer);
        writeln!(out, "    classDef {} fill:{},stroke:{},stroke-width:2px", layer, fill, stroke)?;
        writeln!(out, "    class {} {}", ids.join(","), layer)?;
    }
    Ok(())
}

const TYPE_ORDER: [ComponentType; 7] = [
    ComponentType::Module,
    ComponentType::Class,
    ComponentType::Function,
    ComponentType::Service,
    ComponentType::Component,
    ComponentType::Config,
    ComponentType::External,
];

fn type_colors(component_type: ComponentType) -> (&'static str, &'static str) {
    match component_type {
        ComponentType::Module => ("#e0f2fe", "#0284c7"),
        ComponentType::Class => ("#fce7f3", "#db2777"),
        ComponentType::Function => ("#ecfccb", "#65a30d"),
        ComponentType::Service => ("#ffedd5", "#ea580c"),
        ComponentType::Component => ("#dbeafe", "#2563eb"),
        ComponentType::Config => ("#f5f5f4", "#57534e"),
        ComponentType::External => ("#f3f4f6", "#6b7280"),
    }
}

fn write_type_classes(out: &mut String, components: &[&ComponentNode]) -> Result<(), RenderError> {
    for component_type in TYPE_ORDER {
        let ids: Vec<&str> = components
            .iter()
            .filter(|c| c.component_type == component_type)
            .map(|c| c.id.as_str())
            .collect();
        if ids.is_empty() {
            continue;
        }
        let (fill, stroke) = type_colors(component_type);
        writeln!(
            out,
            "    classDef {}Type fill:{},stroke:{},stroke-width:1px",
            component_type, fill, stroke
        )?;
        writeln!(out, "    class {} {}Type", ids.join(","), component_type)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchitectureMetadata, BoundaryType, SystemBoundary};

    fn component(id: &str, name: &str, kind: ComponentType, layer: Layer, complexity: u32) -> ComponentNode {
        ComponentNode {
            id: id.to_string(),
            name: name.to_string(),
            component_type: kind,
            file: format!("src/{}.ts", name),
            layer,
            dependencies: vec![],
            exports: vec![],
            imports: vec![],
            complexity,
            lines: 10,
            description: None,
        }
    }

    fn sample() -> ArchitectureData {
        let components = vec![
            component("module_a", "app", ComponentType::Module, Layer::Presentation, 1),
            component("class_b", "Store", ComponentType::Class, Layer::Data, 4),
            component("class_c", "Base\"Store", ComponentType::Class, Layer::Data, 9),
        ];
        ArchitectureData {
            boundaries: vec![
                SystemBoundary {
                    id: "presentation".into(),
                    name: "Presentation Layer".into(),
                    components: vec!["module_a".into()],
                    boundary_type: BoundaryType::Container,
                },
                SystemBoundary {
                    id: "data".into(),
                    name: "Data Layer".into(),
                    components: vec!["class_b".into(), "class_c".into()],
                    boundary_type: BoundaryType::Container,
                },
            ],
            relationships: vec![
                Relationship {
                    from: "module_a".into(),
                    to: "class_b".into(),
                    relationship_type: RelationshipType::Imports,
                    weight: 1,
                },
                Relationship {
                    from: "class_b".into(),
                    to: "class_c".into(),
                    relationship_type: RelationshipType::Extends,
                    weight: 1,
                },
            ],
            metadata: ArchitectureMetadata {
                total_files: 2,
                total_components: 3,
                analysis_date: "2024-01-01T00:00:00Z".into(),
                source_identifier: "test".into(),
                main_languages: vec!["typescript".into()],
            },
            components,
        }
    }

    #[test]
    fn system_view_groups_by_boundary() {
        let text = TextDiagramRenderer::system_view(&sample()).unwrap();
        assert!(text.starts_with("graph TB\n"));
        assert!(text.contains("    subgraph presentation[\"Presentation Layer\"]"));
        assert!(text.contains("        module_a[\"📦 app<br/>🟢 low\"]"));
        assert!(text.contains("class_b[\"🏛️ Store<br/>🟡 medium\"]"));
        assert!(text.contains("🔴 high"));
        assert!(text.contains("    module_a --> class_b"));
        assert!(text.contains("    class_b -.->|extends| class_c"));
        assert!(text.contains("    class class_b,class_c data"));
        assert!(text.contains("Base#quot;Store"));
    }

    #[test]
    fn component_view_limits_scope() {
        let text = TextDiagramRenderer::component_view(&sample(), "data").unwrap();
        assert!(!text.contains("module_a"));
        assert!(text.contains("class_b -.->|extends| class_c"));
        assert!(text.contains("classDef classType"));
    }

    #[test]
    fn unknown_boundary_is_an_error() {
        let err = TextDiagramRenderer::component_view(&sample(), "nowhere").unwrap_err();
        assert_eq!(err, RenderError::UnknownBoundary("nowhere".to_string()));
    }

    #[test]
    fn c4_view_carries_detail() {
        let text = TextDiagramRenderer::c4_view(&sample()).unwrap();
        assert!(text.contains("subgraph data[\"Data Layer (2 components)\"]"));
        assert!(text.contains("src/Store.ts"));
        assert!(text.contains("10 lines · complexity 4"));
    }

    #[test]
    fn every_arrow_style() {
        assert_eq!(arrow(RelationshipType::Calls), "==>");
        assert_eq!(arrow(RelationshipType::Uses), "-->|uses|");
        assert_eq!(arrow(RelationshipType::Configures), "-.-o");
        assert_eq!(arrow(RelationshipType::Implements), "-.->|implements|");
    }
}
