use crate::model::{ArchitectureData, ComponentNode, ComponentType, Layer, Relationship, RelationshipType};
use crate::parser::ExtractedComponent;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::{Directed, Direction, Graph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

pub type DependencyGraph = Graph<GraphNode, RelationshipType, Directed>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub file: String,
}

/// Components with their layers assigned and the edges between them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub components: Vec<ComponentNode>,
    pub relationships: Vec<Relationship>,
}

const SOURCE_EXTENSIONS: [&str; 19] = [
    ".tsx", ".ts", ".jsx", ".mjs", ".cjs", ".js", ".py", ".hpp", ".hh", ".h", ".cpp", ".cc", ".cxx", ".c", ".scss",
    ".css", ".json", ".html", ".vue",
];

const LAYER_RULES: [(Layer, &[&str]); 4] = [
    (Layer::Presentation, &["/components/", "/pages/", "/views/", "/ui/"]),
    (Layer::Business, &["/services/", "/business/", "/logic/", "/api/"]),
    (Layer::Data, &["/data/", "/models/", "/repositories/", "/database/"]),
    (Layer::Infrastructure, &["/config/", "/utils/", "/infrastructure/", "/lib/"]),
];

/// Architectural layer of a file, from path segments alone.
pub fn classify_layer(path: &str) -> Layer {
    let mut normalized = path.replace('\\', "/").to_lowercase();
    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }

    LAYER_RULES
        .iter()
        .find(|(_, markers)| markers.iter().any(|marker| normalized.contains(marker)))
        .map(|(layer, _)| *layer)
        .unwrap_or(Layer::Business)
}

/// Reduce an import string to the path-like name used for lookups.
///
/// `"./lib/util.ts"` becomes `lib/util`, `..models` becomes `models`, and a
/// dotted module path such as `app.db` becomes `app/db`.
pub fn normalize_dependency(raw: &str) -> String {
    let mut name = raw.trim().trim_matches(['"', '\'', '`', '<', '>']);

    loop {
        let stripped = ["./", "../", "@/", "~/"]
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix));
        match stripped {
            Some(rest) => name = rest,
            None => break,
        }
    }

    // Python relative imports: `.models`, `..core.db`
    let relative = name.starts_with('.');
    let name = name.trim_start_matches('.');

    let name = SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name);

    let dotted = relative || (!name.contains('/') && name.contains('.') && name.split('.').all(is_word));
    let name = if dotted { name.replace('.', "/") } else { name.to_string() };
    name.trim_matches('/').to_string()
}

fn is_word(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// `path` is `tail` or ends in `/tail`, so `b` never matches `about`.
fn ends_with_segments(path: &str, tail: &str) -> bool {
    match path.strip_suffix(tail) {
        Some(head) => head.is_empty() || head.ends_with('/'),
        None => false,
    }
}

fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

/// Kind of edge implied by the two endpoints and the clause the name came from.
pub fn infer_relationship(from: &ComponentNode, to: &ComponentNode, implements: bool) -> RelationshipType {
    if from.component_type == ComponentType::Config {
        return RelationshipType::Configures;
    }
    if implements && to.component_type.is_type_like() {
        return RelationshipType::Implements;
    }
    if from.component_type == ComponentType::Component && to.component_type == ComponentType::Component {
        return RelationshipType::Uses;
    }
    if from.component_type.is_type_like() && to.component_type.is_type_like() {
        return RelationshipType::Extends;
    }
    RelationshipType::Imports
}

pub struct GraphBuilder {
    graph: DependencyGraph,
    node_map: HashMap<String, NodeIndex>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Rebuild the petgraph view of an already-frozen snapshot.
    pub fn from_architecture(data: &ArchitectureData) -> Self {
        let mut builder = Self::new();
        for component in &data.components {
            builder.add_node(component);
        }
        for relationship in &data.relationships {
            builder.add_edge(relationship);
        }
        builder
    }

    /// Resolve every raw dependency name, assign layers and collect the edges.
    ///
    /// Lookup order per name: exact component name, then a file-level
    /// component whose path contains the name, then an export list. Ties go
    /// to the component extracted first. Names that match nothing are
    /// external and produce no edge.
    pub fn build(&mut self, extracted: Vec<ExtractedComponent>) -> ResolvedGraph {
        self.graph.clear();
        self.node_map.clear();

        let (mut components, implements): (Vec<ComponentNode>, Vec<Vec<String>>) =
            extracted.into_iter().map(|c| (c.node, c.implements)).unzip();

        for component in &mut components {
            component.layer = classify_layer(&component.file);
            self.add_node(component);
        }

        let index = ResolutionIndex::new(&components);
        let mut relationships: Vec<Relationship> = Vec::new();
        let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
        let mut external = 0usize;

        for (from, component) in components.iter().enumerate() {
            for dependency in &component.dependencies {
                let Some(to) = index.resolve(&components, from, dependency) else {
                    external += 1;
                    continue;
                };

                if let Some(&existing) = seen.get(&(from, to)) {
                    relationships[existing].weight += 1;
                    continue;
                }

                let relationship_type =
                    infer_relationship(component, &components[to], implements[from].contains(dependency));
                seen.insert((from, to), relationships.len());
                relationships.push(Relationship {
                    from: component.id.clone(),
                    to: components[to].id.clone(),
                    relationship_type,
                    weight: 1,
                });
            }
        }

        for relationship in &relationships {
            self.add_edge(relationship);
        }

        debug!(
            components = components.len(),
            relationships = relationships.len(),
            external,
            "resolved dependencies"
        );

        ResolvedGraph {
            components,
            relationships,
        }
    }

    fn add_node(&mut self, component: &ComponentNode) {
        let index = self.graph.add_node(GraphNode {
            id: component.id.clone(),
            name: component.name.clone(),
            file: component.file.clone(),
        });
        self.node_map.insert(component.id.clone(), index);
    }

    fn add_edge(&mut self, relationship: &Relationship) {
        if let (Some(&from), Some(&to)) = (self.node_map.get(&relationship.from), self.node_map.get(&relationship.to)) {
            self.graph.add_edge(from, to, relationship.relationship_type);
        }
    }

    pub fn get_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn get_node_map(&self) -> &HashMap<String, NodeIndex> {
        &self.node_map
    }

    pub fn analyze_dependencies(&self) -> DependencyAnalysis {
        let total_nodes = self.graph.node_count();
        let total_edges = self.graph.edge_count();

        let mut edge_types = BTreeMap::new();
        for edge_weight in self.graph.edge_weights() {
            *edge_types.entry(edge_weight.as_str().to_string()).or_insert(0) += 1;
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<String> = scc.iter().map(|&n| self.graph[n].id.clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();

        let mut coupling: Vec<Coupling> = Vec::new();
        let mut orphans = Vec::new();
        for index in self.graph.node_indices() {
            let node = &self.graph[index];
            let fan_in = self.graph.neighbors_directed(index, Direction::Incoming).count();
            let fan_out = self.graph.neighbors_directed(index, Direction::Outgoing).count();
            if fan_in + fan_out == 0 {
                orphans.push(node.id.clone());
            } else {
                coupling.push(Coupling {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    fan_in,
                    fan_out,
                });
            }
        }
        coupling.sort_by(|a, b| {
            (b.fan_in + b.fan_out)
                .cmp(&(a.fan_in + a.fan_out))
                .then_with(|| a.name.cmp(&b.name))
        });
        coupling.truncate(10);

        DependencyAnalysis {
            total_nodes,
            total_edges,
            edge_types,
            strongly_connected_components: cycles.len(),
            cycles,
            most_coupled: coupling,
            orphans,
            avg_degree: if total_nodes > 0 { total_edges as f64 / total_nodes as f64 } else { 0.0 },
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lookup tables over one run's components, built once per resolution pass.
struct ResolutionIndex {
    by_name: HashMap<String, Vec<usize>>,
    /// Extension-less paths of file-level components, in extraction order.
    file_paths: Vec<(usize, String)>,
}

impl ResolutionIndex {
    fn new(components: &[ComponentNode]) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut file_paths = Vec::new();
        let mut seen_files: HashSet<&str> = HashSet::new();

        for (i, component) in components.iter().enumerate() {
            by_name.entry(component.name.clone()).or_default().push(i);
            if matches!(component.component_type, ComponentType::Module | ComponentType::Config)
                && seen_files.insert(component.file.as_str())
            {
                file_paths.push((i, strip_extension(&component.file.replace('\\', "/")).to_string()));
            }
        }

        Self { by_name, file_paths }
    }

    fn resolve(&self, components: &[ComponentNode], from: usize, raw: &str) -> Option<usize> {
        let normalized = normalize_dependency(raw);
        if normalized.is_empty() {
            return None;
        }
        let last_segment = normalized.rsplit('/').next().unwrap_or(&normalized);

        let exact = [raw.trim(), last_segment]
            .iter()
            .filter_map(|name| self.by_name.get(*name))
            .flat_map(|candidates| candidates.iter().copied())
            .filter(|&i| i != from)
            .min();
        if exact.is_some() {
            return exact;
        }

        let own_file = components[from].file.as_str();
        let by_path = self
            .file_paths
            .iter()
            .find(|(i, path)| components[*i].file != own_file && ends_with_segments(path, &normalized))
            .map(|(i, _)| *i);
        if by_path.is_some() {
            return by_path;
        }

        components
            .iter()
            .enumerate()
            .find(|(i, c)| *i != from && c.exports.iter().any(|e| e == last_segment))
            .map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupling {
    pub id: String,
    pub name: String,
    pub fan_in: usize,
    pub fan_out: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub edge_types: BTreeMap<String, usize>,
    pub strongly_connected_components: usize,
    /// Component ids of every dependency cycle.
    pub cycles: Vec<Vec<String>>,
    pub most_coupled: Vec<Coupling>,
    pub orphans: Vec<String>,
    pub avg_degree: f64,
}

impl DependencyAnalysis {
    pub fn print_summary(&self) {
        println!("Dependency Graph Analysis:");
        println!("  Total nodes: {}", self.total_nodes);
        println!("  Total edges: {}", self.total_edges);
        println!("  Average degree: {:.2}", self.avg_degree);
        println!("  Dependency cycles: {}", self.strongly_connected_components);
        println!("  Orphan components: {}", self.orphans.len());

        println!("  Edge types:");
        for (edge_type, count) in &self.edge_types {
            println!("    {}: {}", edge_type, count);
        }

        if !self.most_coupled.is_empty() {
            println!("  Most coupled:");
            for entry in self.most_coupled.iter().take(5) {
                println!("    {} (in: {}, out: {})", entry.name, entry.fan_in, entry.fan_out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_discovery::SourceFile;
    use crate::parser::ParserRegistry;

    fn extract(files: &[(&str, &str)]) -> Vec<ExtractedComponent> {
        let registry = ParserRegistry::new().unwrap();
        files
            .iter()
            .flat_map(|(path, content)| {
                registry
                    .parse(&SourceFile::new(*path, *content))
                    .unwrap()
                    .unwrap()
                    .into_components()
            })
            .collect()
    }

    fn find<'a>(graph: &'a ResolvedGraph, name: &str) -> &'a ComponentNode {
        graph.components.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn classifies_layers_by_path() {
        assert_eq!(classify_layer("src/components/Button.tsx"), Layer::Presentation);
        assert_eq!(classify_layer("components/Button.tsx"), Layer::Presentation);
        assert_eq!(classify_layer("src/services/api.ts"), Layer::Business);
        assert_eq!(classify_layer("app/models/user.py"), Layer::Data);
        assert_eq!(classify_layer("src\\utils\\format.js"), Layer::Infrastructure);
        assert_eq!(classify_layer("main.c"), Layer::Business);
        // first matching rule wins
        assert_eq!(classify_layer("src/components/data/table.tsx"), Layer::Presentation);
    }

    #[test]
    fn normalizes_dependency_names() {
        assert_eq!(normalize_dependency("./b"), "b");
        assert_eq!(normalize_dependency("'../../lib/util.ts'"), "lib/util");
        assert_eq!(normalize_dependency("@/components/Button"), "components/Button");
        assert_eq!(normalize_dependency("~/store"), "store");
        assert_eq!(normalize_dependency(".models"), "models");
        assert_eq!(normalize_dependency("app.db"), "app/db");
        assert_eq!(normalize_dependency("util.h"), "util");
        assert_eq!(normalize_dependency("react"), "react");
        assert_eq!(normalize_dependency("./"), "");
    }

    #[test]
    fn import_resolves_to_module_by_path() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("a.ts", "import {x} from './b'; function foo(a,b) {}"),
            ("b.ts", "export const x = 1;"),
        ]));

        assert_eq!(graph.components.len(), 3);
        assert_eq!(graph.relationships.len(), 1);
        let edge = &graph.relationships[0];
        assert_eq!(edge.from, find(&graph, "a.ts").id);
        assert_eq!(edge.to, find(&graph, "b.ts").id);
        assert_eq!(edge.relationship_type, RelationshipType::Imports);
    }

    #[test]
    fn path_lookup_matches_whole_segments() {
        assert!(ends_with_segments("b", "b"));
        assert!(ends_with_segments("src/b", "b"));
        assert!(ends_with_segments("src/services/catalog", "services/catalog"));
        assert!(!ends_with_segments("src/about", "b"));
        assert!(!ends_with_segments("src/utils/format", "util"));
        assert!(!ends_with_segments("src/myservices/catalog", "services/catalog"));
    }

    #[test]
    fn relative_import_ignores_files_merely_containing_the_name() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("src/about.ts", "export const about = 1;"),
            ("src/b.ts", "export const x = 1;"),
            ("src/main.ts", "import {x} from './b';"),
        ]));

        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].from, find(&graph, "main.ts").id);
        assert_eq!(graph.relationships[0].to, find(&graph, "b.ts").id);
    }

    #[test]
    fn include_stem_does_not_match_a_longer_directory() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("src/utils/format.js", "export function pad(s) { return s; }"),
            ("src/main.c", "#include \"util.h\"\nint main(void) {\n  return 0;\n}\n"),
        ]));
        assert!(graph.relationships.is_empty());
    }

    #[test]
    fn missing_parent_never_binds_to_its_own_file() {
        for (path, source) in [
            ("src/Animal/Dog.ts", "class Dog extends Animal {}"),
            ("src/BaseDog.ts", "class Dog extends Base {}"),
        ] {
            let mut builder = GraphBuilder::new();
            let graph = builder.build(extract(&[(path, source)]));
            assert!(graph.relationships.is_empty(), "{} produced {:?}", path, graph.relationships);
        }
    }

    #[test]
    fn parent_class_resolves_only_when_present() {
        let mut builder = GraphBuilder::new();
        let alone = builder.build(extract(&[("dog.ts", "class Dog extends Animal {}")]));
        assert!(alone.relationships.is_empty());

        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("dog.ts", "class Dog extends Animal {}"),
            ("animal.ts", "export class Animal {}"),
        ]));
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].relationship_type, RelationshipType::Extends);
        assert_eq!(graph.relationships[0].to, find(&graph, "Animal").id);
    }

    #[test]
    fn implements_clause_is_typed() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("pet.ts", "export interface Pet {}"),
            ("cat.ts", "export class Cat implements Pet {}"),
        ]));
        let cat = find(&graph, "Cat");
        let edge = graph.relationships.iter().find(|r| r.from == cat.id).unwrap();
        assert_eq!(edge.relationship_type, RelationshipType::Implements);
    }

    #[test]
    fn repeated_resolution_increments_weight() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("src/app.js", "import a from './lib/util';\nconst b = require('./lib/util.js');\n"),
            ("src/lib/util.js", "export function helper() {}"),
        ]));
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].weight, 2);
        assert_eq!(find(&graph, "util.js").layer, Layer::Infrastructure);
    }

    #[test]
    fn manifests_configure_and_layers_are_assigned() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("package.json", r#"{"dependencies": {"react": "18", "shared": "1"}}"#),
            ("src/components/shared.ts", "export const shared = 1;"),
        ]));
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].relationship_type, RelationshipType::Configures);
        assert_eq!(find(&graph, "shared.ts").layer, Layer::Presentation);
        assert_eq!(find(&graph, "package.json").layer, Layer::Business);
    }

    #[test]
    fn every_edge_references_existing_components() {
        let mut builder = GraphBuilder::new();
        let graph = builder.build(extract(&[
            ("a.js", "import b from './b';\nimport missing from 'left-pad';\n"),
            ("b.js", "import a from './a';\n"),
        ]));
        for relationship in &graph.relationships {
            assert!(graph.components.iter().any(|c| c.id == relationship.from));
            assert!(graph.components.iter().any(|c| c.id == relationship.to));
        }
    }

    #[test]
    fn analysis_reports_cycles_and_orphans() {
        let mut builder = GraphBuilder::new();
        builder.build(extract(&[
            ("a.js", "import b from './b';\n"),
            ("b.js", "import a from './a';\n"),
            ("c.js", "function lonely() {}\n"),
        ]));
        let analysis = builder.analyze_dependencies();

        assert_eq!(analysis.total_nodes, 4);
        assert_eq!(analysis.total_edges, 2);
        assert_eq!(analysis.strongly_connected_components, 1);
        assert_eq!(analysis.cycles[0].len(), 2);
        assert_eq!(analysis.orphans.len(), 2);
        assert_eq!(analysis.edge_types.get("imports"), Some(&2));
        assert_eq!(analysis.most_coupled.len(), 2);
    }
}
