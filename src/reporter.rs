use crate::{
    analyzer::Analysis,
    config::LayoutConfig,
    dependency_graph::DependencyAnalysis,
    model::{ArchitectureData, ComplexityLevel, ComponentType, Layer},
    render::{BlockLayoutRenderer, DiagramView, ForceGraphRenderer, SvgOptions, TextDiagramRenderer},
};
use anyhow::Result;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// How many of the most complex components the report lists.
const TOP_COMPLEX: usize = 10;

#[derive(Debug, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub layer_distribution: Vec<LayerStats>,
    pub type_distribution: Vec<TypeStats>,
    pub complexity_distribution: Vec<ComplexityBucket>,
    pub most_complex: Vec<ComplexComponent>,
    pub dependency_analysis: DependencyAnalysis,
    pub skipped_files: Vec<String>,
    pub architecture: ArchitectureData,
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub source_identifier: String,
    pub total_files: usize,
    pub total_size: u64,
    pub total_components: usize,
    pub total_relationships: usize,
    pub main_languages: Vec<String>,
    pub analysis_duration_ms: u128,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct LayerStats {
    pub layer: Layer,
    pub components: usize,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct TypeStats {
    pub component_type: ComponentType,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ComplexityBucket {
    pub level: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct ComplexComponent {
    pub name: String,
    pub component_type: ComponentType,
    pub file: String,
    pub complexity: u32,
    pub lines: u32,
}

/// Every diagram of one snapshot, each either drawn or replaced by its error.
#[derive(Debug, Clone)]
pub struct Diagrams {
    pub system: DiagramView<String>,
    pub c4: DiagramView<String>,
    pub components: Vec<(String, DiagramView<String>)>,
    pub blocks: DiagramView<String>,
    pub dataflow: DiagramView<String>,
}

pub struct Reporter {
    layout: LayoutConfig,
}

impl Reporter {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    pub fn generate_report(&self, analysis: &Analysis, duration_ms: u128) -> Report {
        let data = &analysis.data;
        let total = data.components.len();
        let percentage = |count: usize| if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 };

        let layer_distribution = Layer::ALL
            .iter()
            .map(|layer| {
                let components = data.components.iter().filter(|c| c.layer == *layer).count();
                LayerStats {
                    layer: *layer,
                    components,
                    percentage: percentage(components),
                }
            })
            .filter(|stats| stats.components > 0)
            .collect();

        let mut type_distribution: Vec<TypeStats> = Vec::new();
        for component in &data.components {
            match type_distribution.iter_mut().find(|t| t.component_type == component.component_type) {
                Some(stats) => stats.count += 1,
                None => type_distribution.push(TypeStats {
                    component_type: component.component_type,
                    count: 1,
                }),
            }
        }
        type_distribution.sort_by(|a, b| b.count.cmp(&a.count));

        let complexity_distribution = [ComplexityLevel::Low, ComplexityLevel::Medium, ComplexityLevel::High]
            .iter()
            .map(|level| {
                let count = data.components.iter().filter(|c| c.complexity_level() == *level).count();
                ComplexityBucket {
                    level: level.as_str().to_string(),
                    count,
                    percentage: percentage(count),
                }
            })
            .collect();

        let mut ranked: Vec<_> = data.components.iter().collect();
        ranked.sort_by(|a, b| b.complexity.cmp(&a.complexity).then_with(|| a.name.cmp(&b.name)));
        let most_complex = ranked
            .into_iter()
            .take(TOP_COMPLEX)
            .map(|c| ComplexComponent {
                name: c.name.clone(),
                component_type: c.component_type,
                file: c.file.clone(),
                complexity: c.complexity,
                lines: c.lines,
            })
            .collect();

        Report {
            metadata: ReportMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                source_identifier: data.metadata.source_identifier.clone(),
                total_files: data.metadata.total_files,
                total_size: analysis.stats.total_size,
                total_components: total,
                total_relationships: data.relationships.len(),
                main_languages: data.metadata.main_languages.clone(),
                analysis_duration_ms: duration_ms,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            layer_distribution,
            type_distribution,
            complexity_distribution,
            most_complex,
            dependency_analysis: analysis.dependencies.clone(),
            skipped_files: analysis.skipped_files.clone(),
            architecture: data.clone(),
        }
    }

    /// Draw every diagram. A failing renderer only affects its own view.
    pub fn render_diagrams(&self, data: &ArchitectureData) -> Diagrams {
        let components = data
            .boundaries
            .iter()
            .map(|b| {
                let view = DiagramView::capture("component", TextDiagramRenderer::component_view(data, &b.id));
                (b.id.clone(), view)
            })
            .collect();

        Diagrams {
            system: DiagramView::capture("system", TextDiagramRenderer::system_view(data)),
            c4: DiagramView::capture("c4", TextDiagramRenderer::c4_view(data)),
            components,
            blocks: DiagramView::capture(
                "blocks",
                BlockLayoutRenderer::new(self.layout.block.clone()).render_svg(data, SvgOptions::default()),
            ),
            dataflow: DiagramView::capture(
                "dataflow",
                ForceGraphRenderer::new(self.layout.force.clone()).render_svg(data),
            ),
        }
    }

    /// Write the snapshot as JSON only.
    pub fn export_json(&self, data: &ArchitectureData, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let json_path = output_dir.join("architecture.json");
        fs::write(&json_path, data.to_json()?)?;
        info!(path = %json_path.display(), "wrote architecture snapshot");
        Ok(json_path)
    }

    pub fn export_report(&self, report: &Report, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut exported_files = vec![self.export_json(&report.architecture, output_dir)?];
        let diagrams = self.render_diagrams(&report.architecture);

        for (file_name, view) in [
            ("system.mmd", &diagrams.system),
            ("c4.mmd", &diagrams.c4),
            ("blocks.svg", &diagrams.blocks),
            ("dataflow.svg", &diagrams.dataflow),
        ] {
            match view {
                DiagramView::Ready(content) => {
                    let path = output_dir.join(file_name);
                    fs::write(&path, content)?;
                    exported_files.push(path);
                }
                DiagramView::Failed(e) => warn!(file = file_name, error = %e, "skipping diagram file"),
            }
        }

        let md_path = output_dir.join("summary.md");
        fs::write(&md_path, self.generate_markdown_summary(report, &diagrams))?;
        exported_files.push(md_path);

        let html_path = output_dir.join("report.html");
        fs::write(&html_path, self.generate_html_report(report, &diagrams))?;
        exported_files.push(html_path);

        info!(dir = %output_dir.display(), files = exported_files.len(), "exported report");
        Ok(exported_files)
    }

    fn generate_markdown_summary(&self, report: &Report, diagrams: &Diagrams) -> String {
        let mut md = format!(
            "# Architecture Summary\n\n**Source:** {}\n**Generated:** {}\n**Analysis Duration:** {}ms\n\n",
            report.metadata.source_identifier, report.metadata.generated_at, report.metadata.analysis_duration_ms
        );

        md.push_str("## Overview\n\n");
        md.push_str(&format!("- **Total Files:** {}\n", report.metadata.total_files));
        md.push_str(&format!("- **Total Size:** {:.2} MB\n", report.metadata.total_size as f64 / (1024.0 * 1024.0)));
        md.push_str(&format!("- **Components:** {}\n", report.metadata.total_components));
        md.push_str(&format!("- **Relationships:** {}\n", report.metadata.total_relationships));
        md.push_str(&format!("- **Dependency Cycles:** {}\n", report.dependency_analysis.cycles.len()));
        if !report.metadata.main_languages.is_empty() {
            md.push_str(&format!("- **Main Languages:** {}\n", report.metadata.main_languages.join(", ")));
        }
        md.push('\n');

        md.push_str("## Layers\n\n");
        for stats in &report.layer_distribution {
            md.push_str(&format!(
                "- **{}:** {} components ({:.1}%)\n",
                stats.layer.display_name(),
                stats.components,
                stats.percentage
            ));
        }
        md.push('\n');

        md.push_str("## Most Complex Components\n\n");
        md.push_str("| Component | Type | File | Complexity | Lines |\n|---|---|---|---|---|\n");
        for c in &report.most_complex {
            md.push_str(&format!(
                "| {} | {} | `{}` | {} | {} |\n",
                table_cell(&c.name),
                c.component_type,
                table_cell(&c.file),
                c.complexity,
                c.lines
            ));
        }
        md.push('\n');

        if !report.dependency_analysis.cycles.is_empty() {
            md.push_str("## Dependency Cycles\n\n");
            for cycle in &report.dependency_analysis.cycles {
                let names: Vec<&str> = cycle
                    .iter()
                    .map(|id| report.architecture.component(id).map_or(id.as_str(), |c| c.name.as_str()))
                    .collect();
                md.push_str(&format!("- {}\n", names.join(" → ")));
            }
            md.push('\n');
        }

        if !report.skipped_files.is_empty() {
            md.push_str("## Skipped Files\n\n");
            for file in &report.skipped_files {
                md.push_str(&format!("- `{}`\n", file));
            }
            md.push('\n');
        }

        md.push_str("## System View\n\n");
        md.push_str(&mermaid_section(&diagrams.system));
        md.push_str("## C4 Container View\n\n");
        md.push_str(&mermaid_section(&diagrams.c4));
        for (boundary_id, view) in &diagrams.components {
            let title = report
                .architecture
                .boundary(boundary_id)
                .map_or(boundary_id.as_str(), |b| b.name.as_str());
            md.push_str(&format!("### {}\n\n", title));
            md.push_str(&mermaid_section(view));
        }

        md
    }

    fn generate_html_report(&self, report: &Report, diagrams: &Diagrams) -> String {
        let layer_rows: String = report
            .layer_distribution
            .iter()
            .map(|s| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
                    s.layer.display_name(),
                    s.components,
                    s.percentage
                )
            })
            .collect();

        let complex_rows: String = report
            .most_complex
            .iter()
            .map(|c| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td><td>{}</td></tr>",
                    html_escape(&c.name),
                    c.component_type,
                    html_escape(&c.file),
                    c.complexity,
                    c.lines
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Architecture Report - {source}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }}
        .header {{ border-bottom: 2px solid #333; padding-bottom: 20px; }}
        .section {{ margin: 30px 0; }}
        .metric {{ display: inline-block; margin: 10px 20px 10px 0; padding: 10px; background: #f5f5f5; border-radius: 5px; }}
        .diagram {{ overflow: auto; border: 1px solid #ddd; border-radius: 5px; padding: 10px; }}
        .diagram-error {{ padding: 15px; border-left: 4px solid #ef4444; background: #fef2f2; color: #991b1b; }}
        table {{ border-collapse: collapse; width: 100%; margin: 10px 0; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; vertical-align: top; }}
        th {{ background-color: #f2f2f2; font-weight: bold; }}
    </style>
    <script type="module">
        import mermaid from 'https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.esm.min.mjs';
        mermaid.initialize({{ startOnLoad: true }});
    </script>
</head>
<body>
    <div class="header">
        <h1>Architecture Report</h1>
        <p><strong>Source:</strong> {source}</p>
        <p><strong>Generated:</strong> {generated}</p>
        <p><strong>Analysis Duration:</strong> {duration}ms</p>
    </div>

    <div class="section">
        <h2>Overview</h2>
        <div class="metric"><strong>Files:</strong> {files}</div>
        <div class="metric"><strong>Components:</strong> {components}</div>
        <div class="metric"><strong>Relationships:</strong> {relationships}</div>
        <div class="metric"><strong>Cycles:</strong> {cycles}</div>
        <div class="metric"><strong>Languages:</strong> {languages}</div>
    </div>

    <div class="section">
        <h2>Layers</h2>
        <table><tr><th>Layer</th><th>Components</th><th>Share</th></tr>{layer_rows}</table>
    </div>

    <div class="section">
        <h2>Most Complex Components</h2>
        <table><tr><th>Component</th><th>Type</th><th>File</th><th>Complexity</th><th>Lines</th></tr>{complex_rows}</table>
    </div>

    <div class="section">
        <h2>System View</h2>
        {system}
    </div>

    <div class="section">
        <h2>Layered Blocks</h2>
        {blocks}
    </div>

    <div class="section">
        <h2>Data Flow</h2>
        {dataflow}
    </div>
</body>
</html>
"#,
            source = html_escape(&report.metadata.source_identifier),
            generated = report.metadata.generated_at,
            duration = report.metadata.analysis_duration_ms,
            files = report.metadata.total_files,
            components = report.metadata.total_components,
            relationships = report.metadata.total_relationships,
            cycles = report.dependency_analysis.cycles.len(),
            languages = html_escape(&report.metadata.main_languages.join(", ")),
            layer_rows = layer_rows,
            complex_rows = complex_rows,
            system = html_section(&diagrams.system, |text| format!(
                r#"<pre class="mermaid">{}</pre>"#,
                html_escape(text)
            )),
            blocks = html_section(&diagrams.blocks, |svg| svg.clone()),
            dataflow = html_section(&diagrams.dataflow, |svg| svg.clone()),
        )
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

fn mermaid_section(view: &DiagramView<String>) -> String {
    match view {
        DiagramView::Ready(text) => format!("```mermaid\n{}```\n\n", text),
        DiagramView::Failed(e) => format!("> ⚠️ Diagram unavailable: {}\n\n", e),
    }
}

fn html_section(view: &DiagramView<String>, embed: impl Fn(&String) -> String) -> String {
    match view {
        DiagramView::Ready(content) => format!(r#"<div class="diagram">{}</div>"#, embed(content)),
        DiagramView::Failed(e) => format!(
            r#"<div class="diagram-error">Diagram unavailable: {}</div>"#,
            html_escape(&e.to_string())
        ),
    }
}

/// A pipe or line break would end the Markdown table row early.
fn table_cell(raw: &str) -> String {
    raw.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::Config;
    use crate::file_discovery::SourceFile;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    fn analysis() -> Analysis {
        let files = vec![
            SourceFile::new(
                "src/components/Cart.jsx",
                "import { total } from '../services/pricing';\nexport function Cart(props) {\n  if (props.items) { return <ul/>; }\n  return null;\n}\n",
            ),
            SourceFile::new(
                "src/services/pricing.js",
                "export function total(items) {\n  let sum = 0;\n  for (const i of items) { if (i.price) { sum += i.price; } }\n  return sum;\n}\n",
            ),
            SourceFile::new("package.json", r#"{"name": "shop", "dependencies": {"react": "18"}}"#),
        ];
        Analyzer::new(Config::default())
            .unwrap()
            .analyze_files(files, "shop", &NoProgress)
            .unwrap()
    }

    #[test]
    fn report_summarizes_distributions() {
        let analysis = analysis();
        let report = Reporter::default().generate_report(&analysis, 12);

        assert_eq!(report.metadata.total_components, analysis.data.components.len());
        let counted: usize = report.layer_distribution.iter().map(|l| l.components).sum();
        assert_eq!(counted, analysis.data.components.len());
        let bucketed: usize = report.complexity_distribution.iter().map(|b| b.count).sum();
        assert_eq!(bucketed, analysis.data.components.len());
        assert!(report
            .most_complex
            .windows(2)
            .all(|w| w[0].complexity >= w[1].complexity));
    }

    #[test]
    fn pipes_in_names_stay_inside_their_table_cell() {
        let analysis = analysis();
        let reporter = Reporter::default();
        let mut report = reporter.generate_report(&analysis, 1);
        report.most_complex[0].name = "a|b".to_string();
        report.most_complex[0].file = "src/x|y.js".to_string();

        let summary = reporter.generate_markdown_summary(&report, &reporter.render_diagrams(&analysis.data));
        let row = summary.lines().find(|line| line.starts_with("| a")).unwrap();
        assert!(row.starts_with("| a\\|b | "));
        assert!(row.contains("`src/x\\|y.js`"));
        assert_eq!(row.replace("\\|", "").matches('|').count(), 6);
    }

    #[test]
    fn exports_every_artifact() {
        let temp = TempDir::new().unwrap();
        let report = Reporter::default().generate_report(&analysis(), 5);
        let files = Reporter::default().export_report(&report, temp.path()).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["architecture.json", "system.mmd", "c4.mmd", "blocks.svg", "dataflow.svg", "summary.md", "report.html"]
        );

        let json = fs::read_to_string(temp.path().join("architecture.json")).unwrap();
        let parsed: ArchitectureData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report.architecture);

        let summary = fs::read_to_string(temp.path().join("summary.md")).unwrap();
        assert!(summary.contains("```mermaid\ngraph TB\n"));
        let html = fs::read_to_string(temp.path().join("report.html")).unwrap();
        assert!(html.contains("<svg"));
        assert!(!html.contains("diagram-error\">"));
    }

    #[test]
    fn failed_diagram_becomes_inline_error() {
        let temp = TempDir::new().unwrap();
        let mut layout = LayoutConfig::default();
        layout.force.width = 0;
        let reporter = Reporter::new(layout);
        let report = reporter.generate_report(&analysis(), 5);
        let files = reporter.export_report(&report, temp.path()).unwrap();

        assert!(!files.iter().any(|p| p.ends_with("dataflow.svg")));
        assert!(files.iter().any(|p| p.ends_with("blocks.svg")));
        let html = fs::read_to_string(temp.path().join("report.html")).unwrap();
        assert!(html.contains(r#"<div class="diagram-error">Diagram unavailable: drawing surface has no area (0x640)</div>"#));
    }

    #[test]
    fn json_only_export() {
        let temp = TempDir::new().unwrap();
        let path = Reporter::default().export_json(&analysis().data, temp.path()).unwrap();
        assert!(path.ends_with("architecture.json"));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
