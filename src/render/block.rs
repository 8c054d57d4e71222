use super::{escape_xml, layer_colors, truncate_end, truncate_start};
use crate::config::BlockLayoutConfig;
use crate::error::RenderError;
use crate::model::{ArchitectureData, ComponentNode, Layer};
use std::collections::HashMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockPosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BlockPosition {
    fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerBand {
    pub layer: Layer,
    pub label: String,
    pub y: f64,
    pub height: f64,
    pub columns: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub width: f64,
    pub height: f64,
    pub bands: Vec<LayerBand>,
    pub blocks: Vec<BlockPosition>,
}

impl BlockLayout {
    pub fn block(&self, id: &str) -> Option<&BlockPosition> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgOptions {
    /// Viewport scale in percent, clamped to 10–400.
    pub zoom_percent: u32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self { zoom_percent: 100 }
    }
}

/// Static SVG with one block per component, banded by layer.
pub struct BlockLayoutRenderer {
    config: BlockLayoutConfig,
}

const STYLE: &str = r#"
    .band-label { font: 600 15px sans-serif; fill: #374151; }
    .block rect.body { stroke-width: 1.5; rx: 8; }
    .block .name { font: 600 13px sans-serif; fill: #111827; }
    .block .kind { font: italic 11px sans-serif; fill: #4b5563; }
    .block .path { font: 10px monospace; fill: #6b7280; }
    .block .stats { font: 10px sans-serif; fill: #374151; }
    .connector { fill: none; stroke: #9ca3af; stroke-width: 1.5; opacity: 0.7; }
    .connector.extends, .connector.implements { stroke-dasharray: 5 3; }
    .connector.configures { stroke: #78716c; stroke-dasharray: 2 2; }
"#;

impl BlockLayoutRenderer {
    pub fn new(config: BlockLayoutConfig) -> Self {
        Self { config }
    }

    /// Grid per layer band: `ceil(sqrt(n))` columns, as many rows as needed.
    pub fn layout(&self, data: &ArchitectureData) -> BlockLayout {
        let c = &self.config;
        let mut bands = Vec::new();
        let mut blocks = Vec::new();
        let mut y = c.margin;
        let mut widest = 0.0f64;

        for boundary in &data.boundaries {
            let members: Vec<&ComponentNode> = boundary.components.iter().filter_map(|id| data.component(id)).collect();
            if members.is_empty() {
                continue;
            }

            let columns = (members.len() as f64).sqrt().ceil() as usize;
            let rows = members.len().div_ceil(columns);
            let layer = members[0].layer;

            for (i, component) in members.iter().enumerate() {
                let (row, column) = (i / columns, i % columns);
                blocks.push(BlockPosition {
                    id: component.id.clone(),
                    x: c.margin + column as f64 * (c.block_width + c.gap),
                    y: y + c.band_header + row as f64 * (c.block_height + c.gap),
                    width: c.block_width,
                    height: c.block_height,
                });
            }

            let height = c.band_header + rows as f64 * (c.block_height + c.gap);
            widest = widest.max(columns as f64 * (c.block_width + c.gap) - c.gap);
            bands.push(LayerBand {
                layer,
                label: boundary.name.clone(),
                y,
                height,
                columns,
                rows,
            });
            y += height + c.gap;
        }

        BlockLayout {
            width: c.canvas_width.max(widest + 2.0 * c.margin),
            height: y + c.margin,
            bands,
            blocks,
        }
    }

    pub fn render_svg(&self, data: &ArchitectureData, options: SvgOptions) -> Result<String, RenderError> {
        let layout = self.layout(data);
        let scale = options.zoom_percent.clamp(10, 400) as f64 / 100.0;
        let mut out = String::new();

        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}" role="img">"#,
            w = layout.width * scale,
            h = layout.height * scale
        )?;
        writeln!(out, "<style>{}</style>", STYLE)?;
        writeln!(out, r#"<g class="viewport" transform="scale({})">"#, scale)?;

        for band in &layout.bands {
            let (fill, stroke) = layer_colors(band.layer);
            writeln!(
                out,
                r#"<g class="band band-{layer}"><rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}" fill-opacity="0.35" stroke="{stroke}" stroke-opacity="0.4" rx="12"/><text class="band-label" x="{tx}" y="{ty}">{label}</text></g>"#,
                layer = band.layer,
                x = self.config.margin / 2.0,
                y = band.y,
                w = layout.width - self.config.margin,
                h = band.height,
                fill = fill,
                stroke = stroke,
                tx = self.config.margin,
                ty = band.y + self.config.band_header * 0.65,
                label = escape_xml(&band.label)
            )?;
        }

        let positions: HashMap<&str, &BlockPosition> = layout.blocks.iter().map(|b| (b.id.as_str(), b)).collect();
        writeln!(out, r#"<g class="connectors">"#)?;
        for relationship in &data.relationships {
            let (Some(from), Some(to)) = (positions.get(relationship.from.as_str()), positions.get(relationship.to.as_str()))
            else {
                continue;
            };
            writeln!(
                out,
                r#"<path class="connector {}" d="{}"/>"#,
                relationship.relationship_type,
                connector_path(from, to)
            )?;
        }
        writeln!(out, "</g>")?;

        for block in &layout.blocks {
            if let Some(component) = data.component(&block.id) {
                self.write_block(&mut out, block, component)?;
            }
        }

        writeln!(out, "</g>")?;
        writeln!(out, "</svg>")?;
        Ok(out)
    }

    fn write_block(&self, out: &mut String, block: &BlockPosition, component: &ComponentNode) -> Result<(), RenderError> {
        let (fill, stroke) = layer_colors(component.layer);
        let level = component.complexity_level();
        let (x, y) = (block.x, block.y);

        writeln!(
            out,
            r#"<g class="block" data-id="{}" transform="translate({} {})">"#,
            escape_xml(&component.id),
            x,
            y
        )?;
        writeln!(
            out,
            r#"<rect class="body" width="{}" height="{}" fill="{}" stroke="{}"/>"#,
            block.width, block.height, fill, stroke
        )?;
        writeln!(
            out,
            r#"<circle class="complexity {}" cx="{}" cy="14" r="6" fill="{}"/>"#,
            level.as_str(),
            block.width - 14.0,
            level.color()
        )?;
        writeln!(out, r#"<text class="name" x="10" y="22">{}</text>"#, escape_xml(&truncate_end(&component.name, 24)))?;
        writeln!(out, r#"<text class="kind" x="10" y="40">{}</text>"#, component.component_type)?;
        writeln!(out, r#"<text class="path" x="10" y="58">{}</text>"#, escape_xml(&truncate_start(&component.file, 32)))?;
        writeln!(
            out,
            r#"<text class="stats" x="10" y="{}">{} lines · complexity {} · {} deps</text>"#,
            block.height - 14.0,
            component.lines,
            component.complexity,
            component.dependencies.len()
        )?;
        writeln!(out, "</g>")?;
        Ok(())
    }
}

/// Cubic curve from the bottom of one block to the top of another, or
/// between vertical edges when both sit on the same row.
fn connector_path(from: &BlockPosition, to: &BlockPosition) -> String {
    if (from.y - to.y).abs() < f64::EPSILON {
        let (sx, ex) = if from.x < to.x {
            (from.x + from.width, to.x)
        } else {
            (from.x, to.x + to.width)
        };
        let sy = from.y + from.height / 2.0;
        let lift = (ex - sx).abs().max(40.0) / 2.0;
        return format!(
            "M {sx} {sy} C {sx} {cy}, {ex} {cy}, {ex} {sy}",
            sx = sx,
            sy = sy,
            ex = ex,
            cy = sy - lift
        );
    }

    let (sx, ex) = (from.center_x(), to.center_x());
    let (sy, ey) = if from.y < to.y {
        (from.y + from.height, to.y)
    } else {
        (from.y, to.y + to.height)
    };
    let mid = (sy + ey) / 2.0;
    format!("M {} {} C {} {}, {} {}, {} {}", sx, sy, sx, mid, ex, mid, ex, ey)
}
