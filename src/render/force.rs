//! Force-directed data-flow layout.
//!
//! The simulation is a plain tick-based integrator (link springs, inverse-square
//! repulsion, centering, collision) with an alpha that cools every tick.
//! Repulsion walks a Barnes-Hut quadtree and collision a uniform grid. A
//! [`ForceGraphView`] owns one simulation plus the surface it draws on, and is
//! the only thing callers talk to for zoom, pan, drag, filter and animation.

use super::spatial::{CollisionGrid, QuadTree, Source};
use super::{escape_xml, layer_colors, truncate_end};
use crate::config::ForceConfig;
use crate::error::RenderError;
use crate::model::{ArchitectureData, ComponentNode, Layer, RelationshipType};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 8.0;
const ZOOM_STEP: f64 = 1.2;
const DIMMED_OPACITY: f64 = 0.15;
const DRAG_ALPHA_TARGET: f64 = 0.3;

/// Role a component plays in the data flow, for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Input,
    Process,
    Output,
    Storage,
}

const STORAGE_HINTS: [&str; 10] = [
    "store", "storage", "repository", "repo", "database", "db", "cache", "model", "schema", "entity",
];
const INPUT_HINTS: [&str; 9] = [
    "input", "form", "request", "handler", "controller", "route", "listener", "upload", "reader",
];
const OUTPUT_HINTS: [&str; 9] = [
    "output", "render", "view", "response", "export", "writer", "print", "display", "report",
];

impl Category {
    pub const ALL: [Category; 4] = [Category::Input, Category::Process, Category::Output, Category::Storage];

    /// Naming hints first, then the layer.
    pub fn infer(component: &ComponentNode) -> Self {
        let name = component.name.to_lowercase();
        let hinted = |hints: &[&str]| hints.iter().any(|hint| name.contains(hint));

        if hinted(&STORAGE_HINTS) {
            Category::Storage
        } else if hinted(&INPUT_HINTS) {
            Category::Input
        } else if hinted(&OUTPUT_HINTS) {
            Category::Output
        } else {
            match component.layer {
                Layer::Data => Category::Storage,
                Layer::Presentation => Category::Output,
                _ => Category::Process,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Input => "input",
            Category::Process => "process",
            Category::Output => "output",
            Category::Storage => "storage",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Input => "#3b82f6",
            Category::Process => "#10b981",
            Category::Output => "#f97316",
            Category::Storage => "#8b5cf6",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    pub id: String,
    pub name: String,
    pub layer: Layer,
    pub category: Category,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Pinned position while dragged.
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimLink {
    pub source: usize,
    pub target: usize,
    pub relationship_type: RelationshipType,
    pub weight: u32,
}

pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    degree: Vec<usize>,
    config: ForceConfig,
    alpha: f64,
    alpha_target: f64,
    alpha_decay: f64,
    energy: Option<f64>,
    ticks: usize,
}

impl ForceSimulation {
    pub fn new(data: &ArchitectureData, config: &ForceConfig) -> Self {
        let (cx, cy) = (config.width as f64 / 2.0, config.height as f64 / 2.0);
        let golden_angle = PI * (3.0 - 5f64.sqrt());

        // Phyllotaxis start positions: deterministic and evenly spread.
        let nodes: Vec<SimNode> = data
            .components
            .iter()
            .enumerate()
            .map(|(i, component)| {
                let r = 10.0 * (0.5 + i as f64).sqrt();
                let angle = i as f64 * golden_angle;
                SimNode {
                    id: component.id.clone(),
                    name: component.name.clone(),
                    layer: component.layer,
                    category: Category::infer(component),
                    radius: Self::node_radius(component.complexity, config),
                    x: cx + r * angle.cos(),
                    y: cy + r * angle.sin(),
                    vx: 0.0,
                    vy: 0.0,
                    fx: None,
                    fy: None,
                }
            })
            .collect();

        let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();
        let links: Vec<SimLink> = data
            .relationships
            .iter()
            .filter_map(|r| {
                Some(SimLink {
                    source: *index.get(r.from.as_str())?,
                    target: *index.get(r.to.as_str())?,
                    relationship_type: r.relationship_type,
                    weight: r.weight,
                })
            })
            .collect();

        let mut degree = vec![0; nodes.len()];
        for link in &links {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }

        Self {
            nodes,
            links,
            degree,
            config: config.clone(),
            alpha: 1.0,
            alpha_target: 0.0,
            // cools from 1 to 0.001 in 300 ticks
            alpha_decay: 1.0 - 0.001f64.powf(1.0 / 300.0),
            energy: None,
            ticks: 0,
        }
    }

    /// `base + min(complexity * factor, max_bonus)`.
    pub fn node_radius(complexity: u32, config: &ForceConfig) -> f64 {
        config.base_radius + (complexity as f64 * config.radius_per_complexity).min(config.max_radius_bonus)
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[SimLink] {
        &self.links
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Mean squared speed after the last tick.
    pub fn energy(&self) -> Option<f64> {
        self.energy
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Topmost node under a point in simulation coordinates.
    pub fn node_at(&self, x: f64, y: f64) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, n)| (n.x - x).powi(2) + (n.y - y).powi(2) <= n.radius.powi(2))
            .map(|(i, _)| i)
    }

    /// Cooled below `alpha_min`, or moving less than the energy threshold,
    /// and nobody is holding a node.
    pub fn is_settled(&self) -> bool {
        if self.alpha_target > 0.0 {
            return false;
        }
        self.alpha < self.config.alpha_min || self.energy.is_some_and(|e| e < self.config.energy_threshold)
    }

    pub fn restart(&mut self) {
        self.alpha = 1.0;
        self.energy = None;
    }

    pub fn drag_start(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = Some(node.x);
            node.fy = Some(node.y);
            self.alpha_target = DRAG_ALPHA_TARGET;
            self.energy = None;
        }
    }

    pub fn drag_to(&mut self, index: usize, x: f64, y: f64) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = Some(x);
            node.fy = Some(y);
        }
    }

    pub fn drag_end(&mut self, index: usize) {
        self.alpha_target = 0.0;
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = None;
            node.fy = None;
        }
    }

    /// Advance one step and return the resulting energy.
    pub fn tick(&mut self) -> f64 {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;

        self.apply_links();
        self.apply_charge();
        self.apply_collision();

        let retain = 1.0 - self.config.velocity_decay;
        let mut energy = 0.0;
        let mut moving = 0usize;
        for node in &mut self.nodes {
            match (node.fx, node.fy) {
                (Some(fx), Some(fy)) => {
                    node.x = fx;
                    node.y = fy;
                    node.vx = 0.0;
                    node.vy = 0.0;
                }
                _ => {
                    node.vx *= retain;
                    node.vy *= retain;
                    node.x += node.vx;
                    node.y += node.vy;
                    energy += node.vx * node.vx + node.vy * node.vy;
                    moving += 1;
                }
            }
        }
        self.apply_center();

        let energy = if moving == 0 { 0.0 } else { energy / moving as f64 };
        self.energy = Some(energy);
        self.ticks += 1;
        energy
    }

    /// Tick until settled or `max_ticks`; returns the ticks taken.
    pub fn run_until_settled(&mut self) -> usize {
        let mut taken = 0;
        while taken < self.config.max_ticks {
            self.tick();
            taken += 1;
            if self.is_settled() {
                break;
            }
        }
        debug!(ticks = taken, alpha = self.alpha, "force layout settled");
        taken
    }

    fn apply_links(&mut self) {
        let distance = self.config.link_distance;
        let strength = self.config.link_strength;

        for link in &self.links {
            let (s, t) = (link.source, link.target);
            if s == t {
                continue;
            }
            let (source, target) = (&self.nodes[s], &self.nodes[t]);
            let mut dx = target.x + target.vx - source.x - source.vx;
            let mut dy = target.y + target.vy - source.y - source.vy;
            if dx == 0.0 && dy == 0.0 {
                dx = jiggle(s * 31 + t);
                dy = jiggle(t * 17 + s);
            }
            let length = (dx * dx + dy * dy).sqrt();
            let pull = (length - distance) / length * self.alpha * strength;
            dx *= pull;
            dy *= pull;

            let bias = self.degree[s] as f64 / (self.degree[s] + self.degree[t]) as f64;
            self.nodes[t].vx -= dx * bias;
            self.nodes[t].vy -= dy * bias;
            self.nodes[s].vx += dx * (1.0 - bias);
            self.nodes[s].vy += dy * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self) {
        let impulses = self.charge_impulses();
        for (node, (ix, iy)) in self.nodes.iter_mut().zip(impulses) {
            node.vx += ix;
            node.vy += iy;
        }
    }

    /// Many-body repulsion, with distant groups folded into their centroid.
    fn charge_impulses(&self) -> Vec<(f64, f64)> {
        let strength = self.config.charge_strength * self.alpha;
        let theta2 = self.config.theta * self.config.theta;
        let points: Vec<(f64, f64)> = self.nodes.iter().map(|n| (n.x, n.y)).collect();
        let tree = QuadTree::new(&points);

        (0..points.len())
            .map(|i| {
                let (x, y) = points[i];
                let mut impulse = (0.0, 0.0);
                tree.visit(i, &points, theta2, |source| {
                    let (mut dx, mut dy, mass, j) = match source {
                        Source::Point(j) => (points[j].0 - x, points[j].1 - y, 1.0, j),
                        Source::Cluster { x: cx, y: cy, mass } => (cx - x, cy - y, mass, i),
                    };
                    if dx == 0.0 && dy == 0.0 {
                        dx = jiggle(i * 7 + j);
                        dy = jiggle(j * 13 + i);
                    }
                    let mut l2 = dx * dx + dy * dy;
                    if l2 < 1.0 {
                        l2 = l2.sqrt();
                    }
                    let w = strength * mass / l2;
                    impulse.0 += dx * w;
                    impulse.1 += dy * w;
                });
                impulse
            })
            .collect()
    }

    fn apply_collision(&mut self) {
        let padding = self.config.collision_padding;
        let widest = self.nodes.iter().map(|n| n.radius).fold(0.0, f64::max);
        let predicted: Vec<(f64, f64)> = self.nodes.iter().map(|n| (n.x + n.vx, n.y + n.vy)).collect();
        let grid = CollisionGrid::new(&predicted, 2.0 * widest + padding);

        for i in 0..self.nodes.len() {
            for j in grid.neighbours_after(i, predicted[i]) {
                let (a, b) = (&self.nodes[i], &self.nodes[j]);
                let reach = a.radius + b.radius + padding;
                let mut dx = (a.x + a.vx) - (b.x + b.vx);
                let mut dy = (a.y + a.vy) - (b.y + b.vy);
                let mut l2 = dx * dx + dy * dy;
                if l2 >= reach * reach {
                    continue;
                }
                if l2 == 0.0 {
                    dx = jiggle(i * 3 + j);
                    dy = jiggle(j * 5 + i);
                    l2 = dx * dx + dy * dy;
                }

                let length = l2.sqrt();
                let push = (reach - length) / length * 0.5;
                let (ra, rb) = (a.radius * a.radius, b.radius * b.radius);
                let share = rb / (ra + rb);

                self.nodes[i].vx += dx * push * share;
                self.nodes[i].vy += dy * push * share;
                self.nodes[j].vx -= dx * push * (1.0 - share);
                self.nodes[j].vy -= dy * push * (1.0 - share);
            }
        }
    }

    fn apply_center(&mut self) {
        let free: Vec<usize> = (0..self.nodes.len()).filter(|&i| self.nodes[i].fx.is_none()).collect();
        if free.is_empty() {
            return;
        }
        let (cx, cy) = (self.config.width as f64 / 2.0, self.config.height as f64 / 2.0);
        let mean_x = free.iter().map(|&i| self.nodes[i].x).sum::<f64>() / free.len() as f64;
        let mean_y = free.iter().map(|&i| self.nodes[i].y).sum::<f64>() / free.len() as f64;
        let shift_x = (mean_x - cx) * self.config.center_strength;
        let shift_y = (mean_y - cy) * self.config.center_strength;

        for i in free {
            self.nodes[i].x -= shift_x;
            self.nodes[i].y -= shift_y;
        }
    }
}

/// Tiny deterministic offset that separates coincident points.
fn jiggle(seed: usize) -> f64 {
    let noise = ((seed as f64 + 1.0) * 12.9898).sin() * 43_758.545_3;
    (noise.fract() - 0.5) * 1e-6
}

/// Zoom and pan, applied to the whole drawing and never to the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { k: 1.0, x: 0.0, y: 0.0 }
    }
}

impl ViewTransform {
    pub fn apply(&self, point: (f64, f64)) -> (f64, f64) {
        (point.0 * self.k + self.x, point.1 * self.k + self.y)
    }

    pub fn invert(&self, point: (f64, f64)) -> (f64, f64) {
        ((point.0 - self.x) / self.k, (point.1 - self.y) / self.k)
    }

    /// Scale by `factor`, keeping the point under `anchor` fixed on screen.
    pub fn zoom_at(&mut self, factor: f64, anchor: (f64, f64)) {
        let fixed = self.invert(anchor);
        self.k = (self.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.x = anchor.0 - fixed.0 * self.k;
        self.y = anchor.1 - fixed.1 * self.k;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    pub fn to_svg(&self) -> String {
        format!("translate({} {}) scale({})", self.x, self.y, self.k)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameNode {
    pub id: String,
    pub label: String,
    pub category: Category,
    pub layer: Layer,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub opacity: f64,
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameLink {
    pub source: String,
    pub target: String,
    pub relationship_type: RelationshipType,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub opacity: f64,
}

/// Everything a surface needs to draw one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub transform: ViewTransform,
    pub filter: Option<Category>,
    pub tick: usize,
    pub alpha: f64,
    pub nodes: Vec<FrameNode>,
    pub links: Vec<FrameLink>,
}

pub trait DrawingSurface: Send {
    fn size(&self) -> (u32, u32);
    fn draw(&mut self, frame: &Frame) -> Result<(), RenderError>;
}

/// Keeps the latest frame and turns it into a static SVG on request.
#[derive(Debug, Clone)]
pub struct SvgSurface {
    width: u32,
    height: u32,
    last: Option<Frame>,
    frames_drawn: usize,
}

impl SvgSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            last: None,
            frames_drawn: 0,
        }
    }

    pub fn frames_drawn(&self) -> usize {
        self.frames_drawn
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    pub fn to_svg(&self) -> Result<String, RenderError> {
        let mut out = String::new();
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img">"#,
            w = self.width,
            h = self.height
        )?;
        writeln!(
            out,
            "<style>.link {{ stroke: #94a3b8; stroke-width: 1.5; }} .node text {{ font: 11px sans-serif; fill: #1f2937; }} .node circle {{ stroke-width: 2; }}</style>"
        )?;

        let Some(frame) = &self.last else {
            writeln!(out, "</svg>")?;
            return Ok(out);
        };

        writeln!(out, r#"<g class="viewport" transform="{}">"#, frame.transform.to_svg())?;
        writeln!(out, r#"<g class="links">"#)?;
        for link in &frame.links {
            writeln!(
                out,
                r#"<line class="link {}" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke-opacity="{}"/>"#,
                link.relationship_type, link.x1, link.y1, link.x2, link.y2, link.opacity
            )?;
        }
        writeln!(out, "</g>")?;

        writeln!(out, r#"<g class="nodes">"#)?;
        for node in &frame.nodes {
            let (_, stroke) = layer_colors(node.layer);
            writeln!(
                out,
                r#"<g class="node {}" data-id="{}" transform="translate({:.1} {:.1})" opacity="{}"><circle r="{:.1}" fill="{}" stroke="{}"/><text text-anchor="middle" dy="{:.1}">{}</text></g>"#,
                node.category.as_str(),
                escape_xml(&node.id),
                node.x,
                node.y,
                node.opacity,
                node.radius,
                node.category.color(),
                stroke,
                node.radius + 12.0,
                escape_xml(&node.label)
            )?;
        }
        writeln!(out, "</g>")?;
        writeln!(out, "</g>")?;
        writeln!(out, "</svg>")?;
        Ok(out)
    }
}

impl DrawingSurface for SvgSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.last = Some(frame.clone());
        self.frames_drawn += 1;
        Ok(())
    }
}

pub type TickCallback = Box<dyn FnMut(&Frame) + Send>;

enum Interaction {
    Idle,
    Dragging(usize),
    Panning { last: (f64, f64) },
}

/// Control object for one live force layout.
pub struct ForceGraphView<S: DrawingSurface> {
    simulation: ForceSimulation,
    surface: S,
    transform: ViewTransform,
    filter: Option<Category>,
    callbacks: Vec<TickCallback>,
    interaction: Interaction,
}

impl<S: DrawingSurface> ForceGraphView<S> {
    pub fn new(simulation: ForceSimulation, surface: S) -> Result<Self, RenderError> {
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptySurface { width, height });
        }
        Ok(Self {
            simulation,
            surface,
            transform: ViewTransform::default(),
            filter: None,
            callbacks: Vec::new(),
            interaction: Interaction::Idle,
        })
    }

    pub fn simulation(&self) -> &ForceSimulation {
        &self.simulation
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn filter(&self) -> Option<Category> {
        self.filter
    }

    pub fn is_settled(&self) -> bool {
        self.simulation.is_settled()
    }

    fn center(&self) -> (f64, f64) {
        let (w, h) = self.surface.size();
        (w as f64 / 2.0, h as f64 / 2.0)
    }

    pub fn zoom_in(&mut self) -> Result<(), RenderError> {
        let center = self.center();
        self.transform.zoom_at(ZOOM_STEP, center);
        self.redraw()
    }

    pub fn zoom_out(&mut self) -> Result<(), RenderError> {
        let center = self.center();
        self.transform.zoom_at(1.0 / ZOOM_STEP, center);
        self.redraw()
    }

    pub fn reset_zoom(&mut self) -> Result<(), RenderError> {
        self.transform = ViewTransform::default();
        self.redraw()
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> Result<(), RenderError> {
        self.transform.pan(dx, dy);
        self.redraw()
    }

    /// Wheel zoom around the pointer; positive `delta_y` zooms out.
    pub fn wheel(&mut self, delta_y: f64, x: f64, y: f64) -> Result<(), RenderError> {
        self.transform.zoom_at(2f64.powf(-delta_y * 0.002), (x, y));
        self.redraw()
    }

    /// Press on a node to drag it, anywhere else to pan. Screen coordinates.
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        let (sx, sy) = self.transform.invert((x, y));
        self.interaction = match self.simulation.node_at(sx, sy) {
            Some(index) => {
                self.simulation.drag_start(index);
                Interaction::Dragging(index)
            }
            None => Interaction::Panning { last: (x, y) },
        };
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<(), RenderError> {
        match &mut self.interaction {
            Interaction::Dragging(index) => {
                let (sx, sy) = self.transform.invert((x, y));
                self.simulation.drag_to(*index, sx, sy);
            }
            Interaction::Panning { last } => {
                let (dx, dy) = (x - last.0, y - last.1);
                *last = (x, y);
                self.transform.pan(dx, dy);
            }
            Interaction::Idle => return Ok(()),
        }
        self.redraw()
    }

    pub fn pointer_up(&mut self) {
        if let Interaction::Dragging(index) = self.interaction {
            self.simulation.drag_end(index);
        }
        self.interaction = Interaction::Idle;
    }

    pub fn restart(&mut self) {
        self.simulation.restart();
    }

    pub fn set_filter(&mut self, filter: Option<Category>) -> Result<(), RenderError> {
        self.filter = filter;
        self.redraw()
    }

    pub fn on_tick(&mut self, callback: impl FnMut(&Frame) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// One simulation step, drawn. Returns whether the layout has settled.
    pub fn tick(&mut self) -> Result<bool, RenderError> {
        self.simulation.tick();
        let frame = self.frame();
        self.surface.draw(&frame)?;
        for callback in &mut self.callbacks {
            callback(&frame);
        }
        Ok(self.simulation.is_settled())
    }

    pub fn run_until_settled(&mut self) -> Result<usize, RenderError> {
        let max_ticks = self.simulation.config.max_ticks;
        let mut taken = 0;
        while taken < max_ticks {
            taken += 1;
            if self.tick()? {
                break;
            }
        }
        Ok(taken)
    }

    fn redraw(&mut self) -> Result<(), RenderError> {
        let frame = self.frame();
        self.surface.draw(&frame)
    }

    pub fn frame(&self) -> Frame {
        let (width, height) = self.surface.size();
        let nodes = &self.simulation.nodes;
        let matches = |category: Category| self.filter.map_or(true, |f| f == category);

        Frame {
            width,
            height,
            transform: self.transform,
            filter: self.filter,
            tick: self.simulation.ticks,
            alpha: self.simulation.alpha,
            nodes: nodes
                .iter()
                .map(|n| FrameNode {
                    id: n.id.clone(),
                    label: truncate_end(&n.name, 20),
                    category: n.category,
                    layer: n.layer,
                    x: n.x,
                    y: n.y,
                    radius: n.radius,
                    opacity: if matches(n.category) { 1.0 } else { DIMMED_OPACITY },
                    pinned: n.fx.is_some(),
                })
                .collect(),
            links: self
                .simulation
                .links
                .iter()
                .map(|l| {
                    let (s, t) = (&nodes[l.source], &nodes[l.target]);
                    let visible = matches(s.category) || matches(t.category);
                    FrameLink {
                        source: s.id.clone(),
                        target: t.id.clone(),
                        relationship_type: l.relationship_type,
                        x1: s.x,
                        y1: s.y,
                        x2: t.x,
                        y2: t.y,
                        opacity: if visible { 0.6 } else { DIMMED_OPACITY },
                    }
                })
                .collect(),
        }
    }
}

impl<S: DrawingSurface + 'static> ForceGraphView<S> {
    /// Tick on a tokio interval until the handle is cancelled or dropped.
    ///
    /// A settled layout idles; `restart` or a drag on the shared view wakes it.
    pub fn animate(view: Arc<Mutex<Self>>, interval: Duration) -> Result<AnimationHandle, RenderError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RenderError::NoRuntime)?;

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !step(&view) {
                    break;
                }
            }
        });

        Ok(AnimationHandle { task: Some(task) })
    }
}

/// One animation step; false ends the loop.
fn step<S: DrawingSurface>(view: &Mutex<ForceGraphView<S>>) -> bool {
    let Ok(mut view) = view.lock() else {
        warn!("force view lock poisoned, stopping animation");
        return false;
    };
    if view.is_settled() {
        return true;
    }
    match view.tick() {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "force view failed to draw, stopping animation");
            false
        }
    }
}

/// Owns a running animation loop; dropping it stops the loop.
pub struct AnimationHandle {
    task: Option<JoinHandle<()>>,
}

impl AnimationHandle {
    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for AnimationHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Builds simulations and views from a snapshot.
pub struct ForceGraphRenderer {
    config: ForceConfig,
}

impl ForceGraphRenderer {
    pub fn new(config: ForceConfig) -> Self {
        Self { config }
    }

    pub fn simulation(&self, data: &ArchitectureData) -> ForceSimulation {
        ForceSimulation::new(data, &self.config)
    }

    /// A live view centred on `surface`.
    pub fn view<S: DrawingSurface>(&self, data: &ArchitectureData, surface: S) -> Result<ForceGraphView<S>, RenderError> {
        let (width, height) = surface.size();
        let config = ForceConfig {
            width,
            height,
            ..self.config.clone()
        };
        ForceGraphView::new(ForceSimulation::new(data, &config), surface)
    }

    /// Settle the layout offscreen and return the final frame as SVG.
    pub fn render_svg(&self, data: &ArchitectureData) -> Result<String, RenderError> {
        let mut view = self.view(data, SvgSurface::new(self.config.width, self.config.height))?;
        let ticks = view.run_until_settled()?;
        debug!(ticks, nodes = data.components.len(), "rendered force layout snapshot");
        view.surface().to_svg()
    }
}
