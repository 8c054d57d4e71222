//! Diagram renderers. Each one reads a finished [`ArchitectureData`] and never
//! changes it.
//!
//! [`ArchitectureData`]: crate::model::ArchitectureData

mod block;
mod force;
mod spatial;
mod text;

pub use block::{BlockLayout, BlockLayoutRenderer, BlockPosition, LayerBand, SvgOptions};
pub use force::{
    AnimationHandle, Category, DrawingSurface, ForceGraphRenderer, ForceGraphView, ForceSimulation, Frame,
    FrameLink, FrameNode, SimLink, SimNode, SvgSurface, TickCallback, ViewTransform,
};
pub use text::TextDiagramRenderer;

use crate::error::RenderError;
use crate::model::{ComplexityLevel, ComponentType, Layer};
use tracing::warn;

/// A rendered diagram, or the error that replaced it.
///
/// A failed diagram shows its error where the drawing would have been; the
/// data it was drawn from stays valid.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramView<T> {
    Ready(T),
    Failed(RenderError),
}

impl<T> DiagramView<T> {
    pub fn capture(name: &str, result: Result<T, RenderError>) -> Self {
        match result {
            Ok(diagram) => DiagramView::Ready(diagram),
            Err(e) => {
                warn!(diagram = name, error = %e, "diagram failed to render");
                DiagramView::Failed(e)
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            DiagramView::Ready(diagram) => Some(diagram),
            DiagramView::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RenderError> {
        match self {
            DiagramView::Ready(_) => None,
            DiagramView::Failed(e) => Some(e),
        }
    }
}

pub(crate) fn type_icon(component_type: ComponentType) -> &'static str {
    match component_type {
        ComponentType::Module => "📦",
        ComponentType::Class => "🏛️",
        ComponentType::Function => "⚙️",
        ComponentType::Service => "🔧",
        ComponentType::Component => "🧩",
        ComponentType::Config => "📋",
        ComponentType::External => "🌐",
    }
}

pub(crate) fn complexity_marker(level: ComplexityLevel) -> &'static str {
    match level {
        ComplexityLevel::Low => "🟢",
        ComplexityLevel::Medium => "🟡",
        ComplexityLevel::High => "🔴",
    }
}

/// Fill and stroke per layer, shared by every drawing.
pub(crate) fn layer_colors(layer: Layer) -> (&'static str, &'static str) {
    match layer {
        Layer::Presentation => ("#dbeafe", "#2563eb"),
        Layer::Business => ("#dcfce7", "#16a34a"),
        Layer::Data => ("#fef3c7", "#d97706"),
        Layer::Infrastructure => ("#ede9fe", "#7c3aed"),
        Layer::External => ("#f3f4f6", "#6b7280"),
    }
}

pub(crate) fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Shorten to `max` characters, keeping the start.
pub(crate) fn truncate_end(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Shorten to `max` characters, keeping the end (file paths).
pub(crate) fn truncate_start(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let kept: String = text.chars().skip(count - max.saturating_sub(1)).collect();
    format!("…{}", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn truncation_keeps_requested_end() {
        assert_eq!(truncate_end("abcdef", 4), "abc…");
        assert_eq!(truncate_start("src/deep/file.ts", 8), "…file.ts");
        assert_eq!(truncate_start("short", 8), "short");
    }

    #[test]
    fn failed_diagram_keeps_error() {
        let view: DiagramView<String> =
            DiagramView::capture("component", Err(RenderError::UnknownBoundary("nope".into())));
        assert!(view.ready().is_none());
        assert_eq!(view.error(), Some(&RenderError::UnknownBoundary("nope".into())));
    }
}
