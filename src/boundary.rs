//! Display grouping of components by architectural layer.

use crate::model::{BoundaryType, ComponentNode, Layer, SystemBoundary};

/// One container boundary per non-empty layer, in canonical layer order.
///
/// Every component lands in exactly one boundary; relationships are left alone.
pub fn group_by_layer(components: &[ComponentNode]) -> Vec<SystemBoundary> {
    Layer::ALL
        .iter()
        .filter_map(|layer| {
            let members: Vec<String> = components
                .iter()
                .filter(|c| c.layer == *layer)
                .map(|c| c.id.clone())
                .collect();
            if members.is_empty() {
                return None;
            }
            Some(SystemBoundary {
                id: layer.as_str().to_string(),
                name: layer.display_name().to_string(),
                components: members,
                boundary_type: BoundaryType::Container,
            })
        })
        .collect()
}
