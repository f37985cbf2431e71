use ndarray::Array2;

use crate::geometry::NodeType;
use crate::grid::Axis;
use crate::traits::Shape;

/// A full lattice line normal to `normal`, e.g. a channel wall or a lid.
pub struct Plane {
    normal: Axis,
    at: usize,
    node: NodeType,
}

impl Plane {
    pub fn new(normal: Axis, at: usize, node: NodeType) -> Plane {
        Plane { normal, at, node }
    }
}

impl Shape for Plane {
    fn generate(&self, mask: &mut Array2<NodeType>) {
        match self.normal {
            Axis::X => mask.column_mut(self.at).fill(self.node),
            Axis::Y => mask.row_mut(self.at).fill(self.node),
        }
    }
}
