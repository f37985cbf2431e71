use ndarray::Array2;

use crate::geometry::NodeType;
use crate::traits::Shape;
use crate::FloatNum;

/// Circular obstacle placed upstream of the domain centre.
pub struct Circle {
    x_c: FloatNum,
    y_c: FloatNum,
    r: FloatNum,
}

impl Circle {
    pub fn new(lx: usize, ly: usize) -> Self {
        let lx = lx as FloatNum;
        let ly = ly as FloatNum;
        Self {
            x_c: lx / 2. - 0.2 * lx,
            y_c: ly / 2.,
            r: 0.125 * ly,
        }
    }

    #[inline(always)]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        let dx = x as FloatNum - self.x_c;
        let dy = y as FloatNum - self.y_c;
        dx * dx + dy * dy <= self.r * self.r
    }
}

impl Shape for Circle {
    fn generate(&self, mask: &mut Array2<NodeType>) {
        for ((y, x), node) in mask.indexed_iter_mut() {
            if self.contains(x, y) {
                *node = NodeType::Wall;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_and_radius_follow_domain_size() {
        let c = Circle::new(40, 16);
        assert!(c.contains(12, 8));
        assert!(c.contains(14, 8));
        assert!(!c.contains(15, 8));
        assert!(!c.contains(12, 11));
    }
}
