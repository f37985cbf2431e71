use ndarray::Array2;

use crate::grid::Axis;
use crate::FloatNum;

/// Macroscopic fields, co-indexed with the geometry's node map.
#[derive(Clone, Debug, PartialEq)]
pub struct Fields {
    pub density: Array2<FloatNum>,
    pub ux: Array2<FloatNum>,
    pub uy: Array2<FloatNum>,
}

impl Fields {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Fields {
            density: Array2::zeros(shape),
            ux: Array2::zeros(shape),
            uy: Array2::zeros(shape),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.density.dim()
    }

    /// Velocity component along `axis`.
    pub fn velocity(&self, axis: Axis) -> &Array2<FloatNum> {
        match axis {
            Axis::X => &self.ux,
            Axis::Y => &self.uy,
        }
    }

    pub fn speed(&self) -> Array2<FloatNum> {
        ndarray::Zip::from(&self.ux)
            .and(&self.uy)
            .map_collect(|&ux, &uy| (ux * ux + uy * uy).sqrt())
    }
}

/// Selector for a single macroscopic quantity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Component {
    Density,
    Ux,
    Uy,
    Speed,
}

impl Component {
    /// Numeric code used across the C ABI.
    pub fn from_code(code: i32) -> Option<Component> {
        match code {
            0 => Some(Component::Density),
            1 => Some(Component::Ux),
            2 => Some(Component::Uy),
            3 => Some(Component::Speed),
            _ => None,
        }
    }
}

impl Fields {
    /// Row-major copy of one quantity.
    pub fn to_vec(&self, component: Component) -> Vec<FloatNum> {
        match component {
            Component::Density => self.density.iter().copied().collect(),
            Component::Ux => self.ux.iter().copied().collect(),
            Component::Uy => self.uy.iter().copied().collect(),
            Component::Speed => self.speed().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_combines_both_components() {
        let mut fields = Fields::zeros((2, 3));
        fields.ux[[1, 2]] = 3.;
        fields.uy[[1, 2]] = 4.;
        assert_eq!(fields.speed()[[1, 2]], 5.);
        assert_eq!(fields.velocity(Axis::Y)[[1, 2]], 4.);
        assert_eq!(fields.to_vec(Component::Speed)[5], 5.);
        assert_eq!(fields.to_vec(Component::Ux).len(), 6);
    }

    #[test]
    fn component_codes() {
        assert_eq!(Component::from_code(0), Some(Component::Density));
        assert_eq!(Component::from_code(3), Some(Component::Speed));
        assert_eq!(Component::from_code(4), None);
    }
}
