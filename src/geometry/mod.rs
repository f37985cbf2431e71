//! Simulation domain: lattice, node map and closed-form reference values.

mod circle;
mod plane;

pub use circle::Circle;
pub use plane::Plane;

use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use thiserror::Error;

use crate::config::Configuration;
use crate::context::Context;
use crate::distribution::D2Q9;
use crate::grid::{Axis, StructuredRectangular};
use crate::traits::{Distribution, Shape};
use crate::FloatNum;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("lattice dimensions must be positive, got {nx}x{ny}")]
    InvalidDimensions { nx: i64, ny: i64 },
    #[error("unknown geometry `{0}` (expected channel, cylinder or cavity)")]
    UnknownKind(String),
    #[error("a {nx}x{ny} lattice is too large to allocate")]
    TooLarge { nx: i64, ny: i64 },
    #[error("{kind} geometry needs at least {min} nodes across, got {got}")]
    TooNarrow {
        kind: &'static str,
        min: usize,
        got: usize,
    },
}

/// A field's shape disagrees with the node map.
#[derive(Debug, Error, PartialEq)]
#[error("field shape {found:?} does not match geometry shape {expected:?}")]
pub struct ShapeMismatch {
    pub expected: (usize, usize),
    pub found: (usize, usize),
}

/// Per-node classification.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum NodeType {
    Fluid,
    /// Stationary no-slip wall.
    Wall,
    /// Wall moving with a prescribed velocity.
    Velocity,
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum GeometryKind {
    /// Poiseuille channel between two walls.
    Channel,
    /// Channel with a circular obstacle.
    Cylinder,
    /// Lid-driven cavity.
    Cavity,
}

impl GeometryKind {
    pub fn from_name(name: &str) -> Result<Self, GeometryError> {
        match name {
            "channel" | "poiseuille" => Ok(GeometryKind::Channel),
            "cylinder" => Ok(GeometryKind::Cylinder),
            "cavity" => Ok(GeometryKind::Cavity),
            other => Err(GeometryError::UnknownKind(other.to_owned())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GeometryKind::Channel => "channel",
            GeometryKind::Cylinder => "cylinder",
            GeometryKind::Cavity => "cavity",
        }
    }
}

/// Bytes needed for `q` populations per node on a `nx` x `ny` lattice, or
/// `None` when that exceeds what a single allocation can address.
pub fn population_bytes(nx: usize, ny: usize, q: usize) -> Option<usize> {
    nx.checked_mul(ny)?
        .checked_mul(q)?
        .checked_mul(std::mem::size_of::<FloatNum>())
        .filter(|&bytes| bytes <= isize::MAX as usize)
}

#[derive(Clone, Debug)]
pub struct Geometry {
    kind: GeometryKind,
    grid: StructuredRectangular,
    mask: Array2<NodeType>,
    flow_axis: Axis,
    maxv: FloatNum,
    chan_width: usize,
    fluid_nodes: usize,
}

impl Geometry {
    pub fn build(config: &Configuration) -> Result<Self, GeometryError> {
        let (nx, ny) = (config.lat_nx(), config.lat_ny());
        if nx <= 0 || ny <= 0 {
            return Err(GeometryError::InvalidDimensions { nx, ny });
        }
        let (w, h) = usize::try_from(nx)
            .ok()
            .zip(usize::try_from(ny).ok())
            .filter(|&(w, h)| population_bytes(w, h, D2Q9::size()).is_some())
            .ok_or(GeometryError::TooLarge { nx, ny })?;
        let kind = GeometryKind::from_name(config.geometry_kind())?;
        let grid = StructuredRectangular::new(w, h);

        let flow_axis = match kind {
            GeometryKind::Channel if !config.horizontal() => Axis::Y,
            _ => Axis::X,
        };
        // Walls sit on the first and last node across the flow.
        let across = match flow_axis {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        };
        let min = if kind == GeometryKind::Cylinder { 8 } else { 3 };
        let got = grid.len(across);
        if got < min {
            return Err(GeometryError::TooNarrow {
                kind: kind.name(),
                min,
                got,
            });
        }

        let mut shapes: Vec<Box<dyn Shape>> = Vec::new();
        match kind {
            GeometryKind::Channel => {
                shapes.push(Box::new(Plane::new(across, 0, NodeType::Wall)));
                shapes.push(Box::new(Plane::new(across, got - 1, NodeType::Wall)));
            }
            GeometryKind::Cylinder => {
                shapes.push(Box::new(Plane::new(Axis::Y, 0, NodeType::Wall)));
                shapes.push(Box::new(Plane::new(Axis::Y, grid.y - 1, NodeType::Wall)));
                shapes.push(Box::new(Circle::new(grid.x, grid.y)));
            }
            GeometryKind::Cavity => {
                if grid.x < 3 {
                    return Err(GeometryError::TooNarrow {
                        kind: kind.name(),
                        min: 3,
                        got: grid.x,
                    });
                }
                shapes.push(Box::new(Plane::new(Axis::Y, grid.y - 1, NodeType::Velocity)));
                shapes.push(Box::new(Plane::new(Axis::Y, 0, NodeType::Wall)));
                shapes.push(Box::new(Plane::new(Axis::X, 0, NodeType::Wall)));
                shapes.push(Box::new(Plane::new(Axis::X, grid.x - 1, NodeType::Wall)));
            }
        }

        let mut mask = Array2::from_elem(grid.shape(), NodeType::Fluid);
        for shape in &shapes {
            shape.generate(&mut mask);
        }
        let fluid_nodes = mask.iter().filter(|&&n| n == NodeType::Fluid).count();

        Ok(Geometry {
            kind,
            grid,
            mask,
            flow_axis,
            maxv: config.max_v(),
            chan_width: got - 2,
            fluid_nodes,
        })
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn grid(&self) -> StructuredRectangular {
        self.grid
    }

    /// `(rows, cols)` of every field on this geometry.
    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    pub fn mask(&self) -> &Array2<NodeType> {
        &self.mask
    }

    #[inline]
    pub fn node(&self, x: usize, y: usize) -> NodeType {
        self.mask[[y, x]]
    }

    pub fn flow_axis(&self) -> Axis {
        self.flow_axis
    }

    /// Theoretical maximum velocity of the setup.
    pub fn maxv(&self) -> FloatNum {
        self.maxv
    }

    /// Fluid width between the half-way walls.
    pub fn chan_width(&self) -> usize {
        self.chan_width
    }

    pub fn fluid_nodes(&self) -> usize {
        self.fluid_nodes
    }

    /// Analytical Poiseuille velocity at node `pos` across the channel.
    pub fn poiseuille_profile(&self, pos: usize) -> FloatNum {
        let w = self.chan_width as FloatNum;
        let s = pos as FloatNum - 0.5;
        if s <= 0.0 || s >= w {
            return 0.0;
        }
        4.0 * self.maxv / (w * w) * s * (w - s)
    }

    /// Values of `field` at fluid nodes, in row-major order.
    pub fn mask_array_by_fluid<S>(
        &self,
        field: &ArrayBase<S, Ix2>,
    ) -> Result<Array1<FloatNum>, ShapeMismatch>
    where
        S: Data<Elem = FloatNum>,
    {
        if field.dim() != self.mask.dim() {
            return Err(ShapeMismatch {
                expected: self.mask.dim(),
                found: field.dim(),
            });
        }
        Ok(field
            .iter()
            .zip(self.mask.iter())
            .filter(|&(_, &node)| node == NodeType::Fluid)
            .map(|(&v, _)| v)
            .collect())
    }

    /// Geometry layer of the kernel context.
    pub fn constants(&self) -> Context {
        let mut ctx = Context::new();
        ctx.set("lat_nx", self.grid.x);
        ctx.set("lat_ny", self.grid.y);
        ctx.set("maxv", self.maxv);
        ctx.set("chan_width", self.chan_width);
        ctx.set("fluid_nodes", self.fluid_nodes);
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn geometry(args: &[&str]) -> Geometry {
        let config = Configuration::build(args.iter().copied()).unwrap();
        Geometry::build(&config).unwrap()
    }

    #[test]
    fn huge_lattice_is_rejected_before_allocating() {
        let config = Configuration::build(["--lat-nx=4000000000", "--lat-ny=4000000000"]).unwrap();
        assert_eq!(
            Geometry::build(&config).unwrap_err(),
            GeometryError::TooLarge {
                nx: 4_000_000_000,
                ny: 4_000_000_000,
            }
        );
        assert_eq!(population_bytes(usize::MAX, 2, 9), None);
        assert_eq!(population_bytes(isize::MAX as usize / 8, 1, 9), None);
        assert_eq!(population_bytes(64, 32, 9), Some(64 * 32 * 9 * 8));
    }

    #[test]
    fn vertical_channel_has_side_walls() {
        let geo = geometry(&["--lat-nx=6", "--lat-ny=4"]);
        assert_eq!(geo.flow_axis(), Axis::Y);
        assert_eq!(geo.chan_width(), 4);
        assert_eq!(geo.fluid_nodes(), 16);
        for y in 0..4 {
            assert_eq!(geo.node(0, y), NodeType::Wall);
            assert_eq!(geo.node(5, y), NodeType::Wall);
            assert_eq!(geo.node(2, y), NodeType::Fluid);
        }
    }

    #[test]
    fn horizontal_channel_has_top_and_bottom_walls() {
        let geo = geometry(&["--lat-nx=5", "--lat-ny=7", "--horizontal"]);
        assert_eq!(geo.flow_axis(), Axis::X);
        assert_eq!(geo.chan_width(), 5);
        assert_eq!(geo.node(2, 0), NodeType::Wall);
        assert_eq!(geo.node(2, 6), NodeType::Wall);
        assert_eq!(geo.node(0, 3), NodeType::Fluid);
    }

    #[test]
    fn cavity_lid_is_a_velocity_boundary() {
        let geo = geometry(&["--geometry=cavity", "--lat-nx=8", "--lat-ny=8"]);
        assert_eq!(geo.node(3, 7), NodeType::Velocity);
        assert_eq!(geo.node(0, 7), NodeType::Wall);
        assert_eq!(geo.node(3, 0), NodeType::Wall);
        assert_eq!(geo.fluid_nodes(), 6 * 6);
    }

    #[test]
    fn cylinder_blocks_nodes_inside_the_circle() {
        let geo = geometry(&["--geometry=cylinder", "--lat-nx=40", "--lat-ny=16"]);
        assert_eq!(geo.node(12, 8), NodeType::Wall);
        assert_eq!(geo.node(30, 8), NodeType::Fluid);
        assert!(geo.fluid_nodes() < 40 * 14);
    }

    #[test]
    fn invalid_domains_are_rejected() {
        let config = Configuration::build(["--lat-nx=0"]).unwrap();
        assert_eq!(
            Geometry::build(&config).unwrap_err(),
            GeometryError::InvalidDimensions { nx: 0, ny: 64 }
        );
        let config = Configuration::build(["--geometry=sphere"]).unwrap();
        assert!(matches!(
            Geometry::build(&config),
            Err(GeometryError::UnknownKind(k)) if k == "sphere"
        ));
        let config = Configuration::build(["--lat-nx=2"]).unwrap();
        assert!(matches!(
            Geometry::build(&config),
            Err(GeometryError::TooNarrow { .. })
        ));
    }

    #[test]
    fn mask_keeps_fluid_values_in_order() {
        let geo = geometry(&["--lat-nx=4", "--lat-ny=2"]);
        let field = Array2::from_shape_fn((2, 4), |(y, x)| (10 * y + x) as FloatNum);
        let masked = geo.mask_array_by_fluid(&field).unwrap();
        assert_eq!(masked.to_vec(), vec![1.0, 2.0, 11.0, 12.0]);
        assert_eq!(masked.len(), geo.fluid_nodes());
    }

    #[test]
    fn mask_rejects_wrong_shape() {
        let geo = geometry(&["--lat-nx=4", "--lat-ny=2"]);
        let field = Array2::<FloatNum>::zeros((4, 2));
        assert_eq!(
            geo.mask_array_by_fluid(&field.view()).unwrap_err(),
            ShapeMismatch {
                expected: (2, 4),
                found: (4, 2)
            }
        );
    }

    #[test]
    fn profile_peaks_at_maxv_on_centreline() {
        let geo = geometry(&["--lat-nx=7", "--lat-ny=3", "--max-v=0.05"]);
        assert_eq!(geo.poiseuille_profile(0), 0.0);
        assert!((geo.poiseuille_profile(3) - 0.05).abs() < 1e-12);
        assert!(geo.poiseuille_profile(1) < geo.poiseuille_profile(2));
    }
}
