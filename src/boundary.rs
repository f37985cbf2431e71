use std::marker::PhantomData;

use crate::geometry::NodeType;
use crate::traits::Distribution;
use crate::FloatNum;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Type {
    /// Half-way bounce-back on a stationary wall.
    BounceBack,
    /// Half-way bounce-back on a wall moving with `(ux, uy)`.
    Moving(FloatNum, FloatNum),
}

/// Resolves populations streaming out of non-fluid nodes.
#[derive(Copy, Clone, Debug)]
pub struct Handler<D: Distribution> {
    wall_velocity: [FloatNum; 2],
    rho_wall: FloatNum,
    __dist: PhantomData<D>,
}

impl<D: Distribution> Handler<D> {
    pub fn new(wall_velocity: [FloatNum; 2], rho_wall: FloatNum) -> Self {
        Self {
            wall_velocity,
            rho_wall,
            __dist: PhantomData,
        }
    }

    /// Boundary condition of a source node, `None` for fluid.
    #[inline(always)]
    pub fn condition(&self, node: NodeType) -> Option<Type> {
        match node {
            NodeType::Fluid => None,
            NodeType::Wall => Some(Type::BounceBack),
            NodeType::Velocity => Some(Type::Moving(self.wall_velocity[0], self.wall_velocity[1])),
        }
    }

    /// Population entering direction `i` from a wall, given the outgoing
    /// post-collision population `f_out` in the opposite direction.
    #[inline(always)]
    pub fn reflect(&self, condition: Type, i: usize, f_out: FloatNum) -> FloatNum {
        match condition {
            Type::BounceBack => f_out,
            Type::Moving(ux, uy) => {
                let eu = D::ex()[i] as FloatNum * ux + D::ey()[i] as FloatNum * uy;
                f_out + 2. * D::weights()[i] * self.rho_wall * eu / D::c_squ()
            }
        }
    }
}
