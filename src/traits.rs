use ndarray::Array2;

use crate::context::{Context, ContextError, KernelTemplate};
use crate::error::{KernelError, Result};
use crate::fields::Fields;
use crate::geometry::{Geometry, NodeType};
use crate::FloatNum;

/// Something that paints node types onto a mask.
pub trait Shape {
    fn generate(&self, mask: &mut Array2<NodeType>);
}

/// Discrete velocity set of a lattice.
pub trait Distribution {
    const Q: usize;

    fn c_squ() -> FloatNum;
    fn ex() -> &'static [i32];
    fn ey() -> &'static [i32];
    fn weights() -> &'static [FloatNum];
    fn opposite(i: usize) -> usize;

    #[inline(always)]
    fn size() -> usize {
        Self::Q
    }

    /// Second-order equilibrium for direction `i`.
    #[inline(always)]
    fn equilibrium(i: usize, rho: FloatNum, u: [FloatNum; 2]) -> FloatNum {
        let eu = Self::ex()[i] as FloatNum * u[0] + Self::ey()[i] as FloatNum * u[1];
        let usq = u[0] * u[0] + u[1] * u[1];
        let cs2 = Self::c_squ();
        Self::weights()[i]
            * rho
            * (1.0 + eu / cs2 + eu * eu / (2.0 * cs2 * cs2) - usq / (2.0 * cs2))
    }
}

/// A materialized step function.
///
/// `init` uploads the node map and the initial macroscopic state, `step`
/// advances one time step and writes the new macroscopic fields in place.
pub trait Kernel {
    fn name(&self) -> &'static str;
    fn init(&mut self, geo: &Geometry, fields: &Fields) -> std::result::Result<(), KernelError>;
    fn step(&mut self, iteration: u64, fields: &mut Fields) -> std::result::Result<(), KernelError>;
}

/// Turns a kernel template plus its context into an executable kernel.
pub trait Codegen {
    fn materialize(&self, template: KernelTemplate, ctx: &Context) -> Result<Box<dyn Kernel>>;
}

/// Per-simulation-kind adjustments of the kernel context.
pub trait ContextContributor {
    /// Adjusts the template defaults before the layers are merged.
    fn update_defaults(&self, _defaults: &mut Context) {}

    /// Injects derived symbols into the merged context.
    fn update_context(
        &self,
        _ctx: &mut Context,
        _geo: &Geometry,
    ) -> std::result::Result<(), ContextError> {
        Ok(())
    }
}
