use crate::context::{Context, ContextError};
use crate::geometry::Geometry;
use crate::traits::ContextContributor;

/// Lid-driven cavity: a closed box whose top wall slides along +x.
pub struct LidSimulation;

impl ContextContributor for LidSimulation {
    fn update_defaults(&self, defaults: &mut Context) {
        defaults.set("periodic_x", false);
        defaults.set("periodic_y", false);
    }

    fn update_context(&self, ctx: &mut Context, geo: &Geometry) -> Result<(), ContextError> {
        ctx.set("lid_vx", geo.maxv());
        ctx.set("lid_vy", 0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::context::{build_context, KernelTemplate};

    #[test]
    fn lid_moves_at_maxv_in_a_closed_box() {
        let config = Configuration::build(["--geometry=cavity", "--max-v=0.05"]).unwrap();
        let geo = Geometry::build(&config).unwrap();
        let ctx = build_context(&config, &geo, KernelTemplate::SingleFluid, &LidSimulation).unwrap();
        assert_eq!(ctx.float("lid_vx"), Ok(0.05));
        assert_eq!(ctx.flag("periodic_x"), Ok(false));
        assert_eq!(ctx.flag("periodic_y"), Ok(false));
        assert_eq!(ctx.float("accel_x"), Ok(0.0));
    }
}
