//! Pressure-free channel setups driven by a uniform body force.

use crate::context::{Context, ContextError};
use crate::geometry::Geometry;
use crate::grid::Axis;
use crate::traits::ContextContributor;
use crate::FloatNum;

/// Body force that yields a centreline velocity `maxv` in a channel of
/// width `width` at steady state.
pub fn poiseuille_accel(visc: FloatNum, maxv: FloatNum, width: usize) -> FloatNum {
    let w = width as FloatNum;
    8. * visc * maxv / (w * w)
}

fn drive(ctx: &mut Context, geo: &Geometry) -> Result<(), ContextError> {
    let accel = poiseuille_accel(ctx.float("visc")?, geo.maxv(), geo.chan_width());
    let (along, across) = match geo.flow_axis() {
        Axis::X => (("accel_x", "periodic_x"), ("accel_y", "periodic_y")),
        Axis::Y => (("accel_y", "periodic_y"), ("accel_x", "periodic_x")),
    };
    ctx.set(along.0, accel);
    ctx.set(along.1, true);
    ctx.set(across.0, 0.0);
    ctx.set(across.1, false);
    Ok(())
}

/// Plane Poiseuille flow.
pub struct ChannelFlow;

impl ContextContributor for ChannelFlow {
    fn update_context(&self, ctx: &mut Context, geo: &Geometry) -> Result<(), ContextError> {
        drive(ctx, geo)
    }
}

/// Channel flow past a circular obstacle.
pub struct CylinderFlow;

impl ContextContributor for CylinderFlow {
    fn update_defaults(&self, defaults: &mut Context) {
        defaults.set("periodic_y", false);
    }

    fn update_context(&self, ctx: &mut Context, geo: &Geometry) -> Result<(), ContextError> {
        drive(ctx, geo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::context::{build_context, KernelTemplate};
    use approx::assert_relative_eq;

    fn context(args: &[&str], contributor: &dyn ContextContributor) -> Context {
        let config = Configuration::build(args.iter().copied()).unwrap();
        let geo = Geometry::build(&config).unwrap();
        build_context(&config, &geo, KernelTemplate::SingleFluid, contributor).unwrap()
    }

    #[test]
    fn accel_matches_target_centreline_velocity() {
        assert_relative_eq!(poiseuille_accel(0.1, 0.02, 10), 8. * 0.1 * 0.02 / 100.);
    }

    #[test]
    fn vertical_channel_is_driven_along_y() {
        let ctx = context(&["--lat-nx=12", "--visc=0.05"], &ChannelFlow);
        assert_relative_eq!(ctx.float("accel_y").unwrap(), poiseuille_accel(0.05, 0.02, 10));
        assert_eq!(ctx.float("accel_x"), Ok(0.0));
        assert_eq!(ctx.flag("periodic_y"), Ok(true));
        assert_eq!(ctx.flag("periodic_x"), Ok(false));
        assert_eq!(ctx.int("lat_nx"), Ok(12));
        assert_relative_eq!(ctx.float("tau").unwrap(), 0.65);
    }

    #[test]
    fn horizontal_channel_is_driven_along_x() {
        let ctx = context(&["--lat-ny=7", "--horizontal"], &ChannelFlow);
        assert_relative_eq!(ctx.float("accel_x").unwrap(), poiseuille_accel(0.1, 0.02, 5));
        assert_eq!(ctx.float("accel_y"), Ok(0.0));
    }

    #[test]
    fn cylinder_closes_the_cross_stream_boundary() {
        let ctx = context(&["--geometry=cylinder", "--lat-ny=16"], &CylinderFlow);
        assert_eq!(ctx.flag("periodic_y"), Ok(false));
        assert!(ctx.float("accel_x").unwrap() > 0.);
    }
}
