//! Registry of simulation kinds, selected by the configured geometry tag.

use crate::channel::{ChannelFlow, CylinderFlow};
use crate::geometry::GeometryKind;
use crate::lid::LidSimulation;
use crate::traits::ContextContributor;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimKind {
    Poiseuille,
    Cylinder,
    Cavity,
}

impl SimKind {
    pub fn resolve(geometry: GeometryKind) -> SimKind {
        match geometry {
            GeometryKind::Channel => SimKind::Poiseuille,
            GeometryKind::Cylinder => SimKind::Cylinder,
            GeometryKind::Cavity => SimKind::Cavity,
        }
    }

    pub fn contributor(self) -> &'static dyn ContextContributor {
        match self {
            SimKind::Poiseuille => &ChannelFlow,
            SimKind::Cylinder => &CylinderFlow,
            SimKind::Cavity => &LidSimulation,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SimKind::Poiseuille => "poiseuille",
            SimKind::Cylinder => "cylinder",
            SimKind::Cavity => "cavity",
        }
    }
}
