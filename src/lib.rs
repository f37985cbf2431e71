pub mod boundary;
pub mod channel;
pub mod config;
pub mod context;
pub mod distribution;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod grid;
pub mod hooks;
pub mod kind;
pub mod lbm;
pub mod lid;
pub mod physics;
pub mod solver;
pub mod sweep;
pub mod traits;

#[cfg(feature = "accel")]
pub mod af;

use std::ffi::CStr;
use std::ptr;

use libc::{c_char, c_int, size_t};
use tracing::error;

pub use config::Configuration;
pub use error::{Error, Result};
pub use fields::{Component, Fields};
pub use geometry::Geometry;
pub use hooks::{Action, Flow, HookScope};
pub use lbm::{RunSummary, Sim, State};

pub type FloatNum = f64;

/// Builds a simulation from `argc` long flags in `argv` (no program name).
///
/// # Safety
///
/// `argv` must hold `argc` valid NUL-terminated strings and `out` must be
/// writable.
#[no_mangle]
pub unsafe extern "C" fn lbsim_init(
    argc: c_int,
    argv: *const *const c_char,
    out: *mut *mut Sim,
) -> bool {
    if out.is_null() {
        return false;
    }
    *out = ptr::null_mut();

    let mut args = Vec::with_capacity(argc.max(0) as usize);
    for i in 0..argc.max(0) as usize {
        let arg = *argv.add(i);
        if arg.is_null() {
            error!("lbsim_init: argument {} is null", i);
            return false;
        }
        match CStr::from_ptr(arg).to_str() {
            Ok(s) => args.push(s.to_owned()),
            Err(e) => {
                error!("lbsim_init: argument {} is not UTF-8: {}", i, e);
                return false;
            }
        }
    }

    let sim = Configuration::build(args)
        .map_err(Error::from)
        .and_then(Sim::build);
    match sim {
        Ok(sim) => {
            *out = sim.to_ptr();
            true
        }
        Err(e) => {
            error!("Error when initializing LBM simulation: {}", e);
            false
        }
    }
}

/// Runs the simulation; `max_iters == 0` uses the configured bound.
///
/// # Safety
///
/// `sim` must be null or a pointer returned by [`lbsim_init`].
#[no_mangle]
pub unsafe extern "C" fn lbsim_run(sim: *mut Sim, max_iters: u64) -> bool {
    if sim.is_null() {
        return false;
    }
    let bound = if max_iters == 0 { None } else { Some(max_iters) };
    match Sim::from_ptr(sim).run(bound) {
        Ok(_) => true,
        Err(e) => {
            error!("LBM simulation failed: {}", e);
            false
        }
    }
}

/// Copies field `which` (0 density, 1 ux, 2 uy, 3 speed) into `out` in
/// row-major order. Returns the number of values written, 0 on error.
///
/// # Safety
///
/// `sim` must be null or a pointer returned by [`lbsim_init`], and `out`
/// must be valid for `len` writes.
#[no_mangle]
pub unsafe extern "C" fn lbsim_copy_field(
    sim: *mut Sim,
    which: c_int,
    out: *mut FloatNum,
    len: size_t,
) -> size_t {
    if sim.is_null() || out.is_null() {
        return 0;
    }
    let component = match Component::from_code(which) {
        Some(c) => c,
        None => {
            error!("lbsim_copy_field: unknown field {}", which);
            return 0;
        }
    };
    let values = Sim::from_ptr(sim).fields().to_vec(component);
    if len < values.len() {
        error!(
            "lbsim_copy_field: buffer holds {} values, field has {}",
            len,
            values.len()
        );
        return 0;
    }
    ptr::copy_nonoverlapping(values.as_ptr(), out, values.len());
    values.len()
}

/// # Safety
///
/// `sim` must be null or a pointer returned by [`lbsim_init`] that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn lbsim_free(sim: *mut Sim) {
    if !sim.is_null() {
        drop(Box::from_raw(sim));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn c_abi_round_trip() {
        let args: Vec<CString> = ["--lat-nx=6", "--lat-ny=4", "--test", "--max-iters=5"]
            .iter()
            .map(|s| CString::new(*s).unwrap())
            .collect();
        let argv: Vec<*const c_char> = args.iter().map(|s| s.as_ptr()).collect();
        let mut sim = ptr::null_mut();
        unsafe {
            assert!(lbsim_init(argv.len() as c_int, argv.as_ptr(), &mut sim));
            assert!(!sim.is_null());
            assert!(lbsim_run(sim, 0));
            assert!(!lbsim_run(sim, 0));

            let mut buf = vec![0.; 24];
            assert_eq!(lbsim_copy_field(sim, 0, buf.as_mut_ptr(), buf.len()), 24);
            assert!(buf[1] > 0.);
            assert_eq!(buf[0], 0.);
            assert_eq!(lbsim_copy_field(sim, 9, buf.as_mut_ptr(), buf.len()), 0);
            assert_eq!(lbsim_copy_field(sim, 1, buf.as_mut_ptr(), 3), 0);
            lbsim_free(sim);
        }
    }

    #[test]
    fn c_abi_reports_bad_flags() {
        let args = [CString::new("--no-such-flag").unwrap()];
        let argv: Vec<*const c_char> = args.iter().map(|s| s.as_ptr()).collect();
        let mut sim = ptr::null_mut();
        unsafe {
            assert!(!lbsim_init(1, argv.as_ptr(), &mut sim));
        }
        assert!(sim.is_null());
    }

    #[test]
    fn c_abi_rejects_huge_lattice() {
        let args = [
            CString::new("--lat-nx=4000000000").unwrap(),
            CString::new("--lat-ny=4000000000").unwrap(),
        ];
        let argv: Vec<*const c_char> = args.iter().map(|s| s.as_ptr()).collect();
        let mut sim = ptr::null_mut();
        unsafe {
            assert!(!lbsim_init(2, argv.as_ptr(), &mut sim));
        }
        assert!(sim.is_null());
    }
}
