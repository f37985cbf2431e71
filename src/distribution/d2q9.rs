//! D2Q9 velocity set.
//!
//! ```text
//!  c6  c2   c5
//!    \  |  /
//!  c3 -c0 - c1
//!    /  |  \
//!  c7  c4   c8
//! ```

use crate::traits::Distribution;
use crate::FloatNum;

const T1: FloatNum = 4. / 9.;
const T2: FloatNum = 1. / 9.;
const T3: FloatNum = 1. / 36.;

const EX: [i32; 9] = [0, 1, 0, -1, 0, 1, -1, -1, 1];
const EY: [i32; 9] = [0, 0, 1, 0, -1, 1, 1, -1, -1];
const W: [FloatNum; 9] = [T1, T2, T2, T2, T2, T3, T3, T3, T3];
const OPP: [usize; 9] = [0, 3, 4, 1, 2, 7, 8, 5, 6];

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct D2Q9;

impl Distribution for D2Q9 {
    const Q: usize = 9;

    #[inline(always)]
    fn c_squ() -> FloatNum {
        1. / 3.
    }
    #[inline(always)]
    fn ex() -> &'static [i32] {
        &EX
    }
    #[inline(always)]
    fn ey() -> &'static [i32] {
        &EY
    }
    #[inline(always)]
    fn weights() -> &'static [FloatNum] {
        &W
    }
    #[inline(always)]
    fn opposite(i: usize) -> usize {
        OPP[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one() {
        assert_relative_eq!(D2Q9::weights().iter().sum::<FloatNum>(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn opposites_reverse_velocities() {
        for i in 0..D2Q9::size() {
            let o = D2Q9::opposite(i);
            assert_eq!(D2Q9::ex()[o], -D2Q9::ex()[i]);
            assert_eq!(D2Q9::ey()[o], -D2Q9::ey()[i]);
            assert_eq!(D2Q9::opposite(o), i);
        }
    }

    #[test]
    fn equilibrium_recovers_moments() {
        let (rho, u) = (1.2, [0.03, -0.01]);
        let f: Vec<FloatNum> = (0..9).map(|i| D2Q9::equilibrium(i, rho, u)).collect();
        let m0: FloatNum = f.iter().sum();
        let mx: FloatNum = f.iter().zip(D2Q9::ex()).map(|(f, &e)| f * e as FloatNum).sum();
        let my: FloatNum = f.iter().zip(D2Q9::ey()).map(|(f, &e)| f * e as FloatNum).sum();
        assert_relative_eq!(m0, rho, epsilon = 1e-12);
        assert_relative_eq!(mx, rho * u[0], epsilon = 1e-12);
        assert_relative_eq!(my, rho * u[1], epsilon = 1e-12);
    }
}
