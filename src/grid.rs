/// Lattice axis.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Axis {
    X,
    Y,
}

/// Rectangular 2D lattice. Nodes are stored row-major, `x` fastest.
#[derive(Eq, Ord, PartialEq, PartialOrd, Copy, Clone, Debug)]
pub struct StructuredRectangular {
    pub x: usize,
    pub y: usize,
}

impl StructuredRectangular {
    #[inline(always)]
    pub fn new(x: usize, y: usize) -> Self {
        StructuredRectangular { x, y }
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.x * self.y
    }

    /// `(rows, cols)` as used by `ndarray::Array2`.
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.y, self.x)
    }

    #[inline(always)]
    pub fn len(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    #[inline(always)]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.x + x
    }

    /// Node reached from `(x, y)` by the lattice offset `(dx, dy)`.
    ///
    /// Offsets leaving the lattice wrap on periodic axes and yield `None`
    /// otherwise.
    #[inline(always)]
    pub fn neighbor(
        &self,
        x: usize,
        y: usize,
        dx: i32,
        dy: i32,
        periodic: [bool; 2],
    ) -> Option<(usize, usize)> {
        let nx = wrap(x, dx, self.x, periodic[0])?;
        let ny = wrap(y, dy, self.y, periodic[1])?;
        Some((nx, ny))
    }
}

#[inline(always)]
fn wrap(pos: usize, delta: i32, len: usize, periodic: bool) -> Option<usize> {
    let target = pos as i64 + delta as i64;
    let len = len as i64;
    if (0..len).contains(&target) {
        Some(target as usize)
    } else if periodic {
        Some(target.rem_euclid(len) as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_wrap_only_on_periodic_axes() {
        let grid = StructuredRectangular::new(4, 3);
        assert_eq!(grid.neighbor(0, 0, -1, 0, [true, false]), Some((3, 0)));
        assert_eq!(grid.neighbor(0, 0, 0, -1, [true, false]), None);
        assert_eq!(grid.neighbor(3, 2, 1, 1, [true, true]), Some((0, 0)));
        assert_eq!(grid.neighbor(1, 1, 1, -1, [false, false]), Some((2, 0)));
    }

    #[test]
    fn shape_is_rows_by_columns() {
        let grid = StructuredRectangular::new(5, 2);
        assert_eq!(grid.shape(), (2, 5));
        assert_eq!(grid.size(), 10);
        assert_eq!(grid.index(4, 1), 9);
        assert_eq!(grid.len(Axis::Y), 2);
    }
}
