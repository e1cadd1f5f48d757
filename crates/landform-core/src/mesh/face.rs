/// Triple of vertex indices `(p0, p1, p2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face(pub usize, pub usize, pub usize);

impl Face {
    pub fn new(p0: usize, p1: usize, p2: usize) -> Self {
        Self(p0, p1, p2)
    }

    pub fn indices(&self) -> [usize; 3] {
        [self.0, self.1, self.2]
    }

    /// True if any two indices coincide.
    pub fn is_logically_degenerate(&self) -> bool {
        self.0 == self.1 || self.1 == self.2 || self.0 == self.2
    }

    /// True for a `Face::new(idx, idx, idx)` isolated-point marker: all three
    /// indices the same vertex. A strict subset of `is_logically_degenerate`,
    /// kept out of mesh cleanup so isolated-point reconstruction survives it.
    pub fn is_point_marker(&self) -> bool {
        self.0 == self.1 && self.1 == self.2
    }

    pub fn offset(&self, by: usize) -> Face {
        Face(self.0 + by, self.1 + by, self.2 + by)
    }
}
