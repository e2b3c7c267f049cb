use std::fmt;

// Shape - Dimensions of a kernel buffer
//
// Operators cache one Shape per input slot and compare it against the
// buffers they see on the next run to decide whether their primitives need
// to be rebuilt:
//   - Scalar: Shape([])           0 dimensions, 1 element
//   - NCHW:   Shape([2, 3, 4, 4]) 4 dimensions, 96 elements

/// N-dimensional shape of a buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Elements a buffer of this shape holds. A scalar holds one; any zero
    /// dimension makes the buffer empty.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Extent of dimension `d`.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0.get(d).copied().ok_or(crate::Error::IndexOutOfBounds {
            kind: "dimension",
            idx: d,
            len: self.rank(),
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// Conversions, so `DnnMemory::new((2, 3))` reads naturally

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(len: usize) -> Self {
        Shape(vec![len])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Shape(vec![rows, cols])
    }
}

// NCHW
impl From<(usize, usize, usize, usize)> for Shape {
    fn from((n, c, h, w): (usize, usize, usize, usize)) -> Self {
        Shape(vec![n, c, h, w])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}
