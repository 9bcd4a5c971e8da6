//! Fixed-shape element storage.

/// Row-major raw element storage with an explicit shape.
///
/// A scalar field has shape `[1]`. The element count is the product of the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array {
    shape: Vec<usize>,
    raw: Vec<u64>,
}

impl Array {
    /// Wraps `raw` in `shape`. Returns `None` if the element count differs.
    pub fn new(shape: Vec<usize>, raw: Vec<u64>) -> Option<Self> {
        if shape.iter().product::<usize>() != raw.len() {
            return None;
        }

        Some(Self { shape, raw })
    }

    /// One-dimensional array holding `raw`.
    pub fn from_raw(raw: Vec<u64>) -> Self {
        Self {
            shape: vec![raw.len()],
            raw,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// True for the `[1]` shape of a single-valued field.
    pub fn is_scalar(&self) -> bool {
        self.shape == [1]
    }

    pub fn raw(&self) -> &[u64] {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut [u64] {
        &mut self.raw
    }

    /// Repeats this array into `shape`.
    ///
    /// Dimensions are aligned from the right; each source dimension must be 1
    /// or equal to the target dimension. Returns `None` if the shapes are incompatible.
    pub fn broadcast_to(&self, shape: &[usize]) -> Option<Array> {
        if shape.len() < self.shape.len() {
            return None;
        }

        let lead = shape.len() - self.shape.len();
        let mut source_dims = vec![1usize; lead];
        source_dims.extend_from_slice(&self.shape);

        for (source, target) in source_dims.iter().zip(shape) {
            if *source != 1 && source != target {
                return None;
            }
        }

        // Row-major strides of the source, zeroed on broadcast dimensions.
        let mut strides = vec![0usize; shape.len()];
        let mut stride = 1;
        for d in (0..shape.len()).rev() {
            if source_dims[d] != 1 {
                strides[d] = stride;
            }
            stride *= source_dims[d];
        }

        let count: usize = shape.iter().product();
        let mut raw = Vec::with_capacity(count);
        for flat in 0..count {
            let mut rest = flat;
            let mut index = 0;
            for d in (0..shape.len()).rev() {
                index += (rest % shape[d]) * strides[d];
                rest /= shape[d];
            }
            raw.push(self.raw[index]);
        }

        Some(Array {
            shape: shape.to_vec(),
            raw,
        })
    }
}
