//! Sequence slices.

use super::MirrorError;

/// A `start:stop:step` range over a sequence.
///
/// Bounds may be negative (counted from the end) and are clamped to the
/// sequence, so a slice never fails for being out of range; only a step of
/// zero is rejected.
///
/// ```
/// # use mirrordoc::mirror::Slice;
/// assert_eq!(Slice::new(1, 3).indices(5).unwrap(), vec![1, 2]);
/// assert_eq!(Slice::from_start(-2).indices(5).unwrap(), vec![3, 4]);
/// assert_eq!(Slice::full().step(-2).indices(5).unwrap(), vec![4, 2, 0]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl Slice {
    /// `start..stop` with step 1.
    pub fn new(start: isize, stop: isize) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }

    /// The whole sequence.
    pub fn full() -> Self {
        Self::default()
    }

    /// `start..` to the end.
    pub fn from_start(start: isize) -> Self {
        Self {
            start: Some(start),
            ..Self::default()
        }
    }

    /// From the beginning to `stop`.
    pub fn until(stop: isize) -> Self {
        Self {
            stop: Some(stop),
            ..Self::default()
        }
    }

    /// Sets the step.
    pub fn step(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }

    /// Resolves the slice against a sequence of length `len` into
    /// `(start, stop, step)` with both bounds clamped.
    pub fn resolve(&self, len: usize) -> Result<(isize, isize, isize), MirrorError> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(MirrorError::InvalidSlice);
        }
        let len = len as isize;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };

        let clamp = |bound: isize| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(lower, upper)
        };
        let start = self
            .start
            .map(clamp)
            .unwrap_or(if step > 0 { lower } else { upper });
        let stop = self
            .stop
            .map(clamp)
            .unwrap_or(if step > 0 { upper } else { lower });
        Ok((start, stop, step))
    }

    /// The positions selected in a sequence of length `len`, in slice order.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>, MirrorError> {
        let (start, stop, step) = self.resolve(len)?;
        let mut indices = Vec::new();
        let mut next = Some(start);
        while let Some(i) = next {
            if (step > 0 && i >= stop) || (step < 0 && i <= stop) {
                break;
            }
            indices.push(i as usize);
            // A step past the end of `isize` can only leave the range
            next = i.checked_add(step);
        }
        Ok(indices)
    }
}
