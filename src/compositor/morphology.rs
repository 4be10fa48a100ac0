//! Binary morphology on boolean masks with square structuring elements.
//!
//! A square element is separable, so every pass runs as a horizontal sweep
//! followed by a vertical one. Each sweep uses prefix counts, which keeps the
//! cost independent of the element size. Pixels outside the image never take
//! part: erosion only looks at in-bounds neighbours, and so does dilation.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis, Zip};

/// Square structuring element of side `size`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    size: usize,
}

impl StructuringElement {
    pub fn square(size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_parameter(
                "structuring element size must be positive",
            ));
        }
        Ok(Self {
            size: size as usize,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Offsets covered by the element relative to its anchor, anchor at `size / 2`
    fn reach(&self) -> (isize, isize) {
        let anchor = (self.size / 2) as isize;
        (-anchor, self.size as isize - 1 - anchor)
    }
}

#[derive(Debug, Clone, Copy)]
enum Sweep {
    Erode,
    Dilate,
}

pub fn erode(mask: &Array2<bool>, element: StructuringElement) -> Array2<bool> {
    let (lo, hi) = element.reach();
    apply(mask, Sweep::Erode, lo, hi)
}

/// Dilation uses the reflected element so that opening and closing do not
/// shift the mask for even sizes
pub fn dilate(mask: &Array2<bool>, element: StructuringElement) -> Array2<bool> {
    let (lo, hi) = element.reach();
    apply(mask, Sweep::Dilate, -hi, -lo)
}

/// Erosion followed by dilation
pub fn open(mask: &Array2<bool>, element: StructuringElement) -> Array2<bool> {
    dilate(&erode(mask, element), element)
}

/// Dilation followed by erosion
pub fn close(mask: &Array2<bool>, element: StructuringElement) -> Array2<bool> {
    erode(&dilate(mask, element), element)
}

fn apply(mask: &Array2<bool>, sweep: Sweep, lo: isize, hi: isize) -> Array2<bool> {
    if lo == 0 && hi == 0 {
        return mask.clone();
    }
    let rows = sweep_axis(mask, Axis(1), sweep, lo, hi);
    sweep_axis(&rows, Axis(0), sweep, lo, hi)
}

fn sweep_axis(
    mask: &Array2<bool>,
    axis: Axis,
    sweep: Sweep,
    lo: isize,
    hi: isize,
) -> Array2<bool> {
    let mut out = Array2::from_elem(mask.raw_dim(), false);
    let mut prefix = Vec::with_capacity(mask.len_of(axis) + 1);
    Zip::from(out.lanes_mut(axis))
        .and(mask.lanes(axis))
        .for_each(|dst, src| sweep_lane(src, dst, &mut prefix, sweep, lo, hi));
    out
}

fn sweep_lane(
    src: ArrayView1<bool>,
    mut dst: ArrayViewMut1<bool>,
    prefix: &mut Vec<usize>,
    sweep: Sweep,
    lo: isize,
    hi: isize,
) {
    let len = src.len() as isize;
    prefix.clear();
    prefix.push(0);
    let mut running = 0;
    for &set in src.iter() {
        running += usize::from(set);
        prefix.push(running);
    }

    for (i, value) in dst.iter_mut().enumerate() {
        let i = i as isize;
        // the window always contains i itself, so it is never empty
        let start = (i + lo).max(0) as usize;
        let end = (i + hi).min(len - 1) as usize + 1;
        let count = prefix[end] - prefix[start];
        *value = match sweep {
            Sweep::Erode => count == end - start,
            Sweep::Dilate => count > 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn element(size: u32) -> StructuringElement {
        StructuringElement::square(size).unwrap()
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            StructuringElement::square(0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn size_one_is_identity() {
        let mut mask = Array2::from_elem((5, 6), false);
        mask[[1, 2]] = true;
        mask[[4, 5]] = true;
        assert_eq!(open(&mask, element(1)), mask);
        assert_eq!(close(&mask, element(1)), mask);
    }

    #[test]
    fn erosion_shrinks_block() {
        let mut mask = Array2::from_elem((7, 7), false);
        mask.slice_mut(s![1..6, 1..6]).fill(true);
        let eroded = erode(&mask, element(3));
        assert_eq!(eroded.iter().filter(|&&v| v).count(), 9);
        assert!(eroded[[3, 3]]);
        assert!(!eroded[[1, 1]]);
    }

    #[test]
    fn dilation_grows_single_pixel() {
        let mut mask = Array2::from_elem((5, 5), false);
        mask[[2, 2]] = true;
        let dilated = dilate(&mask, element(3));
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 9);
        assert!(dilated[[1, 1]] && dilated[[3, 3]]);
        assert!(!dilated[[0, 0]]);
    }

    #[test]
    fn image_border_does_not_erode() {
        let mask = Array2::from_elem((4, 4), true);
        assert_eq!(erode(&mask, element(3)), mask);
    }

    #[test]
    fn opening_removes_isolated_speck() {
        let mut mask = Array2::from_elem((9, 9), false);
        mask[[4, 4]] = true;
        let opened = open(&mask, element(3));
        assert!(opened.iter().all(|&v| !v));
    }

    #[test]
    fn opening_keeps_large_blob() {
        let mut mask = Array2::from_elem((10, 10), false);
        mask.slice_mut(s![2..8, 2..8]).fill(true);
        assert_eq!(open(&mask, element(3)), mask);
    }

    #[test]
    fn closing_fills_hole() {
        let mut mask = Array2::from_elem((9, 9), false);
        mask.slice_mut(s![2..7, 2..7]).fill(true);
        let expected = mask.clone();
        mask[[4, 4]] = false;
        assert_eq!(close(&mask, element(3)), expected);
    }

    #[test]
    fn even_sizes_do_not_shift_blob() {
        let mut mask = Array2::from_elem((12, 12), false);
        mask.slice_mut(s![3..9, 3..9]).fill(true);
        assert_eq!(open(&mask, element(4)), mask);
        assert_eq!(close(&mask, element(4)), mask);
    }
}
