/*
  Copyright© 2023 Raúl Wolters(1)

  This file is part of rustronomy-segmentation.

  rustronomy is free software: you can redistribute it and/or modify it under
  the terms of the European Union Public License version 1.2 or later, as
  published by the European Commission.

  rustronomy is distributed in the hope that it will be useful, but WITHOUT ANY
  WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
  A PARTICULAR PURPOSE. See the European Union Public License for more details.

  You should have received a copy of the EUPL in an/all official language(s) of
  the European Union along with rustronomy.  If not, see
  <https://ec.europa.eu/info/european-union-public-licence_en/>.

  (1) Resident of the Kingdom of the Netherlands; agreement between licensor and
  licensee subject to Dutch law as per article 15 of the EUPL.
*/

//! Structuring-element filters (erosion and dilation) over square windows.
//!
//! Both filters pad the image with zeros, so pixels outside of the image are
//! treated as background. A foreground pixel on the edge of the image will
//! therefore always be removed by an erosion with a kernel larger than 1x1.

use ndarray as nd;
use num_traits::Zero;

use crate::error::{Result, SegmentationError};

/// Side length of an odd-sized square structuring element.
///
/// A `KernelSize` can only be constructed with a positive odd side length, so
/// every filter that accepts one can rely on the window having a centre pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelSize(usize);

impl KernelSize {
  /// The default 3x3 structuring element
  pub const DEFAULT: KernelSize = KernelSize(3);

  /// Returns a new `KernelSize`, or `InvalidKernelSize` if `size` is zero or even.
  pub fn new(size: usize) -> Result<Self> {
    if size % 2 == 0 {
      Err(SegmentationError::InvalidKernelSize(size))
    } else {
      Ok(KernelSize(size))
    }
  }

  /// Side length of the window
  pub fn size(&self) -> usize {
    self.0
  }

  /// Number of pixels between the centre of the window and its edge
  pub fn radius(&self) -> usize {
    self.0 / 2
  }
}

impl Default for KernelSize {
  fn default() -> Self {
    Self::DEFAULT
  }
}

impl TryFrom<usize> for KernelSize {
  type Error = SegmentationError;
  fn try_from(size: usize) -> Result<Self> {
    KernelSize::new(size)
  }
}

impl std::fmt::Display for KernelSize {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{0}x{0}", self.0)
  }
}

fn zero_padded<T>(img: nd::ArrayView2<T>, pad: usize) -> nd::Array2<T>
where
  T: Copy + Zero,
{
  let (rows, cols) = img.dim();
  let mut padded = nd::Array2::<T>::zeros((rows + 2 * pad, cols + 2 * pad));
  padded.slice_mut(nd::s![pad..pad + rows, pad..pad + cols]).assign(&img);
  padded
}

fn window_reduce<T, F>(img: nd::ArrayView2<T>, kernel: KernelSize, reduce: F) -> nd::Array2<T>
where
  T: Copy + Zero + Send + Sync,
  F: Fn(T, T) -> T + Send + Sync,
{
  if img.is_empty() {
    return img.to_owned();
  }

  /*
    We step through (k x k) windows of the zero-padded image. The index of each
    window is the index of its upper left corner in the padded image, which is
    exactly the index of the window's centre pixel in the original image. So the
    output can be collected directly from the windows.
  */
  let size = kernel.size();
  let padded = zero_padded(img, kernel.radius());
  let windows = nd::Zip::from(padded.windows((size, size)));
  let reduce_window = |window: nd::ArrayView2<T>| {
    let first = window[[0, 0]];
    window.fold(first, |acc, &px| reduce(acc, px))
  };

  #[cfg(feature = "parallel")]
  let output = windows.par_map_collect(reduce_window);
  #[cfg(not(feature = "parallel"))]
  let output = windows.map_collect(reduce_window);

  output
}

/// Returns the erosion (window minimum) of `img`. A foreground pixel of a
/// binary mask survives only if its entire window is foreground.
pub fn erode<T>(img: nd::ArrayView2<T>, kernel: KernelSize) -> nd::Array2<T>
where
  T: Copy + Ord + Zero + Send + Sync,
{
  window_reduce(img, kernel, std::cmp::min)
}

/// Returns the dilation (window maximum) of `img`.
pub fn dilate<T>(img: nd::ArrayView2<T>, kernel: KernelSize) -> nd::Array2<T>
where
  T: Copy + Ord + Zero + Send + Sync,
{
  window_reduce(img, kernel, std::cmp::max)
}

/// Morphological opening: erosion followed by dilation with the same kernel.
/// Removes specks and thin protrusions. Objects thinner than the kernel vanish
/// entirely, which is accepted: this is a denoising step.
pub fn open<T>(img: nd::ArrayView2<T>, kernel: KernelSize) -> nd::Array2<T>
where
  T: Copy + Ord + Zero + Send + Sync,
{
  dilate(erode(img, kernel).view(), kernel)
}

/// Morphological closing: dilation followed by erosion with the same kernel.
pub fn close<T>(img: nd::ArrayView2<T>, kernel: KernelSize) -> nd::Array2<T>
where
  T: Copy + Ord + Zero + Send + Sync,
{
  erode(dilate(img, kernel).view(), kernel)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn square(shape: (usize, usize), from: (usize, usize), side: usize) -> nd::Array2<u8> {
    let mut mask = nd::Array2::<u8>::zeros(shape);
    mask.slice_mut(nd::s![from.0..from.0 + side, from.1..from.1 + side]).fill(1);
    mask
  }

  #[test]
  fn even_and_zero_kernels_are_rejected() {
    assert_eq!(KernelSize::new(0), Err(SegmentationError::InvalidKernelSize(0)));
    assert_eq!(KernelSize::new(4), Err(SegmentationError::InvalidKernelSize(4)));
    assert_eq!(KernelSize::new(5).map(|k| k.radius()), Ok(2));
    assert_eq!(KernelSize::default().size(), 3);
  }

  #[test]
  fn erosion_removes_isolated_pixel() {
    let mut mask = nd::Array2::<u8>::zeros((7, 7));
    mask[[3, 3]] = 1;
    let eroded = erode(mask.view(), KernelSize::DEFAULT);
    assert!(eroded.iter().all(|&px| px == 0));
  }

  #[test]
  fn erosion_shrinks_square_by_radius() {
    let mask = square((12, 12), (2, 2), 6);
    let eroded = erode(mask.view(), KernelSize::DEFAULT);
    assert_eq!(eroded, square((12, 12), (3, 3), 4));
  }

  #[test]
  fn erosion_treats_outside_as_background() {
    let mask = nd::Array2::<u8>::ones((5, 5));
    let eroded = erode(mask.view(), KernelSize::DEFAULT);
    assert_eq!(eroded, square((5, 5), (1, 1), 3));
  }

  #[test]
  fn dilation_grows_square_by_radius() {
    let mask = square((12, 12), (4, 4), 2);
    let dilated = dilate(mask.view(), KernelSize::new(5).unwrap());
    assert_eq!(dilated, square((12, 12), (2, 2), 6));
  }

  #[test]
  fn filters_fix_uniform_arrays() {
    let zeros = nd::Array2::<u8>::zeros((6, 9));
    let ones = nd::Array2::<u8>::ones((6, 9));
    assert_eq!(erode(zeros.view(), KernelSize::DEFAULT), zeros);
    assert_eq!(dilate(zeros.view(), KernelSize::DEFAULT), zeros);
    assert_eq!(dilate(ones.view(), KernelSize::DEFAULT), ones);
    assert_eq!(erode(ones.view(), KernelSize::new(1).unwrap()), ones);
  }

  #[test]
  fn opening_keeps_large_square_and_drops_speck() {
    let mut mask = square((30, 30), (5, 5), 10);
    mask[[25, 25]] = 1;
    let opened = open(mask.view(), KernelSize::DEFAULT);
    assert_eq!(opened, square((30, 30), (5, 5), 10));
  }

  #[test]
  fn closing_fills_one_pixel_hole() {
    let mut mask = square((12, 12), (2, 2), 8);
    mask[[5, 5]] = 0;
    let closed = close(mask.view(), KernelSize::DEFAULT);
    assert_eq!(closed, square((12, 12), (2, 2), 8));
  }

  #[test]
  fn filters_work_on_intensity_images() {
    let img = nd::arr2(&[[9u8, 9, 9], [9, 2, 9], [9, 9, 9]]);
    assert_eq!(erode(img.view(), KernelSize::DEFAULT)[[1, 1]], 2);
    assert_eq!(dilate(img.view(), KernelSize::DEFAULT)[[1, 1]], 9);
    //Corner windows include the zero padding
    assert_eq!(erode(img.view(), KernelSize::DEFAULT)[[0, 0]], 0);
  }
}
