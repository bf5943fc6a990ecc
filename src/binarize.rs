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

//! Conversion of grayscale intensity images into binary foreground masks.

use ndarray as nd;
use num_traits::ToPrimitive;

use crate::{
  error::{Result, SegmentationError},
  morphology::KernelSize,
  BACKGROUND_PX, FOREGROUND_PX,
};

/// Offset subtracted from the mean intensity by the adaptive threshold
pub const ADAPTIVE_OFFSET: f64 = 10.0;

/// Returns the adaptive threshold of `img`: its mean intensity minus 10.
///
/// Returns `NaN` for an image without pixels.
pub fn adaptive_threshold(img: nd::ArrayView2<u8>) -> f64 {
  let sum: f64 = img.iter().map(|&px| px as f64).sum();
  sum / img.len() as f64 - ADAPTIVE_OFFSET
}

/// Returns a binary mask where dark pixels (intensity strictly below the
/// threshold) are foreground. If `threshold` is `None`, the adaptive threshold
/// is used.
///
/// An image that is entirely above the threshold gives an all-zero mask; this
/// is a valid outcome meaning "no objects".
pub fn binarize(img: nd::ArrayView2<u8>, threshold: Option<u8>) -> nd::Array2<u8> {
  let threshold = match threshold {
    Some(fixed) => fixed as f64,
    None => adaptive_threshold(img),
  };
  binarize_at(img, threshold)
}

pub(crate) fn binarize_at(img: nd::ArrayView2<u8>, threshold: f64) -> nd::Array2<u8> {
  img.mapv(|px| if (px as f64) < threshold { FOREGROUND_PX } else { BACKGROUND_PX })
}

/// Converts an array of any numeric type into an intensity image.
///
/// Values are rounded to the nearest integer. Non-finite values and values
/// outside of `[0, 255]` are rejected with `IntensityOutOfRange`; this function
/// never clamps.
pub fn to_intensity<T>(img: nd::ArrayView2<T>) -> Result<nd::Array2<u8>>
where
  T: ToPrimitive + Copy,
{
  let mut output = nd::Array2::<u8>::zeros(img.dim());
  for ((row, col), px) in img.indexed_iter() {
    let value = px.to_f64().unwrap_or(f64::NAN);
    output[(row, col)] = value
      .round()
      .to_u8()
      .ok_or(SegmentationError::IntensityOutOfRange { row, col, value })?;
  }
  Ok(output)
}

/// Box (mean) filter with an odd square window. Pixels outside of the image
/// take the value of the nearest edge pixel. The mean is truncated.
pub fn box_filter(img: nd::ArrayView2<u8>, kernel: KernelSize) -> nd::Array2<u8> {
  let (rows, cols) = img.dim();
  let radius = kernel.radius() as isize;
  let area = (kernel.size() * kernel.size()) as u64;
  let clamp = |idx: isize, len: usize| idx.clamp(0, len as isize - 1) as usize;

  nd::Array2::from_shape_fn((rows, cols), |(row, col)| {
    let mut sum = 0u64;
    for dr in -radius..=radius {
      for dc in -radius..=radius {
        let r = clamp(row as isize + dr, rows);
        let c = clamp(col as isize + dc, cols);
        sum += img[(r, c)] as u64;
      }
    }
    (sum / area) as u8
  })
}

/// Intensity bands used by [`intensity_bands`], as `(upper bound, band value)`
/// pairs. Bounds are inclusive and bands are checked in ascending order.
pub const INTENSITY_BANDS: [(u8, u8); 5] = [(50, 25), (100, 75), (150, 125), (200, 175), (255, 255)];

/// Posterizes `img` into five fixed intensity bands: 0-50 becomes 25, 51-100
/// becomes 75, 101-150 becomes 125, 151-200 becomes 175 and 201-255 becomes 255.
/// This is a coarse segmentation of the whole grey range that needs no
/// threshold and no morphology.
pub fn intensity_bands(img: nd::ArrayView2<u8>) -> nd::Array2<u8> {
  img.mapv(|px| {
    INTENSITY_BANDS.iter().find(|&&(upper, _)| px <= upper).map_or(u8::MAX, |&(_, band)| band)
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn adaptive_threshold_is_mean_minus_ten() {
    let img = nd::arr2(&[[100u8, 200], [100, 200]]);
    assert_eq!(adaptive_threshold(img.view()), 140.0);
  }

  #[test]
  fn dark_pixels_become_foreground() {
    let img = nd::arr2(&[[10u8, 250, 250], [250, 10, 250], [250, 250, 139]]);
    //mean = 1659 / 9 = 184.33, threshold = 174.33
    let mask = binarize(img.view(), None);
    assert_eq!(mask, nd::arr2(&[[1u8, 0, 0], [0, 1, 0], [0, 0, 1]]));
  }

  #[test]
  fn fixed_threshold_is_strict() {
    let img = nd::arr2(&[[127u8, 128, 129]]);
    assert_eq!(binarize(img.view(), Some(128)), nd::arr2(&[[1u8, 0, 0]]));
  }

  #[test]
  fn uniform_image_has_no_foreground() {
    let img = nd::Array2::<u8>::from_elem((8, 8), 77);
    assert!(binarize(img.view(), None).iter().all(|&px| px == BACKGROUND_PX));
  }

  #[test]
  fn conversion_rounds_and_validates() {
    let ok = nd::arr2(&[[0.4f64, 254.6], [17.0, 255.0]]);
    assert_eq!(to_intensity(ok.view()), Ok(nd::arr2(&[[0u8, 255], [17, 255]])));

    let too_big = nd::arr2(&[[0i32, 256]]);
    assert_eq!(
      to_intensity(too_big.view()),
      Err(SegmentationError::IntensityOutOfRange { row: 0, col: 1, value: 256.0 })
    );

    let negative = nd::arr2(&[[-3i64]]);
    assert!(to_intensity(negative.view()).is_err());

    let nan = nd::arr2(&[[1.0f32, f32::NAN]]);
    assert!(to_intensity(nan.view()).is_err());
  }

  #[test]
  fn box_filter_replicates_edges() {
    let img = nd::arr2(&[[0u8, 0, 90], [0, 0, 90], [0, 0, 90]]);
    let smooth = box_filter(img.view(), KernelSize::DEFAULT);
    assert_eq!(smooth.row(1).to_vec(), vec![0, 30, 60]);
    assert_eq!(smooth[(0, 2)], 60);
  }

  #[test]
  fn bands_switch_at_their_edges() {
    let img = nd::arr2(&[[0u8, 50, 51, 100, 101], [150, 151, 200, 201, 255]]);
    assert_eq!(
      intensity_bands(img.view()),
      nd::arr2(&[[25u8, 25, 75, 75, 125], [125, 175, 175, 255, 255]])
    );
  }
}
