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

//! Seed detection on a distance map.

use ndarray as nd;

use crate::{neighbours_4con, Label, BACKGROUND};

/// Returns the positions of all interior pixels whose distance value is strictly
/// larger than the values of their four 4-connected neighbours, in row-major
/// order.
///
/// The outermost ring of the image is never considered. Flat maxima (plateaus
/// of equal values) yield no position at all, which may leave symmetric objects
/// without a seed.
pub fn find_local_maxima(distance: nd::ArrayView2<u32>) -> Vec<(usize, usize)> {
  //Window size and index of center window pixel
  const WINDOW: (usize, usize) = (3, 3);
  const MID: (usize, usize) = (1, 1);

  /*
    The index of each (3x3) window is the index of its upper left corner, so
    the centre pixel lives at window_idx + (1,1). Windows never hang over the
    edge of the image, which is how the outermost ring gets excluded.
  */
  let mut maxima = Vec::new();
  nd::Zip::indexed(distance.windows(WINDOW)).for_each(|idx, window| {
    let target_val = window[MID];
    if neighbours_4con(&MID, WINDOW).into_iter().all(|idx| window[idx] < target_val) {
      maxima.push((idx.0 + 1, idx.1 + 1));
    }
  });
  maxima
}

/// Returns a marker map with a unique label per strict local maximum of
/// `distance`, together with the number of markers. Labels are handed out as
/// 1, 2, 3... in row-major order.
pub fn find_markers(distance: nd::ArrayView2<u32>) -> (nd::Array2<Label>, usize) {
  let mut markers = nd::Array2::<Label>::from_elem(distance.dim(), BACKGROUND);
  let maxima = find_local_maxima(distance);
  for (label, &idx) in (1..).zip(maxima.iter()) {
    markers[idx] = label;
  }
  log::debug!("found {} watershed markers", maxima.len());
  (markers, maxima.len())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::distance::distance_transform;

  #[test]
  fn odd_square_has_one_marker_at_its_centre() {
    let mut mask = nd::Array2::<u8>::zeros((15, 15));
    mask.slice_mut(nd::s![2..13, 2..13]).fill(1);
    let dt = distance_transform(mask.view());
    assert_eq!(find_local_maxima(dt.view()), vec![(7, 7)]);

    let (markers, count) = find_markers(dt.view());
    assert_eq!(count, 1);
    assert_eq!(markers[(7, 7)], 1);
    assert_eq!(markers.iter().filter(|&&m| m != BACKGROUND).count(), 1);
  }

  #[test]
  fn plateaus_do_not_produce_markers() {
    //Even-sized square: the top of the distance map is a flat 2x2 plateau
    let mut mask = nd::Array2::<u8>::zeros((12, 12));
    mask.slice_mut(nd::s![2..10, 2..10]).fill(1);
    let dt = distance_transform(mask.view());
    assert!(find_local_maxima(dt.view()).is_empty());
  }

  #[test]
  fn border_pixels_are_ignored() {
    let dt = nd::arr2(&[[9u32, 0, 0], [0, 0, 0], [0, 0, 0]]);
    assert!(find_local_maxima(dt.view()).is_empty());
  }

  #[test]
  fn labels_follow_row_major_order() {
    let dt = nd::arr2(&[
      [0u32, 0, 0, 0, 0],
      [0, 0, 0, 3, 0],
      [0, 0, 0, 0, 0],
      [0, 2, 0, 0, 0],
      [0, 0, 0, 0, 0],
    ]);
    let (markers, count) = find_markers(dt.view());
    assert_eq!(count, 2);
    assert_eq!(markers[(1, 3)], 1);
    assert_eq!(markers[(3, 1)], 2);
  }
}
