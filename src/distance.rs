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

//! Two-pass approximation of the distance-to-background field of a mask.

use ndarray as nd;

/// Value that foreground pixels start out with before the first pass
const UNREACHED: u32 = u32::MAX;

/// Returns the 4-connected (Manhattan) distance of every foreground pixel to
/// the nearest background pixel. Pixels outside of the array count as
/// background, so foreground pixels on the edge of the image have distance 1.
/// Background pixels have distance 0.
///
/// The transform is computed with two sequential raster scans rather than a
/// priority-queue propagation:
/// 1. a forward (top-left to bottom-right) pass that propagates distances from
/// the pixels above and to the left;
/// 2. a backward (bottom-right to top-left) pass that propagates distances from
/// the pixels below and to the right.
///
/// For the city-block metric these two passes are exact.
pub fn distance_transform(mask: nd::ArrayView2<u8>) -> nd::Array2<u32> {
  let (rows, cols) = mask.dim();
  let mut dt = mask.mapv(|px| if px == 0 { 0 } else { UNREACHED });

  //(1) forward pass
  for row in 0..rows {
    for col in 0..cols {
      if dt[(row, col)] == 0 {
        continue;
      }
      let up = if row > 0 { dt[(row - 1, col)] } else { 0 };
      let left = if col > 0 { dt[(row, col - 1)] } else { 0 };
      dt[(row, col)] = dt[(row, col)].min(up.min(left).saturating_add(1));
    }
  }

  //(2) backward pass
  for row in (0..rows).rev() {
    for col in (0..cols).rev() {
      if dt[(row, col)] == 0 {
        continue;
      }
      let down = if row + 1 < rows { dt[(row + 1, col)] } else { 0 };
      let right = if col + 1 < cols { dt[(row, col + 1)] } else { 0 };
      dt[(row, col)] = dt[(row, col)].min(down.min(right).saturating_add(1));
    }
  }

  dt
}
