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

//! Marker-free labelling of 4-connected foreground regions.

use ndarray as nd;

use crate::{neighbours_4con, Label, BACKGROUND, BACKGROUND_PX};

/// Labels every 4-connected foreground region of `mask` with its own label.
///
/// Pixels are scanned in row-major order; the first unlabelled foreground pixel
/// found starts a flood fill of its entire region with the next unused label
/// (1, 2, 3...). The flood fill uses an explicit stack, so arbitrarily large
/// regions can be labelled.
///
/// Returns the label map and the area of each label, where `areas[0]` is the
/// number of background pixels.
pub fn label_components(mask: nd::ArrayView2<u8>) -> (nd::Array2<Label>, Vec<usize>) {
  let shape = mask.dim();
  let mut labels = nd::Array2::<Label>::from_elem(shape, BACKGROUND);
  let mut areas = vec![mask.iter().filter(|&&px| px == BACKGROUND_PX).count()];
  let mut stack: Vec<(usize, usize)> = Vec::new();

  for (start, &px) in mask.indexed_iter() {
    if px == BACKGROUND_PX || labels[start] != BACKGROUND {
      continue;
    }

    let label = areas.len() as Label;
    let mut area = 0usize;
    labels[start] = label;
    stack.push(start);

    //Pixels are labelled when pushed, so each pixel is on the stack at most once
    while let Some(idx) = stack.pop() {
      area += 1;
      for neighbour in neighbours_4con(&idx, shape) {
        if mask[neighbour] != BACKGROUND_PX && labels[neighbour] == BACKGROUND {
          labels[neighbour] = label;
          stack.push(neighbour);
        }
      }
    }
    areas.push(area);
  }

  log::debug!("flood fill found {} connected regions", areas.len() - 1);
  (labels, areas)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn diagonal_pixels_are_not_connected() {
    let mask = nd::arr2(&[[1u8, 0, 0], [0, 1, 0], [0, 0, 1]]);
    let (labels, areas) = label_components(mask.view());
    assert_eq!(labels, nd::arr2(&[[1, 0, 0], [0, 2, 0], [0, 0, 3]]));
    assert_eq!(areas, vec![6, 1, 1, 1]);
  }

  #[test]
  fn u_shape_is_a_single_region() {
    let mask = nd::arr2(&[[1u8, 0, 1], [1, 0, 1], [1, 1, 1]]);
    let (labels, areas) = label_components(mask.view());
    assert!(labels.iter().zip(mask.iter()).all(|(&l, &px)| (l == 1) == (px == 1)));
    assert_eq!(areas, vec![2, 7]);
  }

  #[test]
  fn large_region_does_not_overflow_the_stack() {
    let mask = nd::Array2::<u8>::ones((1000, 1000));
    let (labels, areas) = label_components(mask.view());
    assert!(labels.iter().all(|&l| l == 1));
    assert_eq!(areas, vec![0, 1_000_000]);
  }

  #[test]
  fn empty_mask_has_no_regions() {
    let mask = nd::Array2::<u8>::zeros((4, 5));
    let (labels, areas) = label_components(mask.view());
    assert!(labels.iter().all(|&l| l == BACKGROUND));
    assert_eq!(areas, vec![20]);
  }
}
