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

//! Size filtering and canonical renumbering of label maps.
//!
//! Both labelling variants end here: small regions are treated as noise and
//! merged back into the background, and the remaining regions are renumbered so
//! that the labels in the output are exactly `1..=count`.

use ndarray as nd;

use crate::{Label, BACKGROUND};

/// Default minimum object area in pixels
pub const DEFAULT_MIN_AREA: usize = 500;

/// Final output of a segmentation: a label map whose positive labels are
/// exactly `1..=count`, and the area of every label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
  /// Label map; 0 is background, `1..=count` are objects
  pub labels: nd::Array2<Label>,
  /// Number of objects
  pub count: usize,
  /// Area in pixels of each label; `areas[0]` is the background area and
  /// `areas.len() == count + 1`
  pub areas: Vec<usize>,
}

impl Segmentation {
  /// Returns the area of the object with the given label
  pub fn area(&self, label: Label) -> Option<usize> {
    if label <= BACKGROUND {
      None
    } else {
      self.areas.get(label as usize).copied()
    }
  }

  /// Returns `true` if no objects were found
  pub fn is_empty(&self) -> bool {
    self.count == 0
  }
}

#[inline(always)]
fn recolour(labels: nd::ArrayView2<Label>, colour_map: &[Label]) -> nd::Array2<Label> {
  labels.mapv(|col| if col > BACKGROUND { colour_map[col as usize] } else { BACKGROUND })
}

/// Returns the number of pixels carrying each label. The returned vec is
/// indexed by label and has length `max_label + 1`. Negative labels are not
/// counted.
pub fn label_areas(labels: nd::ArrayView2<Label>) -> Vec<usize> {
  let max_label = labels.iter().copied().fold(BACKGROUND, Label::max);
  let mut areas = vec![0usize; max_label as usize + 1];
  labels.iter().filter(|&&col| col >= BACKGROUND).for_each(|&col| areas[col as usize] += 1);
  areas
}

/// Sets every label with fewer than `min_area` pixels to background. Negative
/// labels are set to background as well; other labels are left unchanged.
pub fn remove_small_objects(labels: nd::ArrayView2<Label>, min_area: usize) -> nd::Array2<Label> {
  let colour_map: Vec<Label> = label_areas(labels)
    .into_iter()
    .enumerate()
    .map(|(col, area)| if area < min_area { BACKGROUND } else { col as Label })
    .collect();
  recolour(labels, &colour_map)
}

/// Renumbers the positive labels of `labels` to `1..=count` in order of first
/// appearance (row-major). Returns the new label map and `count`.
pub fn relabel_sequential(labels: nd::ArrayView2<Label>) -> (nd::Array2<Label>, usize) {
  let max_label = labels.iter().copied().fold(BACKGROUND, Label::max);
  let mut colour_map = vec![BACKGROUND; max_label as usize + 1];
  let mut count = 0usize;
  for &col in labels.iter().filter(|&&col| col > BACKGROUND) {
    if colour_map[col as usize] == BACKGROUND {
      count += 1;
      colour_map[col as usize] = count as Label;
    }
  }
  (recolour(labels, &colour_map), count)
}

/// Removes objects smaller than `min_area` and renumbers the survivors.
///
/// Applying this function to its own output with the same `min_area` returns
/// the same segmentation.
pub fn filter_and_relabel(labels: nd::ArrayView2<Label>, min_area: usize) -> Segmentation {
  let before = label_areas(labels).iter().skip(1).filter(|&&area| area > 0).count();
  let filtered = remove_small_objects(labels, min_area);
  let (labels, count) = relabel_sequential(filtered.view());
  let areas = label_areas(labels.view());
  log::debug!("kept {count} of {before} objects with an area of at least {min_area}px");
  Segmentation { labels, count, areas }
}
