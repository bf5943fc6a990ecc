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

//! Marker-driven watershed on a distance map.
//!
//! Regions grow outward from their markers. Pixels are claimed in order of
//! decreasing distance value, so the fronts of neighbouring regions meet on the
//! "valleys" of the distance map. Pixels where two regions collide become part
//! of a watershed line and end up as background.

use std::{cmp::Ordering, collections::BinaryHeap};

use ndarray as nd;

use crate::{
  error::{Result, SegmentationError},
  neighbours_4con, Label, BACKGROUND, WATERSHED_LINE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
  distance: u32,
  seq: usize,
  idx: (usize, usize),
}

impl Ord for QueueEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    //Largest distance first, then first-come first-served
    self.distance.cmp(&other.distance).then_with(|| other.seq.cmp(&self.seq))
  }
}

impl PartialOrd for QueueEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Max-priority queue of pixels keyed on their distance value. Entries with
/// equal distance come out in insertion order, which is exactly the order a
/// stable re-sort of a plain list after every insertion would give. Every pixel
/// can be queued at most once.
struct FloodQueue {
  heap: BinaryHeap<QueueEntry>,
  queued: nd::Array2<bool>,
  next_seq: usize,
}

impl FloodQueue {
  fn new(shape: (usize, usize)) -> Self {
    FloodQueue { heap: BinaryHeap::new(), queued: nd::Array2::from_elem(shape, false), next_seq: 0 }
  }

  fn push(&mut self, idx: (usize, usize), distance: u32) {
    if self.queued[idx] {
      return;
    }
    self.queued[idx] = true;
    self.heap.push(QueueEntry { distance, seq: self.next_seq, idx });
    self.next_seq += 1;
  }

  fn pop(&mut self) -> Option<(usize, usize)> {
    self.heap.pop().map(|entry| entry.idx)
  }
}

#[cfg(feature = "progress")]
fn set_up_bar(len: usize) -> indicatif::ProgressBar {
  const TEMPLATE: &str = "{spinner}[{elapsed}/{duration}] flooded {pos}/{len}{bar:60}";
  let bar = indicatif::ProgressBar::new(len as u64);
  if let Ok(style) = indicatif::ProgressStyle::with_template(TEMPLATE) {
    bar.set_style(style);
  }
  bar
}

/// Returns the watershed of `distance`, grown from the positive labels in
/// `markers`.
///
/// Only foreground pixels (distance > 0) are flooded. A pixel that borders
/// exactly one region joins it; a pixel that borders several regions becomes a
/// watershed line and is set to background in the output. The output therefore
/// only contains background (0) and the labels of the markers. If `markers`
/// holds no positive label, the output is all background.
///
/// Returns `ShapeMismatch` if `distance` and `markers` differ in shape.
pub fn watershed(
  distance: nd::ArrayView2<u32>,
  markers: nd::ArrayView2<Label>,
) -> Result<nd::Array2<Label>> {
  let shape = distance.dim();
  if markers.dim() != shape {
    return Err(SegmentationError::ShapeMismatch { expected: shape, found: markers.dim() });
  }
  let mut labels = markers.to_owned();
  let mut queue = FloodQueue::new(shape);
  let floodable = |labels: &nd::Array2<Label>, idx: (usize, usize)| {
    labels[idx] == BACKGROUND && distance[idx] > 0
  };

  #[cfg(feature = "progress")]
  let bar = set_up_bar(distance.iter().filter(|&&d| d > 0).count());

  //(1) Queue up all floodable pixels next to a marker
  for (idx, &marker) in markers.indexed_iter() {
    if marker <= BACKGROUND {
      continue;
    }
    for neighbour in neighbours_4con(&idx, shape) {
      if floodable(&labels, neighbour) {
        queue.push(neighbour, distance[neighbour]);
      }
    }
  }
  log::trace!("watershed queue seeded with {} pixels", queue.heap.len());

  /*(2) Flood pixels from the highest distance down
    Each pixel looks at the colours of its already coloured neighbours:
      - one colour: the pixel joins that region
      - several colours: two regions collide, the pixel becomes a wall
      - no colour: leave it alone (cannot happen, every queued pixel was
        queued by a coloured neighbour)
    Only a freshly coloured pixel adds its floodable neighbours to the queue.
    Walls do not spread.
  */
  let mut walls = 0usize;
  while let Some(idx) = queue.pop() {
    #[cfg(feature = "progress")]
    bar.inc(1);

    let neighbours = neighbours_4con(&idx, shape);
    let mut neigh_col: Vec<Label> =
      neighbours.iter().map(|&nb| labels[nb]).filter(|&col| col > BACKGROUND).collect();
    neigh_col.sort_unstable();
    neigh_col.dedup();

    match neigh_col.as_slice() {
      [] => {}
      [col] => labels[idx] = *col,
      _ => {
        labels[idx] = WATERSHED_LINE;
        walls += 1;
      }
    }

    if labels[idx] <= BACKGROUND {
      continue;
    }
    for neighbour in neighbours {
      if floodable(&labels, neighbour) {
        queue.push(neighbour, distance[neighbour]);
      }
    }
  }

  #[cfg(feature = "progress")]
  bar.finish_and_clear();

  //(3) Walls belong to no region
  labels.mapv_inplace(|col| if col == WATERSHED_LINE { BACKGROUND } else { col });
  log::debug!("watershed finished with {walls} watershed-line pixels");
  Ok(labels)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn colliding_fronts_leave_a_wall() {
    let distance = nd::arr2(&[[0u32; 7], [5, 4, 3, 2, 3, 4, 5], [0; 7]]);
    let mut markers = nd::Array2::<Label>::zeros((3, 7));
    markers[(1, 0)] = 1;
    markers[(1, 6)] = 2;

    let labels = watershed(distance.view(), markers.view()).unwrap();
    assert_eq!(labels.row(1).to_vec(), vec![1, 1, 1, 0, 2, 2, 2]);
    assert!(labels.row(0).iter().chain(labels.row(2).iter()).all(|&l| l == BACKGROUND));
  }

  #[test]
  fn ties_are_broken_by_insertion_order() {
    //All pixels between the markers have the same distance. The left front was
    //queued first, so it gets one pixel further before the fronts collide.
    let distance = nd::arr2(&[[3u32, 1, 1, 1, 1, 2]]);
    let mut markers = nd::Array2::<Label>::zeros((1, 6));
    markers[(0, 0)] = 1;
    markers[(0, 5)] = 2;

    let labels = watershed(distance.view(), markers.view()).unwrap();
    assert_eq!(labels, nd::arr2(&[[1, 1, 1, 0, 2, 2]]));
  }

  #[test]
  fn higher_distance_is_flooded_first() {
    let distance = nd::arr2(&[[1u32, 1, 9, 1, 1]]);
    let mut markers = nd::Array2::<Label>::zeros((1, 5));
    markers[(0, 0)] = 1;
    markers[(0, 3)] = 2;
    //Pixel 2 (distance 9) is claimed by region 2 before region 1 gets to pixel 1
    let labels = watershed(distance.view(), markers.view()).unwrap();
    assert_eq!(labels, nd::arr2(&[[1, 0, 2, 2, 2]]));
  }

  #[test]
  fn background_is_never_flooded() {
    let distance = nd::arr2(&[[2u32, 1, 0, 1, 2]]);
    let mut markers = nd::Array2::<Label>::zeros((1, 5));
    markers[(0, 0)] = 4;
    let labels = watershed(distance.view(), markers.view()).unwrap();
    assert_eq!(labels, nd::arr2(&[[4, 4, 0, 0, 0]]));
  }

  #[test]
  fn pixels_behind_a_wall_are_claimed_later() {
    //(1,2) becomes a wall before (0,2) has a coloured neighbour. Region 1 must
    //still reach (0,2) through the top row.
    let distance = nd::arr2(&[[1u32, 1, 9, 0, 1], [5, 3, 2, 3, 5], [0, 0, 0, 0, 0]]);
    let mut markers = nd::Array2::<Label>::zeros((3, 5));
    markers[(1, 0)] = 1;
    markers[(1, 4)] = 2;

    let labels = watershed(distance.view(), markers.view()).unwrap();
    assert_eq!(labels[(0, 2)], 1);
    assert_eq!(labels.row(0).to_vec(), vec![1, 1, 1, 0, 2]);
    assert_eq!(labels.row(1).to_vec(), vec![1, 1, 0, 2, 2]);
  }

  #[test]
  fn every_reachable_foreground_pixel_is_decided() {
    //A plus-shaped object with one marker: nothing may be left behind
    let distance = nd::arr2(&[[0u32, 1, 0], [1, 2, 1], [0, 1, 0]]);
    let mut markers = nd::Array2::<Label>::zeros((3, 3));
    markers[(1, 1)] = 1;
    let labels = watershed(distance.view(), markers.view()).unwrap();
    assert_eq!(labels, nd::arr2(&[[0, 1, 0], [1, 1, 1], [0, 1, 0]]));
  }

  #[test]
  fn mismatched_shapes_are_rejected() {
    let distance = nd::Array2::<u32>::ones((4, 5));
    let markers = nd::Array2::<Label>::zeros((5, 4));
    assert_eq!(
      watershed(distance.view(), markers.view()),
      Err(SegmentationError::ShapeMismatch { expected: (4, 5), found: (5, 4) })
    );
  }

  #[test]
  fn no_markers_means_no_labels() {
    let distance = nd::Array2::<u32>::from_elem((6, 6), 3);
    let markers = nd::Array2::<Label>::zeros((6, 6));
    assert!(watershed(distance.view(), markers.view()).unwrap().iter().all(|&l| l == BACKGROUND));
  }
}
