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

//! Boundary tracing and Freeman chain codes of segmented objects.
//!
//! Chain codes describe a closed boundary as a sequence of unit steps. The eight
//! step directions are numbered counter-clockwise starting east (the row axis
//! points down, so "north" decreases the row index):
//! ```text
//!   3 2 1
//!   4 . 0
//!   5 6 7
//! ```

use ndarray as nd;

use crate::{
  error::{Result, SegmentationError},
  Label, BACKGROUND, BACKGROUND_PX, FOREGROUND_PX,
};

/// (row, col) offsets of the eight Freeman directions
pub const MOVES: [(isize, isize); 8] =
  [(0, 1), (-1, 1), (-1, 0), (-1, -1), (0, -1), (1, -1), (1, 0), (1, 1)];

/// Returns the first foreground pixel of `mask` in row-major order
pub fn first_foreground(mask: nd::ArrayView2<u8>) -> Option<(usize, usize)> {
  mask.indexed_iter().find(|&(_idx, &px)| px != BACKGROUND_PX).map(|(idx, _px)| idx)
}

/// Traces the outer boundary of the 8-connected object that contains the first
/// foreground pixel of `mask` (Moore-neighbour tracing).
///
/// The boundary is walked counter-clockwise and returned as a closed path: the
/// first and last entries are both the starting pixel. A single-pixel object
/// yields a path of length one, an empty mask an empty path.
pub fn trace_boundary(mask: nd::ArrayView2<u8>) -> Vec<(usize, usize)> {
  let Some(start) = first_foreground(mask) else {
    return Vec::new();
  };

  let (rows, cols) = mask.dim();
  let is_foreground = |(row, col): (usize, usize), dir: usize| -> Option<(usize, usize)> {
    let (dr, dc) = MOVES[dir];
    let (row, col) = (row as isize + dr, col as isize + dc);
    if row < 0 || col < 0 || row >= rows as isize || col >= cols as isize {
      return None;
    }
    let idx = (row as usize, col as usize);
    if mask[idx] != BACKGROUND_PX {
      Some(idx)
    } else {
      None
    }
  };

  /*
    Arriving in a pixel while moving in direction `dir`, the search for the next
    boundary pixel starts just "behind" the pixel we came from and turns
    counter-clockwise. Starting at the first row-major pixel (whose west, north-
    west, north and north-east neighbours are all background) we pretend to have
    arrived moving south-east.
  */
  let step = |pos: (usize, usize), dir: usize| -> Option<((usize, usize), usize)> {
    let first_dir = if dir % 2 == 0 { (dir + 7) % 8 } else { (dir + 6) % 8 };
    (0..8)
      .map(|turn| (first_dir + turn) % 8)
      .find_map(|dir| is_foreground(pos, dir).map(|next| (next, dir)))
  };

  let mut boundary = vec![start];
  let Some(first_move) = step(start, 7) else {
    return boundary;
  };

  //A boundary pixel can be passed at most four times
  let max_steps = 4 * mask.len() + 1;
  let (mut pos, mut dir) = first_move;
  for _ in 0..max_steps {
    let Some(next_move) = step(pos, dir) else {
      break;
    };
    if pos == start && next_move == first_move {
      break;
    }
    boundary.push(pos);
    (pos, dir) = next_move;
  }
  boundary.push(start);
  boundary
}

/// Returns the Freeman chain code of a path of pixels. Steps between pixels
/// that are not 8-neighbours have no code and are skipped.
pub fn chain_code(path: &[(usize, usize)]) -> Vec<u8> {
  path
    .windows(2)
    .filter_map(|pair| {
      let dr = pair[1].0 as isize - pair[0].0 as isize;
      let dc = pair[1].1 as isize - pair[0].1 as isize;
      MOVES.iter().position(|&mv| mv == (dr, dc)).map(|code| code as u8)
    })
    .collect()
}

/// Returns the chain code of the outer boundary of the object with the given
/// label, starting at the object's first pixel in row-major order.
pub fn object_chain_code(labels: nd::ArrayView2<Label>, label: Label) -> Result<Vec<u8>> {
  if label <= BACKGROUND || !labels.iter().any(|&col| col == label) {
    return Err(SegmentationError::UnknownLabel(label));
  }
  let mask = labels.mapv(|col| if col == label { FOREGROUND_PX } else { BACKGROUND_PX });
  Ok(chain_code(&trace_boundary(mask.view())))
}
