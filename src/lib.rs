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

#![doc(
  html_logo_url = "https://raw.githubusercontent.com/smups/rustronomy/main/logos/Rustronomy_ferris.png?raw=true"
)]
//! Rustronomy-segmentation is a pure-rust implementation of a classical
//! morphological object segmentation pipeline. It finds dark objects on a light
//! background in a grayscale image without any user-provided boundaries, and
//! returns a label map in which every object carries its own label.
//!
//! # Features
//! The pipeline consists of the following stages, each of which is also
//! available as a free function in its own module:
//! 1. *binarization* with an adaptive (mean - 10) or fixed threshold (`binarize`)
//! 2. *cleaning* of the binary mask with an erosion followed by a dilation over a
//! square structuring element (`morphology`)
//! 3. one of two labelling variants:
//!     - the *watershed* variant computes a Manhattan distance transform of the
//!     mask (`distance`), seeds one region per strict local maximum of the
//!     distance map (`markers`) and floods the mask from those seeds in order of
//!     decreasing distance (`watershed`). Touching objects are separated along
//!     the lines where their regions meet.
//!     - the *flood fill* variant labels the 4-connected regions of the mask
//!     directly (`components`).
//! 4. *size filtering* of the labelled regions and canonical renumbering of the
//! survivors to `1..=count` (`relabel`).
//!
//! In addition, the `contour` module can trace the boundary of a segmented
//! object and describe it with a Freeman chain code.
//!
//! # Quickstart
//! To use the latest release of Rustronomy-segmentation in a cargo project, add
//! the rustronomy-segmentation crate as a dependency to your `Cargo.toml` file:
//! ```toml
//! [dependencies]
//! rustronomy-segmentation = "0.1.0"
//! ```
//!
//! ## Short example: counting two dark squares
//! `rustronomy-segmentation` uses the "builder pattern" to configure the
//! pipeline before running it. Create a `SegmentationBuilder`, set the options
//! you need and call `build()` to obtain a (`Sync`&`Send`) `Segmenter`, which
//! checks the whole configuration up front.
//! ```rust
//! use rustronomy_segmentation::prelude::*;
//!
//! //Two dark 21x21 squares on a light background
//! let mut img = nd::Array2::<u8>::from_elem((60, 60), 200);
//! img.slice_mut(nd::s![5..26, 5..26]).fill(20);
//! img.slice_mut(nd::s![32..53, 30..51]).fill(20);
//!
//! //Set-up the pipeline
//! let segmenter = SegmentationBuilder::new_watershed().set_min_area(100).build().unwrap();
//!
//! //Run it
//! let result = segmenter.segment(img.view()).unwrap();
//! assert_eq!(result.count, 2);
//! assert_eq!(result.area(1), Some(441));
//! ```
//!
//! # Logging
//! All stages report what they did through the [`log`](https://docs.rs/log)
//! facade at the `debug` and `trace` levels. No logger is installed by this
//! crate.
//!
//! # Cargo feature gates
//! *By default, all features behind cargo feature gates are **disabled***
//! - `jemalloc`: this feature enables the [jemalloc allocator](https://jemalloc.net).
//! To compile `rustronomy-segmentation` with the `jemalloc` feature, jemalloc
//! must be installed on the host system.
//! - `parallel`: runs the structuring-element filters on the rayon thread pool.
//! The output is identical to the sequential version; all other stages are
//! inherently sequential.
//! - `progress`: this feature enables a progress bar for the watershed flood.
//! Enabling this feature adds the `indicatif` crate as a dependency.
//! - `debug`: this feature enables per-stage performance monitoring. The timing
//! report is emitted with `log::debug!`.

//Unconditional imports
use ndarray as nd;

//Set Jemalloc as the global allocator for this crate
#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

pub mod binarize;
pub mod components;
pub mod contour;
pub mod distance;
pub mod error;
pub mod markers;
pub mod morphology;
pub mod pipeline;
pub mod relabel;
pub mod watershed;

/// Integer type of label maps and marker maps
pub type Label = i32;

//Constants for labels
/// Label of background pixels
pub const BACKGROUND: Label = 0;
/// Label of pixels where two watershed regions meet. It never appears in the
/// output of any function in this crate.
pub const WATERSHED_LINE: Label = -1;

//Constants for binary masks
/// Foreground (object) value of a binary mask
pub const FOREGROUND_PX: u8 = 1;
/// Background value of a binary mask
pub const BACKGROUND_PX: u8 = 0;

//Utility prelude for batch import
pub mod prelude {
  pub use crate::{
    error::{Result, SegmentationError},
    morphology::KernelSize,
    pipeline::{Labeler, SegmentationBuilder, SegmentationStages, Segmenter, Variant},
    relabel::Segmentation,
    Label,
  };
  pub use ndarray as nd;
}

////////////////////////////////////////////////////////////////////////////////
//                              HELPER FUNCTIONS                              //
////////////////////////////////////////////////////////////////////////////////

/// Returns the 4-connected neighbours of `index` that lie within `shape`, in the
/// order up, down, left, right.
#[inline]
pub(crate) fn neighbours_4con(index: &(usize, usize), shape: (usize, usize)) -> Vec<(usize, usize)> {
  let (x, y): (isize, isize) = (index.0 as isize, index.1 as isize);
  [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
    .iter()
    .filter_map(|&(x, y)| {
      if x < 0 || y < 0 || x as usize >= shape.0 || y as usize >= shape.1 {
        None
      } else {
        Some((x as usize, y as usize))
      }
    })
    .collect()
}

/// Returns an error if `img` has a zero-length dimension
pub(crate) fn check_shape<T>(img: &nd::ArrayView2<T>) -> error::Result<()> {
  let (rows, cols) = img.dim();
  if rows == 0 || cols == 0 {
    Err(error::SegmentationError::EmptyImage { rows, cols })
  } else {
    Ok(())
  }
}

////////////////////////////////////////////////////////////////////////////////
//                             OPTIONAL MODULES                               //
////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "debug")]
mod performance_monitoring {

  #[derive(Clone, Debug, Default)]
  pub struct PerfReport {
    pub smoothing_ms: usize,
    pub binarize_ms: usize,
    pub filter_ms: usize,
    pub label_ms: usize,
    pub relabel_ms: usize,
    pub total_ms: usize,
  }

  impl PerfReport {
    pub fn stage_total(&self) -> usize {
      self.smoothing_ms + self.binarize_ms + self.filter_ms + self.label_ms + self.relabel_ms
    }
  }

  impl std::fmt::Display for PerfReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      writeln!(f, ">---------[Performance Summary]---------")?;
      writeln!(f, ">  Smoothing: {}ms", self.smoothing_ms)?;
      writeln!(f, ">  Binarization: {}ms", self.binarize_ms)?;
      writeln!(f, ">  Erosion & dilation: {}ms", self.filter_ms)?;
      writeln!(f, ">  Labelling: {}ms", self.label_ms)?;
      writeln!(f, ">  Size filter & relabel: {}ms", self.relabel_ms)?;
      writeln!(f, ">--------------------------------+ total")?;
      write!(
        f,
        ">  {}ms with {}ms overhead (Δt)",
        self.total_ms,
        self.total_ms.saturating_sub(self.stage_total())
      )
    }
  }
}
