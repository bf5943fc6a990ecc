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

//! Error type shared by all stages of the segmentation pipeline.

use crate::Label;
use thiserror::Error;

/// Errors that can be produced by the segmentation pipeline. Note that an
/// image without objects is *not* an error: it simply yields zero labels.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
  /// Structuring elements have to be odd-sized squares with a side of at least 1
  #[error("kernel size must be a positive odd integer, got {0}")]
  InvalidKernelSize(usize),

  /// Input image with a zero-length dimension
  #[error("input image has a zero-length dimension ({rows}x{cols})")]
  EmptyImage { rows: usize, cols: usize },

  /// Pixel value that cannot be represented as an 8-bit intensity
  #[error("pixel ({row}, {col}) has value {value}, which is outside the intensity range [0, 255]")]
  IntensityOutOfRange { row: usize, col: usize, value: f64 },

  /// Two arrays that have to describe the same image differ in shape
  #[error("array shapes differ: expected {expected:?}, got {found:?}")]
  ShapeMismatch { expected: (usize, usize), found: (usize, usize) },

  /// Label that does not occur in the label map
  #[error("label {0} does not occur in the label map")]
  UnknownLabel(Label),
}

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmentationError>;
