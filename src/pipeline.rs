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

//! Configuration and execution of the full segmentation pipeline.

use ndarray as nd;

use crate::{
  binarize::{adaptive_threshold, binarize_at, box_filter},
  check_shape,
  components::label_components,
  distance::distance_transform,
  error::Result,
  markers::find_markers,
  morphology::{dilate, erode, KernelSize},
  relabel::{filter_and_relabel, Segmentation, DEFAULT_MIN_AREA},
  watershed::watershed,
  Label, FOREGROUND_PX,
};

/// Labelling variant used after binarization and cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
  /// Distance transform, marker detection and marker-driven watershed. Can
  /// separate touching objects.
  #[default]
  Watershed,
  /// Direct labelling of 4-connected foreground regions. Simpler, and robust
  /// when the distance map has no usable maxima.
  FloodFill,
}

/// Intermediate arrays produced by a labelling variant
#[derive(Debug, Clone, PartialEq)]
pub struct LabelHistory {
  /// Distance map (watershed variant only)
  pub distance: Option<nd::Array2<u32>>,
  /// Marker map (watershed variant only)
  pub markers: Option<nd::Array2<Label>>,
  /// Labels before size filtering and relabelling
  pub labels: nd::Array2<Label>,
}

/// Turns a cleaned binary mask into a (not yet filtered) label map. This trait
/// is dyn-safe, which means that trait objects may be constructed from it.
pub trait Labeler {
  /// The variant this labeler implements
  fn variant(&self) -> Variant;

  /// Returns the labels of `mask` together with all intermediate arrays.
  fn label_history(&self, mask: nd::ArrayView2<u8>) -> Result<LabelHistory>;

  /// Returns the labels of `mask`. Labels are not necessarily dense.
  fn label(&self, mask: nd::ArrayView2<u8>) -> Result<nd::Array2<Label>> {
    Ok(self.label_history(mask)?.labels)
  }
}

/// Watershed variant of the labelling stage.
///
/// # Artifacts and peculiarities
/// Markers are strict local maxima of the distance map. Objects whose distance
/// map peaks in a plateau (such as even-sized squares) get no marker and are
/// lost; elongated objects may get more than one marker and be split.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatershedLabeler;

impl Labeler for WatershedLabeler {
  fn variant(&self) -> Variant {
    Variant::Watershed
  }

  fn label_history(&self, mask: nd::ArrayView2<u8>) -> Result<LabelHistory> {
    let distance = distance_transform(mask);
    let (markers, _count) = find_markers(distance.view());
    let labels = watershed(distance.view(), markers.view())?;
    Ok(LabelHistory { distance: Some(distance), markers: Some(markers), labels })
  }
}

/// Flood-fill variant of the labelling stage
#[derive(Debug, Clone, Copy, Default)]
pub struct FloodFillLabeler;

impl Labeler for FloodFillLabeler {
  fn variant(&self) -> Variant {
    Variant::FloodFill
  }

  fn label_history(&self, mask: nd::ArrayView2<u8>) -> Result<LabelHistory> {
    let (labels, _areas) = label_components(mask);
    Ok(LabelHistory { distance: None, markers: None, labels })
  }
}

#[derive(Debug, Clone)]
/// Builder for configuring the segmentation pipeline.
///
/// Use `new_watershed()` or `new_flood_fill()` to pick a labelling variant, set
/// any other options and call `build()`. All options are validated by `build()`,
/// so a `Segmenter` never fails halfway through because of its configuration.
///
/// | option        | default           |
/// |---------------|-------------------|
/// | threshold     | adaptive (mean - 10) |
/// | kernel size   | 3                 |
/// | minimum area  | 500 px            |
/// | smoothing     | none              |
pub struct SegmentationBuilder {
  variant: Variant,
  threshold: Option<u8>,
  kernel_size: usize,
  min_area: usize,
  smoothing: Option<usize>,
}

impl Default for SegmentationBuilder {
  fn default() -> Self {
    SegmentationBuilder {
      variant: Variant::default(),
      threshold: None,
      kernel_size: KernelSize::DEFAULT.size(),
      min_area: DEFAULT_MIN_AREA,
      smoothing: None,
    }
  }
}

impl SegmentationBuilder {
  /// creates a new `SegmentationBuilder` configured for the watershed variant
  pub fn new_watershed() -> Self {
    SegmentationBuilder { variant: Variant::Watershed, ..Default::default() }
  }

  /// creates a new `SegmentationBuilder` configured for the flood-fill variant
  pub fn new_flood_fill() -> Self {
    SegmentationBuilder { variant: Variant::FloodFill, ..Default::default() }
  }

  /// Set the labelling variant
  pub fn set_variant(mut self, variant: Variant) -> Self {
    self.variant = variant;
    self
  }

  /// Use a fixed binarization threshold instead of the adaptive one. Pixels
  /// strictly darker than `threshold` become foreground.
  pub fn set_threshold(mut self, threshold: u8) -> Self {
    self.threshold = Some(threshold);
    self
  }

  /// Set the side length of the structuring element used for erosion and
  /// dilation. Must be odd.
  pub fn set_kernel_size(mut self, kernel_size: usize) -> Self {
    self.kernel_size = kernel_size;
    self
  }

  /// Set the minimum area (in pixels) an object needs to survive the size
  /// filter. A minimum area of zero keeps every object.
  pub fn set_min_area(mut self, min_area: usize) -> Self {
    self.min_area = min_area;
    self
  }

  /// Smooth the image with a box filter of the given (odd) size before
  /// binarization.
  pub fn set_smoothing(mut self, kernel_size: usize) -> Self {
    self.smoothing = Some(kernel_size);
    self
  }

  /// Build a `Segmenter` from the current builder configuration. Returns
  /// `InvalidKernelSize` if the structuring element or smoothing window does
  /// not have a positive odd size.
  pub fn build(self) -> Result<Segmenter> {
    let kernel = KernelSize::new(self.kernel_size)?;
    let smoothing = self.smoothing.map(KernelSize::new).transpose()?;
    let labeler: Box<dyn Labeler + Send + Sync> = match self.variant {
      Variant::Watershed => Box::new(WatershedLabeler),
      Variant::FloodFill => Box::new(FloodFillLabeler),
    };
    Ok(Segmenter { threshold: self.threshold, kernel, min_area: self.min_area, smoothing, labeler })
  }
}

/// All intermediate images of one run of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationStages {
  /// Smoothed input image, if smoothing was enabled
  pub smoothed: Option<nd::Array2<u8>>,
  /// Binarization threshold that was actually used
  pub threshold: f64,
  /// Binary mask straight after binarization
  pub binary: nd::Array2<u8>,
  /// Binary mask after erosion
  pub eroded: nd::Array2<u8>,
  /// Binary mask after erosion and dilation
  pub cleaned: nd::Array2<u8>,
  /// Distance map (watershed variant only)
  pub distance: Option<nd::Array2<u32>>,
  /// Marker map (watershed variant only)
  pub markers: Option<nd::Array2<Label>>,
  /// Final, filtered and relabelled output
  pub segmentation: Segmentation,
}

/// Configured segmentation pipeline. Obtain one from a `SegmentationBuilder`.
pub struct Segmenter {
  threshold: Option<u8>,
  kernel: KernelSize,
  min_area: usize,
  smoothing: Option<KernelSize>,
  labeler: Box<dyn Labeler + Send + Sync>,
}

impl std::fmt::Debug for Segmenter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Segmenter")
      .field("variant", &self.variant())
      .field("threshold", &self.threshold)
      .field("kernel", &self.kernel)
      .field("min_area", &self.min_area)
      .field("smoothing", &self.smoothing)
      .finish()
  }
}

impl Segmenter {
  /// Labelling variant of this pipeline
  pub fn variant(&self) -> Variant {
    self.labeler.variant()
  }

  /// Fixed binarization threshold, or `None` for the adaptive threshold
  pub fn threshold(&self) -> Option<u8> {
    self.threshold
  }

  /// Structuring element used for erosion and dilation
  pub fn kernel_size(&self) -> KernelSize {
    self.kernel
  }

  /// Minimum object area
  pub fn min_area(&self) -> usize {
    self.min_area
  }

  /// Segments `img` and returns the label map, object count and object areas.
  ///
  /// An image without objects is not an error; it results in a `Segmentation`
  /// with a count of zero. Returns `EmptyImage` if `img` has no pixels.
  pub fn segment(&self, img: nd::ArrayView2<u8>) -> Result<Segmentation> {
    Ok(self.segment_stages(img)?.segmentation)
  }

  /// Like `segment`, but also returns every intermediate image.
  pub fn segment_stages(&self, img: nd::ArrayView2<u8>) -> Result<SegmentationStages> {
    check_shape(&img)?;

    //(logging) make a new perfreport
    #[cfg(feature = "debug")]
    let mut perf = crate::performance_monitoring::PerfReport::default();
    #[cfg(feature = "debug")]
    let run_start = std::time::Instant::now();

    //(1) optional smoothing
    #[cfg(feature = "debug")]
    let stage_start = std::time::Instant::now();
    let smoothed = self.smoothing.map(|kernel| box_filter(img, kernel));
    let input = smoothed.as_ref().map_or(img.view(), |smooth| smooth.view());
    #[cfg(feature = "debug")]
    {
      perf.smoothing_ms = stage_start.elapsed().as_millis() as usize;
    }

    //(2) binarization
    #[cfg(feature = "debug")]
    let stage_start = std::time::Instant::now();
    let threshold = match self.threshold {
      Some(fixed) => fixed as f64,
      None => adaptive_threshold(input),
    };
    let binary = binarize_at(input, threshold);
    log::debug!(
      "binarized at threshold {threshold:.2}: {} foreground pixels",
      binary.iter().filter(|&&px| px == FOREGROUND_PX).count()
    );
    #[cfg(feature = "debug")]
    {
      perf.binarize_ms = stage_start.elapsed().as_millis() as usize;
    }

    //(3) erosion followed by dilation
    #[cfg(feature = "debug")]
    let stage_start = std::time::Instant::now();
    let eroded = erode(binary.view(), self.kernel);
    let cleaned = dilate(eroded.view(), self.kernel);
    log::debug!(
      "cleaned mask with a {} kernel: {} foreground pixels left",
      self.kernel,
      cleaned.iter().filter(|&&px| px == FOREGROUND_PX).count()
    );
    #[cfg(feature = "debug")]
    {
      perf.filter_ms = stage_start.elapsed().as_millis() as usize;
    }

    //(4) labelling
    #[cfg(feature = "debug")]
    let stage_start = std::time::Instant::now();
    let LabelHistory { distance, markers, labels } = self.labeler.label_history(cleaned.view())?;
    #[cfg(feature = "debug")]
    {
      perf.label_ms = stage_start.elapsed().as_millis() as usize;
    }

    //(5) size filter and relabel
    #[cfg(feature = "debug")]
    let stage_start = std::time::Instant::now();
    let segmentation = filter_and_relabel(labels.view(), self.min_area);
    #[cfg(feature = "debug")]
    {
      perf.relabel_ms = stage_start.elapsed().as_millis() as usize;
    }

    //(6) print performance report
    #[cfg(feature = "debug")]
    {
      perf.total_ms = run_start.elapsed().as_millis() as usize;
      log::debug!("{perf}");
    }

    Ok(SegmentationStages {
      smoothed,
      threshold,
      binary,
      eroded,
      cleaned,
      distance,
      markers,
      segmentation,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::SegmentationError;

  #[test]
  fn builder_defaults() {
    let segmenter = SegmentationBuilder::default().build().unwrap();
    assert_eq!(segmenter.variant(), Variant::Watershed);
    assert_eq!(segmenter.kernel_size(), KernelSize::DEFAULT);
    assert_eq!(segmenter.min_area(), 500);
    assert_eq!(segmenter.threshold(), None);
  }

  #[test]
  fn invalid_kernels_are_rejected_by_build() {
    let err = SegmentationBuilder::new_flood_fill().set_kernel_size(4).build().unwrap_err();
    assert_eq!(err, SegmentationError::InvalidKernelSize(4));
    let err = SegmentationBuilder::new_watershed().set_smoothing(0).build().unwrap_err();
    assert_eq!(err, SegmentationError::InvalidKernelSize(0));
  }

  #[test]
  fn empty_image_is_rejected() {
    let segmenter = SegmentationBuilder::new_flood_fill().build().unwrap();
    let img = nd::Array2::<u8>::zeros((3, 0));
    assert_eq!(
      segmenter.segment(img.view()),
      Err(SegmentationError::EmptyImage { rows: 3, cols: 0 })
    );
  }

  #[test]
  fn stages_are_recorded() {
    let mut img = nd::Array2::<u8>::from_elem((30, 30), 220);
    img.slice_mut(nd::s![5..16, 5..16]).fill(10);
    let segmenter = SegmentationBuilder::new_watershed().set_min_area(50).build().unwrap();
    let stages = segmenter.segment_stages(img.view()).unwrap();

    assert!(stages.smoothed.is_none());
    assert_eq!(stages.binary.iter().filter(|&&px| px == 1).count(), 121);
    assert_eq!(stages.eroded.iter().filter(|&&px| px == 1).count(), 81);
    assert_eq!(stages.cleaned, stages.binary);
    assert_eq!(stages.distance.as_ref().map(|dt| dt[(10, 10)]), Some(6));
    assert_eq!(stages.markers.as_ref().map(|m| m[(10, 10)]), Some(1));
    assert_eq!(stages.segmentation.count, 1);
    assert_eq!(stages.segmentation.areas, vec![779, 121]);
  }

  #[test]
  fn smoothed_image_is_binarized_and_kept() {
    let img = nd::Array2::<u8>::from_elem((9, 9), 100);
    let segmenter = SegmentationBuilder::new_flood_fill()
      .set_threshold(150)
      .set_smoothing(3)
      .set_min_area(1)
      .build()
      .unwrap();
    let stages = segmenter.segment_stages(img.view()).unwrap();

    assert_eq!(stages.smoothed.as_ref(), Some(&img));
    assert!(stages.binary.iter().all(|&px| px == 1));
    assert_eq!(stages.segmentation.count, 1);
    assert_eq!(stages.segmentation.area(1), Some(81));
  }

  #[test]
  fn flood_fill_has_no_distance_stage() {
    let img = nd::Array2::<u8>::from_elem((5, 5), 100);
    let segmenter = SegmentationBuilder::new_flood_fill().set_threshold(50).build().unwrap();
    let stages = segmenter.segment_stages(img.view()).unwrap();
    assert_eq!(stages.threshold, 50.0);
    assert!(stages.distance.is_none() && stages.markers.is_none());
    assert!(stages.segmentation.is_empty());
  }
}
