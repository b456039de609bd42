use tracing::debug;

/// Natural size of a loaded image in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDims {
    pub width: f32,
    pub height: f32,
}

impl ImageDims {
    /// Returns `None` for zero, negative or non-finite sizes.
    pub fn new(width: f32, height: f32) -> Option<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if valid(width) && valid(height) {
            Some(Self { width, height })
        } else {
            None
        }
    }
}

/// Chosen grid shape and cell size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutResult {
    pub cell_width: u32,
    pub cell_height: u32,
    pub cols: u32,
    pub rows: u32,
}

/// Configuration for the best-fit grid search.
///
/// All images are assumed to share one aspect ratio, taken from the first
/// image whose natural size is known.
#[derive(Debug, Clone)]
pub struct GridLayout {
    /// Size assumed before any image has loaded (default: 512x512)
    pub fallback: ImageDims,
    /// Result returned for an empty batch
    pub empty: LayoutResult,
    /// Gap between neighbouring cells (default: 0)
    pub spacing: f32,
    /// Border drawn around each cell, both sides together (default: 0)
    pub cell_frame: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            fallback: ImageDims {
                width: 512.0,
                height: 512.0,
            },
            empty: LayoutResult {
                cell_width: 200,
                cell_height: 200,
                cols: 1,
                rows: 1,
            },
            spacing: 0.0,
            cell_frame: 0.0,
        }
    }
}

impl GridLayout {
    fn sanitize_extent(value: f32) -> f32 {
        if value.is_finite() && value > 0.0 {
            value.max(1.0)
        } else {
            1.0
        }
    }

    /// Space left for image content along one axis holding `cells` cells.
    fn content_extent(&self, extent: f32, cells: usize) -> f32 {
        let gutters = (cells - 1) as f32 * self.spacing.max(0.0)
            + cells as f32 * self.cell_frame.max(0.0);
        (extent - gutters).max(1.0)
    }

    /// Picks the column count that maximizes total displayed image area.
    ///
    /// # Algorithm
    /// 1. Take the first known image size as representative (fallback 512x512).
    /// 2. For every `cols` in `1..=N`, derive `rows = ceil(N / cols)` and the
    ///    uniform scale `min(W / cols / w, H / rows / h, 1)`, where `W` and
    ///    `H` exclude the spacing and cell frames of that shape.
    /// 3. Keep the candidate with the largest `N * (w * scale) * (h * scale)`.
    ///    Candidates are visited in increasing `cols` and compared with `>`,
    ///    so ties keep the fewest columns.
    ///
    /// # Arguments
    /// * `images` - One entry per image; `None` while its size is unknown
    /// * `available_width` / `available_height` - Grid area in pixels
    pub fn compute(
        &self,
        images: &[Option<ImageDims>],
        available_width: f32,
        available_height: f32,
    ) -> LayoutResult {
        if images.is_empty() {
            return self.empty;
        }

        let image = images
            .iter()
            .flatten()
            .next()
            .copied()
            .unwrap_or(self.fallback);
        let width = Self::sanitize_extent(available_width);
        let height = Self::sanitize_extent(available_height);
        let count = images.len();

        let mut best_area = 0.0f32;
        let mut best = self.empty;

        for cols in 1..=count {
            let rows = count.div_ceil(cols);
            let scale_x = self.content_extent(width, cols) / cols as f32 / image.width;
            let scale_y = self.content_extent(height, rows) / rows as f32 / image.height;
            let scale = scale_x.min(scale_y).min(1.0);

            let cell_w = image.width * scale;
            let cell_h = image.height * scale;
            let area = cell_w * cell_h * count as f32;

            if area > best_area {
                best_area = area;
                best = LayoutResult {
                    cell_width: (cell_w.round() as u32).max(1),
                    cell_height: (cell_h.round() as u32).max(1),
                    cols: cols as u32,
                    rows: rows as u32,
                };
            }
        }

        debug!(
            "grid layout: {} images in {:.0}x{:.0} -> {}x{} cells of {}x{}",
            count, width, height, best.cols, best.rows, best.cell_width, best.cell_height
        );
        best
    }
}

/// Natural sizes learned so far for the images of the live batch.
///
/// Failed loads simply never report, so they never influence the layout.
#[derive(Debug, Clone, Default)]
pub struct ImageSizes {
    sizes: Vec<Option<ImageDims>>,
}

impl ImageSizes {
    /// Forget everything and expect `count` images.
    pub fn reset(&mut self, count: usize) {
        self.sizes.clear();
        self.sizes.resize(count, None);
    }

    /// Record the natural size of image `index`. Returns false if nothing changed.
    pub fn record(&mut self, index: usize, width: u32, height: u32) -> bool {
        let Some(slot) = self.sizes.get_mut(index) else {
            return false;
        };
        let dims = ImageDims::new(width as f32, height as f32);
        if dims.is_none() || *slot == dims {
            return false;
        }
        *slot = dims;
        true
    }

    pub fn as_slice(&self) -> &[Option<ImageDims>] {
        &self.sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: f32, height: f32) -> Option<ImageDims> {
        ImageDims::new(width, height)
    }

    fn batch(count: usize, width: f32, height: f32) -> Vec<Option<ImageDims>> {
        vec![dims(width, height); count]
    }

    #[test]
    fn test_empty_batch_returns_default() {
        let layout = GridLayout::default();
        let result = layout.compute(&[], 800.0, 600.0);
        assert_eq!(result, layout.empty);
        assert_eq!((result.cols, result.rows), (1, 1));
    }

    #[test]
    fn test_grid_always_fits_every_image() {
        let layout = GridLayout::default();
        let shapes = [(512.0, 512.0), (1920.0, 1080.0), (768.0, 1344.0), (3000.0, 200.0)];
        for count in 1..=16 {
            for &(w, h) in &shapes {
                for &(aw, ah) in &[(752.0, 260.0), (300.0, 900.0), (1800.0, 1000.0)] {
                    let result = layout.compute(&batch(count, w, h), aw, ah);
                    assert!(result.cols >= 1 && result.cols as usize <= count);
                    assert!((result.cols * result.rows) as usize >= count);
                }
            }
        }
    }

    #[test]
    fn test_never_upscales_beyond_native() {
        let layout = GridLayout::default();
        let result = layout.compute(&batch(2, 256.0, 128.0), 4000.0, 4000.0);
        assert_eq!((result.cell_width, result.cell_height), (256, 128));
        assert_eq!(result.cols, 1);
    }

    #[test]
    fn test_wide_viewport_prefers_single_row() {
        let layout = GridLayout::default();
        let result = layout.compute(&batch(4, 512.0, 512.0), 2000.0, 500.0);
        assert_eq!((result.cols, result.rows), (4, 1));
        assert_eq!(result.cell_width, 500);
    }

    #[test]
    fn test_tall_viewport_prefers_single_column() {
        let layout = GridLayout::default();
        let result = layout.compute(&batch(3, 512.0, 512.0), 400.0, 1500.0);
        assert_eq!((result.cols, result.rows), (1, 3));
        assert_eq!(result.cell_width, 400);
    }

    #[test]
    fn test_ties_keep_fewest_columns() {
        // Both cols = 2 and cols = 3 are capped at native size; area is equal.
        let layout = GridLayout::default();
        let result = layout.compute(&batch(3, 100.0, 100.0), 1000.0, 1000.0);
        assert_eq!(result.cols, 1);
        assert_eq!((result.cell_width, result.cell_height), (100, 100));
    }

    #[test]
    fn test_unknown_sizes_use_fallback() {
        let layout = GridLayout::default();
        let result = layout.compute(&[None, None], 2000.0, 2000.0);
        assert_eq!((result.cell_width, result.cell_height), (512, 512));
    }

    #[test]
    fn test_first_loaded_image_is_representative() {
        let layout = GridLayout::default();
        let images = vec![None, dims(1000.0, 500.0), dims(100.0, 1000.0)];
        let result = layout.compute(&images, 3000.0, 3000.0);
        assert_eq!((result.cell_width, result.cell_height), (1000, 500));
    }

    #[test]
    fn test_invalid_viewport_is_sanitized() {
        let layout = GridLayout::default();
        let result = layout.compute(&batch(2, 512.0, 512.0), f32::NAN, -10.0);
        assert!(result.cell_width >= 1 && result.cell_height >= 1);
        assert!(result.cols * result.rows >= 2);
    }

    #[test]
    fn test_image_sizes_ignore_out_of_range_and_invalid() {
        let mut sizes = ImageSizes::default();
        sizes.reset(2);
        assert!(!sizes.record(5, 100, 100));
        assert!(!sizes.record(0, 0, 100));
        assert!(sizes.record(1, 640, 480));
        assert!(!sizes.record(1, 640, 480));
        assert_eq!(sizes.as_slice().iter().flatten().count(), 1);
        assert_eq!(sizes.as_slice()[0], None);
    }

    #[test]
    fn test_spacing_and_frames_fit_inside_area() {
        let layout = GridLayout {
            spacing: 8.0,
            cell_frame: 4.0,
            ..GridLayout::default()
        };
        let result = layout.compute(&batch(4, 512.0, 512.0), 552.0, 260.0);
        assert_eq!((result.cols, result.rows), (4, 1));
        assert_eq!(result.cell_width, 128);

        let total_width = result.cols * (result.cell_width + 4) + (result.cols - 1) * 8;
        let total_height = result.rows * (result.cell_height + 4) + (result.rows - 1) * 8;
        assert!(total_width <= 552);
        assert!(total_height <= 260);

        // Without the allowance the same batch overflows by the gutters.
        let bare = GridLayout::default().compute(&batch(4, 512.0, 512.0), 552.0, 260.0);
        assert_eq!(bare.cell_width, 138);
    }
}
