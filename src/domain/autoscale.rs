// Autoscale engine - derives chart axis bounds from the plotted data
use super::series::Series;
use serde::Serialize;

pub const TICK_COUNT: u32 = 6;

/// Relative padding added above and below the data on the Y axis.
const MARGIN_FRACTION: f64 = 0.1;
/// Padding used when the signal is (nearly) constant.
const FLAT_MARGIN: f64 = 0.01;
const FLAT_RANGE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartAxes {
    pub x: AxisRange,
    pub y: AxisRange,
    pub tick_count: u32,
}

impl Default for ChartAxes {
    fn default() -> Self {
        Self {
            x: AxisRange::default(),
            y: AxisRange::default(),
            tick_count: TICK_COUNT,
        }
    }
}

impl ChartAxes {
    /// Recompute both axes from `series`. An axis without enough data keeps
    /// its current bounds.
    pub fn rescale(&mut self, series: &Series) {
        if series.is_empty() {
            return;
        }
        if let Some(x) = x_range(series) {
            self.x = x;
        }
        if let Some(y) = y_range(series) {
            self.y = y;
        }
        self.tick_count = TICK_COUNT;
    }

    pub fn fitted(series: &Series) -> Self {
        let mut axes = Self::default();
        axes.rescale(series);
        axes
    }
}

/// Whole-unit X bounds spanning the first to the last point.
///
/// Needs at least two points.
pub fn x_range(series: &Series) -> Option<AxisRange> {
    if series.len() < 2 {
        return None;
    }
    let first = series.first()?;
    let last = series.last()?;
    Some(AxisRange::new(first.x.floor(), last.x.ceil()))
}

/// Y bounds covering every point plus a margin. Non-negative signals are
/// pinned to a zero baseline.
pub fn y_range(series: &Series) -> Option<AxisRange> {
    let (min_y, max_y) = series.y_extrema()?;

    let range = max_y - min_y;
    let margin = if range < FLAT_RANGE {
        FLAT_MARGIN
    } else {
        MARGIN_FRACTION * range
    };

    let mut new_min = min_y - margin;
    let new_max = max_y + margin;
    if new_min >= 0.0 && min_y >= 0.0 {
        new_min = 0.0;
    }

    Some(AxisRange::new(new_min, new_max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::Point;

    fn series(points: &[(f64, f64)]) -> Series {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn assert_close(actual: AxisRange, min: f64, max: f64) {
        assert!(
            (actual.min - min).abs() < 1e-9 && (actual.max - max).abs() < 1e-9,
            "expected [{min}, {max}], got [{}, {}]",
            actual.min,
            actual.max
        );
    }

    #[test]
    fn test_y_range_with_negative_values_is_not_clamped() {
        let range = y_range(&series(&[(0.0, 0.0), (1.0, 5.0), (2.0, -3.0)])).unwrap();
        assert_close(range, -3.8, 5.8);
    }

    #[test]
    fn test_y_range_non_negative_is_pinned_to_zero() {
        let range = y_range(&series(&[(0.0, 1.0), (1.0, 2.0)])).unwrap();
        assert_close(range, 0.0, 2.1);
    }

    #[test]
    fn test_y_range_single_point() {
        assert_close(y_range(&series(&[(0.0, 10.0)])).unwrap(), 0.0, 10.01);
        assert_close(y_range(&series(&[(0.0, -2.0)])).unwrap(), -2.01, -1.99);
    }

    #[test]
    fn test_y_range_margin_crossing_zero_is_kept() {
        // min_y >= 0 but the margin pushes below zero: no clamp.
        let range = y_range(&series(&[(0.0, 0.5), (1.0, 10.5)])).unwrap();
        assert_close(range, -0.5, 11.5);
    }

    #[test]
    fn test_x_range_needs_two_points() {
        assert_eq!(x_range(&series(&[(0.3, 1.0)])), None);
        assert_close(
            x_range(&series(&[(0.3, 1.0), (1.2, 1.0), (4.1, 2.0)])).unwrap(),
            0.0,
            5.0,
        );
    }

    #[test]
    fn test_rescale_keeps_x_until_two_points() {
        let mut axes = ChartAxes::default();
        axes.rescale(&series(&[(3.5, 4.0)]));

        assert_eq!(axes.x, AxisRange::new(0.0, 1.0));
        assert_close(axes.y, 0.0, 4.01);
        assert_eq!(axes.tick_count, 6);
    }

    #[test]
    fn test_rescale_of_empty_series_keeps_axes() {
        let mut axes = ChartAxes::fitted(&series(&[(0.0, 1.0), (2.0, 3.0)]));
        let before = axes;
        axes.rescale(&Series::default());

        assert_eq!(axes, before);
    }

    #[test]
    fn test_rescale_is_idempotent() {
        let data = series(&[(0.0, 1.0), (1.0, 1.5), (2.2, 0.7)]);
        let mut axes = ChartAxes::default();
        axes.rescale(&data);
        let once = axes;
        axes.rescale(&data);

        assert_eq!(axes, once);
    }
}
