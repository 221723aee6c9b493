// Series store - per-channel point history for the live charts
use super::telemetry::TelemetrySample;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A plotted quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Voltage,
    Current,
    Resistance,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Voltage, Channel::Current, Channel::Resistance];

    pub fn title(self) -> &'static str {
        match self {
            Channel::Voltage => "Voltage",
            Channel::Current => "Current",
            Channel::Resistance => "Resistance",
        }
    }

    pub fn x_label(self) -> &'static str {
        "Time (s)"
    }

    pub fn y_label(self) -> &'static str {
        match self {
            Channel::Voltage => "Voltage (V)",
            Channel::Current => "Current (A)",
            Channel::Resistance => "Resistance (Ω)",
        }
    }

    pub fn value_of(self, sample: &TelemetrySample) -> f64 {
        match self {
            Channel::Voltage => sample.voltage,
            Channel::Current => sample.current,
            Channel::Resistance => sample.resistance,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Voltage => 0,
            Channel::Current => 1,
            Channel::Resistance => 2,
        }
    }
}

/// Append-only point sequence, ordered by arrival.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<Point>,
}

impl Series {
    pub fn append(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Smallest and largest `y` over all points.
    pub fn y_extrema(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?;
        Some(
            self.points
                .iter()
                .fold((first.y, first.y), |(lo, hi), p| (lo.min(p.y), hi.max(p.y))),
        )
    }
}

impl FromIterator<Point> for Series {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// The three channel series of one session.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    series: [Series; 3],
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sample: &TelemetrySample) {
        for channel in Channel::ALL {
            self.series[channel.index()].append(Point::new(sample.time, channel.value_of(sample)));
        }
    }

    pub fn clear(&mut self) {
        self.series.iter_mut().for_each(Series::clear);
    }

    pub fn series(&self, channel: Channel) -> &Series {
        &self.series[channel.index()]
    }
}
