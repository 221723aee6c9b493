// Simulation session - owns the live series and their derived axes
use super::autoscale::ChartAxes;
use super::series::{Channel, Point, Series, SeriesStore};
use super::telemetry::{parse_line, MissingFieldPolicy, ParseError, TelemetrySample};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What changed on one chart after a sample was ingested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDelta {
    pub channel: Channel,
    pub point: Point,
    pub axes: ChartAxes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDelta {
    pub run: u64,
    pub sample: TelemetrySample,
    pub charts: Vec<ChartDelta>,
}

impl SessionDelta {
    #[cfg(test)]
    pub fn chart(&self, channel: Channel) -> Option<&ChartDelta> {
        self.charts.iter().find(|c| c.channel == channel)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSnapshot {
    pub channel: Channel,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub points: Vec<Point>,
    pub axes: ChartAxes,
}

impl ChartSnapshot {
    pub fn new(channel: Channel, series: &Series, axes: ChartAxes) -> Self {
        Self {
            channel,
            title: channel.title(),
            x_label: channel.x_label(),
            y_label: channel.y_label(),
            points: series.points().to_vec(),
            axes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub run: u64,
    pub started_at: Option<String>,
    pub samples: u64,
    pub rejected_lines: u64,
    pub charts: Vec<ChartSnapshot>,
}

pub struct Session {
    policy: MissingFieldPolicy,
    store: SeriesStore,
    axes: [ChartAxes; 3],
    run: u64,
    started_at: Option<DateTime<Utc>>,
    samples: u64,
    rejected_lines: u64,
}

impl Session {
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self {
            policy,
            store: SeriesStore::new(),
            axes: [ChartAxes::default(); 3],
            run: 0,
            started_at: None,
            samples: 0,
            rejected_lines: 0,
        }
    }

    /// Begin a new run: drop all data and restore the initial axes.
    pub fn reset(&mut self) -> u64 {
        self.store.clear();
        self.axes = [ChartAxes::default(); 3];
        self.run += 1;
        self.started_at = Some(Utc::now());
        self.samples = 0;
        self.rejected_lines = 0;
        self.run
    }

    /// Decode one line of simulator output and fold it into the charts.
    ///
    /// Blank lines produce no delta. Rejected lines are counted.
    pub fn ingest(&mut self, line: &str) -> Result<Option<SessionDelta>, ParseError> {
        match parse_line(line, self.policy) {
            Ok(Some(sample)) => Ok(Some(self.ingest_sample(sample))),
            Ok(None) => Ok(None),
            Err(e) => {
                self.rejected_lines += 1;
                Err(e)
            }
        }
    }

    pub fn ingest_sample(&mut self, sample: TelemetrySample) -> SessionDelta {
        self.store.append(&sample);
        self.samples += 1;

        let charts = Channel::ALL
            .iter()
            .map(|&channel| {
                let axes = &mut self.axes[channel.index()];
                axes.rescale(self.store.series(channel));
                ChartDelta {
                    channel,
                    point: Point::new(sample.time, channel.value_of(&sample)),
                    axes: *axes,
                }
            })
            .collect();

        SessionDelta {
            run: self.run,
            sample,
            charts,
        }
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn rejected_lines(&self) -> u64 {
        self.rejected_lines
    }

    pub fn series(&self, channel: Channel) -> &Series {
        self.store.series(channel)
    }

    pub fn axes(&self, channel: Channel) -> ChartAxes {
        self.axes[channel.index()]
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            run: self.run,
            started_at: self.started_at.map(|t| t.to_rfc3339()),
            samples: self.samples,
            rejected_lines: self.rejected_lines,
            charts: Channel::ALL
                .iter()
                .map(|&c| ChartSnapshot::new(c, self.series(c), self.axes(c)))
                .collect(),
        }
    }
}
