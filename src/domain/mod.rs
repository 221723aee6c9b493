// Domain layer - telemetry decoding, chart data and autoscaling
pub mod autoscale;
pub mod dataset;
pub mod series;
pub mod session;
pub mod telemetry;
