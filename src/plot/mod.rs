//! Terminal and file plotting.

pub mod ascii;
pub mod chart;

pub use ascii::render_series_plot;
pub use chart::{LineChart, Marker, write_svg_chart};
