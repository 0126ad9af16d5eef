#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod error;
pub mod figure;
pub mod matrix;
pub mod palette;
pub mod plot;
pub mod render;
pub mod samples;
pub mod schema;

pub use config::{ConfigError, ImageFormat, RenderOptions};
pub use error::PositionalVarianceError;
pub use figure::{Figure, LegendEntry, Panel};
pub use matrix::{PositionalVarianceMatrix, PositionalVarianceSummary, StageBinning};
pub use palette::{ModelVariant, Rgb, SEVERITY_PALETTE, SeverityPalette};
pub use plot::{PositionalVarianceOutput, plot_positional_var, plot_positional_var_with_sink};
pub use render::{BitmapSink, MemorySink, RenderSink, SvgSink};
pub use samples::{PosteriorSamples, SubtypeProportions};
pub use schema::{Event, SeveritySchema};
