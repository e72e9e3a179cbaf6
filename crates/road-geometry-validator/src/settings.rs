use crate::CliError;
use clap::Parser;
use road_geometry_lib::{
    ComparisonConfig, DesignConstraints, IdealizerConfig, IdealizerMode, RoadClass, RoadContext,
    ValidatorConfig,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Road Geometry Validator - idealize as-built road alignments and report deviations
pub struct Settings {
    /// Alignment JSON files to validate
    #[clap(short, long, value_name = "FILE", required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Directory for the deviation tables and summary.json
    #[clap(short, long, value_name = "DIR", default_value = "reports")]
    pub output_dir: PathBuf,

    /// Idealizer mode (conservative or aggressive)
    #[clap(short, long, default_value = "conservative")]
    pub mode: IdealizerMode,

    /// Road class (highway, arterial, collector, local or any other name)
    #[clap(long)]
    pub road_class: Option<RoadClass>,

    /// Road context (urban or rural)
    #[clap(long)]
    pub context: Option<RoadContext>,

    /// Design speed in km/h
    #[clap(long)]
    pub design_speed: Option<f64>,

    /// Horizontal deviation tolerance in metres
    #[clap(long)]
    pub tolerance_horizontal: Option<f64>,

    /// Elevation deviation tolerance in metres
    #[clap(long)]
    pub tolerance_elevation: Option<f64>,

    /// Elevation smoothing blend factor (0-1)
    #[clap(long)]
    pub smoothing_factor: Option<f64>,

    /// Station step for the comparison in metres (minimum 0.5)
    #[clap(long, default_value = "1.0")]
    pub station_step: f64,

    /// JSON file with design constraints; command line values override it
    #[clap(long, value_name = "FILE")]
    pub constraints: Option<PathBuf>,

    /// Log debug output (ignored when RUST_LOG is set)
    #[clap(short, long, default_value = "false")]
    pub verbose: bool,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Design constraints from the optional file with command line overrides applied
    pub fn design_constraints(&self) -> Result<DesignConstraints, CliError> {
        let mut constraints = match &self.constraints {
            Some(path) => {
                let reader = BufReader::new(File::open(path)?);
                serde_json::from_reader(reader)?
            }
            None => DesignConstraints::default(),
        };

        if let Some(class) = &self.road_class {
            constraints.road_class = class.clone();
        }
        if let Some(context) = self.context {
            constraints.context = context;
        }
        if let Some(speed) = self.design_speed {
            constraints.design_speed_kph = speed;
        }
        if let Some(tolerance) = self.tolerance_horizontal {
            constraints.tolerance_horizontal_deviation = tolerance;
        }
        if let Some(tolerance) = self.tolerance_elevation {
            constraints.tolerance_elevation_deviation = tolerance;
        }
        if let Some(factor) = self.smoothing_factor {
            constraints.smoothing_factor = factor;
        }

        constraints.validate()?;
        Ok(constraints)
    }

    pub fn validator_config(&self) -> Result<ValidatorConfig, CliError> {
        Ok(ValidatorConfig {
            constraints: self.design_constraints()?,
            idealizer: IdealizerConfig::for_mode(self.mode),
            comparison: ComparisonConfig {
                station_step: self.station_step,
                ..ComparisonConfig::default()
            },
        })
    }
}
