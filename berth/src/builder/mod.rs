mod config;
mod dockerfile;
mod error;
mod launch;
mod layers;
mod spec;
mod variables;

pub use config::Config;
pub use dockerfile::{parse_dockerfile, render_dockerfile};
pub use error::{ConfigError, DockerfileError, SpecError};
pub use launch::LaunchCommand;
pub use layers::{LayerPlan, LayerState, PLAN_DIR};
pub use spec::BuildSpec;
