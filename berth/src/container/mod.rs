pub mod docker;
pub mod probe;
pub mod status;

pub use docker::{plan_layers, report_layers, write_dockerfile, DockerImage};
pub use probe::probe;
