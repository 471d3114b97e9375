use thiserror::Error;

/// A violated descriptor invariant. `BuildSpec::check` reports every one it
/// finds; a build refuses to start while any remain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("workdir must be an absolute path, got `{0}`")]
    RelativeWorkdir(String),
    #[error("exposed port must be between 1 and 65535")]
    InvalidExposedPort,
    #[error("no copy step copies the dependency manifest `{0}`")]
    MissingManifestCopy(String),
    #[error("dependency manifest `{manifest}` is copied at step {manifest_step}, after the full source copy at step {source_step}")]
    ManifestCopyOrder {
        manifest: String,
        manifest_step: usize,
        source_step: usize,
    },
    #[error("no dependency install command declared")]
    MissingInstall,
    #[error("launch command is empty")]
    EmptyEntrypoint,
    #[error("launch command does not pass a bind port")]
    MissingBindPort,
    #[error("launch command port `{0}` is not a valid port")]
    InvalidBindPort(String),
    #[error("exposed port {exposed} does not match launch command port {bound}")]
    PortMismatch { exposed: u16, bound: u16 },
    #[error("launch command does not pass a bind host")]
    MissingBindHost,
    #[error("bind host `{0}` is not a wildcard address")]
    NotWildcard(String),
    #[error("base image `{0}` is not pinned to a version")]
    UnpinnedBaseImage(String),
}

#[derive(Debug, Error)]
pub enum DockerfileError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("line {0}: multi-stage builds are not supported")]
    MultiStage(usize),
    #[error("missing {0} instruction")]
    MissingInstruction(&'static str),
    #[error("cannot tell which COPY brings in the dependency manifest")]
    UnknownManifest,
    #[error("failed rendering Dockerfile: {0}")]
    Render(#[from] tera::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid environment `{0}`, expected one of dev, staging, prod")]
    InvalidEnvironment(String),
}
