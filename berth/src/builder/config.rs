use crate::builder::variables::{Variables, VariablesFile, ENVIRONMENTS};
use crate::builder::{BuildSpec, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_context() -> String {
    ".".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

/// On-disk layout of `berth.yaml`.
#[derive(Debug, Clone, Deserialize)]
struct Descriptor {
    product: String,
    #[serde(default = "default_context")]
    context: String,
    #[serde(default = "default_dockerfile")]
    dockerfile: String,
    image: BuildSpec,
    #[serde(default)]
    variables: VariablesFile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    product_name: String,
    product_uri: String,
    environment: String,
    context_dir: PathBuf,
    dockerfile_path: PathBuf,
    docker_registry: Option<String>,
    spec: BuildSpec,
    variables: Variables,
}

impl Config {
    pub fn product_name(&self) -> &str {
        &self.product_name
    }
    pub fn product_uri(&self) -> &str {
        &self.product_uri
    }
    pub fn environment(&self) -> &str {
        &self.environment
    }
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }
    pub fn dockerfile_path(&self) -> &Path {
        &self.dockerfile_path
    }
    pub fn docker_registry(&self) -> Option<&str> {
        self.docker_registry.as_deref()
    }
    pub fn spec(&self) -> &BuildSpec {
        &self.spec
    }
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Loads the descriptor at `descriptor_path`. The build context and the
    /// Dockerfile location are resolved relative to the descriptor's directory.
    pub fn new(
        descriptor_path: &str,
        environment: &str,
        docker_registry: Option<String>,
    ) -> Result<Arc<Self>, ConfigError> {
        let contents = std::fs::read_to_string(descriptor_path).map_err(|source| ConfigError::Read {
            path: descriptor_path.to_string(),
            source,
        })?;
        let base_dir = Path::new(descriptor_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        Self::from_yaml(&contents, descriptor_path, base_dir, environment, docker_registry)
    }

    pub fn from_yaml(
        contents: &str,
        origin: &str,
        base_dir: &Path,
        environment: &str,
        docker_registry: Option<String>,
    ) -> Result<Arc<Self>, ConfigError> {
        let environment = environment.to_lowercase();
        if !ENVIRONMENTS.contains(&environment.as_str()) {
            return Err(ConfigError::InvalidEnvironment(environment));
        }

        let descriptor: Descriptor = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        let product_uri = slug::slugify(&descriptor.product);
        let context_dir = base_dir.join(&descriptor.context);
        let dockerfile_path = context_dir.join(&descriptor.dockerfile);

        Ok(Arc::new(Config {
            product_name: descriptor.product,
            product_uri,
            variables: Variables::new(descriptor.variables, &environment),
            environment,
            context_dir,
            dockerfile_path,
            docker_registry: docker_registry.filter(|r| !r.is_empty()),
            spec: descriptor.image,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
product: CLT Chatbot
context: ../..
dockerfile: products/clt-chatbot/Dockerfile
image:
  base_image: python:3.11-slim
  workdir: /app
  dependency_manifest: requirements.txt
  copy_steps:
    - { source: requirements.txt, destination: . }
    - { source: ., destination: . }
  install: [pip, install, --no-cache-dir, -r, requirements.txt]
  exposed_port: 8000
  entrypoint: [uvicorn, "main:app", --host, 0.0.0.0, --port, "8000"]
variables:
  dev:
    RUST_LOG: debug
"#;

    #[test]
    fn loads_descriptor_relative_to_its_directory() {
        let config = Config::from_yaml(
            DESCRIPTOR,
            "berth.yaml",
            Path::new("products/clt-chatbot"),
            "Dev",
            Some(String::new()),
        )
        .unwrap();

        assert_eq!(config.product_name(), "CLT Chatbot");
        assert_eq!(config.product_uri(), "clt-chatbot");
        assert_eq!(config.environment(), "dev");
        assert_eq!(config.context_dir(), Path::new("products/clt-chatbot/../.."));
        assert_eq!(
            config.dockerfile_path(),
            Path::new("products/clt-chatbot/../../products/clt-chatbot/Dockerfile")
        );
        assert_eq!(config.docker_registry(), None);
        assert_eq!(config.spec().exposed_port, 8000);
        assert_eq!(config.spec().entrypoint[1], "main:app");
        assert!(config.spec().build.is_empty());
        assert_eq!(config.variables().pairs(), vec!["RUST_LOG=debug"]);
    }

    #[test]
    fn rejects_unknown_environment() {
        let err = Config::from_yaml(DESCRIPTOR, "berth.yaml", Path::new("."), "qa", None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvironment(env) if env == "qa"));
    }

    #[test]
    fn reports_parse_errors_with_origin() {
        let err = Config::from_yaml("product: x\n", "broken.yaml", Path::new("."), "dev", None).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse broken.yaml"));
    }

    #[test]
    fn reports_missing_descriptor() {
        let err = Config::new("/nonexistent/berth.yaml", "dev", None).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn chatbot_image_toolchain_matches_workspace_rust_version() {
        let manifest = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/../Cargo.toml")).unwrap();
        let rust_version = manifest
            .lines()
            .find_map(|line| line.trim().strip_prefix("rust-version = "))
            .map(|v| v.trim_matches('"'))
            .unwrap();

        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../products/clt-chatbot/berth.yaml");
        let config = Config::new(path, "dev", None).unwrap();
        assert_eq!(config.spec().base_image, format!("rust:{}-slim", rust_version));

        let install = config.spec().install.join(" ");
        assert!(install.contains("CARGO_RESOLVER_INCOMPATIBLE_RUST_VERSIONS=fallback cargo fetch"));
    }

    #[test]
    fn chatbot_descriptor_is_clean() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../products/clt-chatbot/berth.yaml");
        let config = Config::new(path, "prod", None).unwrap();

        assert_eq!(config.product_uri(), "clt-chatbot");
        assert_eq!(config.spec().check(), vec![]);
        assert!(config.dockerfile_path().ends_with("products/clt-chatbot/Dockerfile"));
        assert_eq!(config.variables().pairs(), vec!["RUST_LOG=warn"]);
    }
}
