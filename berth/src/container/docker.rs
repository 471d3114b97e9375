use super::probe::ensure_port_available;
use super::status::Status;
use crate::builder::{render_dockerfile, Config, LayerPlan, LayerState, PLAN_DIR};
use crate::dockerignore::DockerIgnore;
use crate::toolchain::ToolchainContext;
use crate::utils::{pipe_output, run_command};
use colored::{ColoredString, Colorize};
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct DockerImage {
    config: Arc<Config>,
    toolchain: Arc<ToolchainContext>,
    tag: String,
}

/// Prints one line per layer saying whether the last build can reuse it.
pub fn report_layers(plan: &LayerPlan, previous: Option<&LayerPlan>) {
    for (layer, state) in plan.compare(previous) {
        let marker = match state {
            LayerState::Cached => "cached ".green(),
            LayerState::Rebuilt => "rebuild".yellow(),
        };
        println!("  {} {}  {}", marker, &layer.key[..12], layer.instruction);
    }
}

/// Writes the Dockerfile for the descriptor's image and returns its path.
pub fn write_dockerfile(config: &Config) -> Result<PathBuf, String> {
    let contents = render_dockerfile(config.spec(), config.product_name()).map_err(|e| e.to_string())?;
    let path = config.dockerfile_path().to_path_buf();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    }
    fs::write(&path, contents).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// The layer plan for the current context, next to the one recorded by the
/// last successful build.
pub fn plan_layers(config: &Config) -> Result<(LayerPlan, Option<LayerPlan>), String> {
    let context_dir = config.context_dir();
    let ignore = DockerIgnore::load(context_dir);
    if !ignore.ignores(PLAN_DIR) {
        warn!(
            "{} does not ignore {}; docker will see the saved layer plan as a context change",
            context_dir.join(".dockerignore").display(),
            PLAN_DIR
        );
    }
    let plan = LayerPlan::compute(config.spec(), context_dir, &ignore)
        .map_err(|e| format!("Failed to hash build context {}: {}", context_dir.display(), e))?;
    Ok((plan, LayerPlan::load(context_dir)))
}

impl DockerImage {
    pub fn new(config: Arc<Config>, toolchain: Arc<ToolchainContext>, tag: String) -> Self {
        DockerImage { config, toolchain, tag }
    }

    pub fn image_name(&self) -> &str {
        self.config.product_uri()
    }

    pub fn tagged_image_name(&self) -> String {
        format!("{}:{}", self.image_name(), self.tag)
    }

    /// Reference the image is pushed under.
    pub fn identifier(&self) -> String {
        match self.config.docker_registry() {
            Some(registry) => format!("{}/{}", registry.trim_end_matches('/'), self.tagged_image_name()),
            None => self.tagged_image_name(),
        }
    }

    fn label(&self, action: &str) -> ColoredString {
        format!("{} {}", self.config.product_uri(), action).white().bold()
    }

    pub async fn build(&self) -> Result<String, String> {
        let findings = self.config.spec().check();
        if !findings.is_empty() {
            let lines = findings.iter().map(|f| format!("  - {}", f)).collect::<Vec<_>>();
            return Err(format!(
                "Refusing to build {}, the descriptor is invalid:\n{}",
                self.config.product_name(),
                lines.join("\n")
            ));
        }

        let dockerfile = write_dockerfile(&self.config)?;
        let (plan, previous) = plan_layers(&self.config)?;
        println!("{}", format!("Layers for {}", self.tagged_image_name()).bold());
        report_layers(&plan, previous.as_ref());

        let tagged = self.tagged_image_name();
        let dockerfile = dockerfile.to_string_lossy().into_owned();
        let context_dir = self.config.context_dir().to_string_lossy().into_owned();
        let platform = self.toolchain.docker_platform();

        let mut args = vec!["build", "-t", tagged.as_str(), "-f", dockerfile.as_str()];
        if let Some(platform) = &platform {
            args.push("--platform");
            args.push(platform);
        }
        args.push(context_dir.as_str());

        run_command(self.label("build"), self.toolchain.docker(), args).await?;

        plan.save(self.config.context_dir())
            .map_err(|e| format!("Failed to record layer plan: {}", e))?;
        info!("Built {}", tagged);
        Ok(tagged)
    }

    /// Starts one container from the built image and blocks until it exits
    /// or Ctrl-C stops it.
    pub async fn run(&self, host_port: u16) -> Result<Status, String> {
        ensure_port_available(host_port)?;

        let spec = self.config.spec();
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.config.product_uri().to_string(),
            "-p".to_string(),
            format!("{}:{}", host_port, spec.exposed_port),
        ];
        for pair in self.config.variables().pairs() {
            args.push("-e".to_string());
            args.push(pair);
        }
        args.push(self.tagged_image_name());

        println!(
            "Running docker for {} ({}): {}",
            self.config.product_name(),
            self.config.environment(),
            args.join(" ")
        );
        let mut child = Command::new(self.toolchain.docker())
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to launch {}: {}", self.tagged_image_name(), e))?;

        let mut status = Status::NotStarted.advance(Status::Running)?;
        let label = self.label("run");
        let output = pipe_output(&label, child.stdout.take(), child.stderr.take());

        tokio::select! {
            _ = output => {
                let exit = child.wait().await.map_err(|e| e.to_string())?;
                let next = match exit.code() {
                    Some(code) => Status::Exited(code),
                    None => Status::Terminated,
                };
                status = status.advance(next)?;
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("{}", format!("Terminating {}.", self.config.product_name()).bold().white());
                self.stop().await;
                let _ = child.wait().await;
                status = status.advance(Status::Terminated)?;
            }
        }

        println!("{}  |   {}", label, format!("Process {}", status).bold().white());
        Ok(status)
    }

    pub async fn stop(&self) {
        let name = self.config.product_uri().to_string();
        let _ = run_command(self.label("stop"), self.toolchain.docker(), vec!["stop", name.as_str()]).await;
    }

    pub async fn push(&self) -> Result<String, String> {
        if self.config.docker_registry().is_none() {
            return Err("No docker registry configured; pass --registry or set DOCKER_REGISTRY".to_string());
        }

        let tag = self.tagged_image_name();
        let docker_tag = self.identifier();
        run_command(self.label("tag"), self.toolchain.docker(), vec!["tag", tag.as_str(), docker_tag.as_str()]).await?;
        run_command(self.label("push"), self.toolchain.docker(), vec!["push", docker_tag.as_str()]).await?;
        Ok(docker_tag)
    }

    pub async fn build_and_push(&self) -> Result<String, String> {
        self.build().await?;
        self.push().await
    }
}
