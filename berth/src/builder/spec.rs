use crate::builder::{LaunchCommand, SpecError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CopyStep {
    pub source: String,
    pub destination: String,
}

impl CopyStep {
    pub fn new(source: &str, destination: &str) -> Self {
        CopyStep {
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    /// True for the step that brings in the whole build context.
    pub fn is_full_source(&self) -> bool {
        matches!(self.source.as_str(), "." | "./")
    }
}

/// Declarative description of how an image is built and how its process
/// starts. Authored once, never mutated by a build or a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BuildSpec {
    pub base_image: String,
    pub workdir: String,
    pub dependency_manifest: String,
    pub copy_steps: Vec<CopyStep>,
    #[serde(default)]
    pub install: Vec<String>,
    #[serde(default)]
    pub build: Vec<Vec<String>>,
    pub exposed_port: u16,
    pub entrypoint: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    From(String),
    Workdir(String),
    Copy(CopyStep),
    Run(Vec<String>),
    Expose(u16),
    Cmd(Vec<String>),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::From(image) => write!(f, "FROM {}", image),
            Instruction::Workdir(dir) => write!(f, "WORKDIR {}", dir),
            Instruction::Copy(step) => write!(f, "COPY {} {}", step.source, step.destination),
            Instruction::Run(command) => write!(f, "RUN {}", shell_join(command)),
            Instruction::Expose(port) => write!(f, "EXPOSE {}", port),
            Instruction::Cmd(command) => {
                let exec_form = serde_json::to_string(command).map_err(|_| fmt::Error)?;
                write!(f, "CMD {}", exec_form)
            }
        }
    }
}

impl BuildSpec {
    fn manifest_step(&self) -> Option<usize> {
        self.copy_steps
            .iter()
            .position(|step| step.source == self.dependency_manifest)
    }

    fn full_source_step(&self) -> Option<usize> {
        self.copy_steps.iter().position(CopyStep::is_full_source)
    }

    pub fn launch_command(&self) -> Result<LaunchCommand, SpecError> {
        LaunchCommand::parse(&self.entrypoint)
    }

    /// Every invariant violation, in declaration order of the fields.
    pub fn check(&self) -> Vec<SpecError> {
        let mut findings = Vec::new();

        if !is_pinned(&self.base_image) {
            findings.push(SpecError::UnpinnedBaseImage(self.base_image.clone()));
        }

        if !self.workdir.starts_with('/') {
            findings.push(SpecError::RelativeWorkdir(self.workdir.clone()));
        }

        match (self.manifest_step(), self.full_source_step()) {
            (None, _) => findings.push(SpecError::MissingManifestCopy(
                self.dependency_manifest.clone(),
            )),
            (Some(manifest_step), Some(source_step)) if manifest_step > source_step => {
                findings.push(SpecError::ManifestCopyOrder {
                    manifest: self.dependency_manifest.clone(),
                    manifest_step,
                    source_step,
                })
            }
            _ => (),
        }

        if self.install.is_empty() {
            findings.push(SpecError::MissingInstall);
        }

        if self.exposed_port == 0 {
            findings.push(SpecError::InvalidExposedPort);
        }

        match self.launch_command() {
            Ok(launch) => {
                match launch.port {
                    None => findings.push(SpecError::MissingBindPort),
                    Some(bound) if bound != self.exposed_port => {
                        findings.push(SpecError::PortMismatch {
                            exposed: self.exposed_port,
                            bound,
                        })
                    }
                    Some(_) => (),
                }
                match launch.host {
                    None => findings.push(SpecError::MissingBindHost),
                    Some(ref host) if !launch.binds_wildcard() => {
                        findings.push(SpecError::NotWildcard(host.clone()))
                    }
                    Some(_) => (),
                }
            }
            Err(e) => findings.push(e),
        }

        findings
    }

    /// Instructions in build order. The install step follows the manifest
    /// copy directly, or all copies when the manifest is never copied.
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut instructions = vec![
            Instruction::From(self.base_image.clone()),
            Instruction::Workdir(self.workdir.clone()),
        ];

        let manifest_step = self.manifest_step();
        for (i, step) in self.copy_steps.iter().enumerate() {
            instructions.push(Instruction::Copy(step.clone()));
            if Some(i) == manifest_step && !self.install.is_empty() {
                instructions.push(Instruction::Run(self.install.clone()));
            }
        }
        if manifest_step.is_none() && !self.install.is_empty() {
            instructions.push(Instruction::Run(self.install.clone()));
        }

        for command in &self.build {
            instructions.push(Instruction::Run(command.clone()));
        }

        instructions.push(Instruction::Expose(self.exposed_port));
        instructions.push(Instruction::Cmd(self.entrypoint.clone()));
        instructions
    }
}

/// `name:tag` or `name@digest`, with a tag other than `latest`. A registry
/// port (`host:5000/name`) is not a tag.
pub fn is_pinned(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.split_once(':') {
        Some((_, tag)) => !tag.is_empty() && tag != "latest",
        None => false,
    }
}

/// Joins tokens into a shell line, single-quoting the ones that would not
/// survive word splitting.
pub fn shell_join(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|token| {
            let needs_quotes = token.is_empty()
                || token
                    .chars()
                    .any(|c| c.is_whitespace() || c == '\'' || c == '"' || c == '\\');
            if needs_quotes {
                format!("'{}'", token.replace('\'', r"'\''"))
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
