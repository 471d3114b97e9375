mod platform;
use crate::utils::first_which;
pub use platform::Platform;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::str;

/// Host tools and the platform pair an image is built for.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolchainContext {
    host: Platform,
    target: Platform,

    docker: String,
    git: Option<String>,
}

impl ToolchainContext {
    pub fn new(host: Platform, target: Platform) -> Result<Self, String> {
        let docker = first_which(&["docker", "podman"])
            .ok_or_else(|| "Neither docker nor podman was found on PATH".to_string())?;

        Ok(Self::with_tools(host, target, docker, first_which(&["git"])))
    }

    pub fn with_tools(host: Platform, target: Platform, docker: String, git: Option<String>) -> Self {
        ToolchainContext {
            host,
            target,
            docker,
            git,
        }
    }

    pub fn docker(&self) -> &str {
        &self.docker
    }

    /// `--platform` value for cross builds; `None` when host and target match.
    pub fn docker_platform(&self) -> Option<String> {
        if self.host == self.target {
            None
        } else {
            Some(self.target.to_docker_target())
        }
    }

    /// Image tag derived from the last commit touching `subdirectory_path`,
    /// with `-wip` appended when the directory has uncommitted changes.
    /// Directories without history are tagged `precommit`.
    pub fn git_tag(&self, subdirectory_path: &str) -> Result<String, String> {
        match self.get_git_folder_hash(subdirectory_path)? {
            Some(hash) => {
                let short = &hash[..hash.len().min(8)];
                Ok(format!("{}{}", short, self.get_git_wip(subdirectory_path)?))
            }
            None => Ok("precommit".to_string()),
        }
    }

    /// Hash of the last commit touching `subdirectory_path`, if there is one.
    pub fn get_git_folder_hash(&self, subdirectory_path: &str) -> Result<Option<String>, String> {
        let Some(git) = &self.git else {
            return Ok(None);
        };

        let hash_output = Command::new(git)
            .args(["-C", subdirectory_path, "log", "-n", "1", "--format=%H", "--", "."])
            .output()
            .map_err(|e| e.to_string())?;

        let hash = str::from_utf8(&hash_output.stdout)
            .map_err(|e| e.to_string())?
            .trim()
            .to_string();

        if !hash_output.status.success() || hash.is_empty() {
            return Ok(None);
        }

        Ok(Some(hash))
    }

    pub fn get_git_wip(&self, subdirectory_path: &str) -> Result<String, String> {
        let Some(git) = &self.git else {
            return Ok("".to_string());
        };

        let dirty_output = Command::new(git)
            .args(["-C", subdirectory_path, "diff", "--", "."])
            .output()
            .map_err(|e| e.to_string())?;

        let diff = str::from_utf8(&dirty_output.stdout)
            .map_err(|e| e.to_string())?
            .trim()
            .to_string();

        if !diff.is_empty() {
            return Ok("-wip".to_string());
        }

        Ok("".to_string())
    }
}
