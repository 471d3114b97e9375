use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum OperatingSystem {
    Linux,
    MacOS,
}

impl OperatingSystem {
    pub fn host() -> Result<Self, String> {
        env::consts::OS.parse()
    }

    pub fn to_docker_target(&self) -> &'static str {
        // Images always run on a Linux kernel, including Docker Desktop on macOS.
        match self {
            OperatingSystem::Linux | OperatingSystem::MacOS => "linux",
        }
    }
}

impl FromStr for OperatingSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::MacOS),
            _ => Err(format!("Invalid operating system: {}", s)),
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingSystem::Linux => write!(f, "linux"),
            OperatingSystem::MacOS => write!(f, "macos"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ArchType {
    X86_64,
    AARCH64,
}

impl ArchType {
    pub fn host() -> Result<Self, String> {
        env::consts::ARCH.parse()
    }

    pub fn to_docker_target(&self) -> &'static str {
        match self {
            ArchType::X86_64 => "amd64",
            ArchType::AARCH64 => "arm64",
        }
    }
}

impl FromStr for ArchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::AARCH64),
            _ => Err(format!("Invalid architecture type: {}", s)),
        }
    }
}

impl fmt::Display for ArchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchType::X86_64 => write!(f, "x86_64"),
            ArchType::AARCH64 => write!(f, "aarch64"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Platform {
    pub os: OperatingSystem,
    pub arch: ArchType,
}

impl Platform {
    pub fn host() -> Result<Self, String> {
        Ok(Self {
            os: OperatingSystem::host()?,
            arch: ArchType::host()?,
        })
    }

    pub fn new(os: &str, arch: &str) -> Result<Self, String> {
        Ok(Self {
            os: os.parse()?,
            arch: arch.parse()?,
        })
    }

    /// Value for `docker build --platform`, e.g. `linux/arm64`.
    pub fn to_docker_target(&self) -> String {
        format!("{}/{}", self.os.to_docker_target(), self.arch.to_docker_target())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docker_and_rust_spellings() {
        let platform = Platform::new("linux", "arm64").unwrap();
        assert_eq!(platform.arch, ArchType::AARCH64);
        assert_eq!(platform.to_docker_target(), "linux/arm64");
        assert_eq!(platform.to_string(), "linux-aarch64");

        let mac = Platform::new("macos", "x86_64").unwrap();
        assert_eq!(mac.to_docker_target(), "linux/amd64");
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(
            Platform::new("windows", "x86_64").unwrap_err(),
            "Invalid operating system: windows"
        );
        assert!(Platform::new("linux", "riscv64").is_err());
    }
}
