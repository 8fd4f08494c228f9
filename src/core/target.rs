//! Target platforms, architectures and build modes understood by the Go
//! toolchain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target operating system (`GOOS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoOs {
    Android,
    Linux,
    Windows,
    #[serde(alias = "macos", alias = "osx")]
    Darwin,
}

impl GoOs {
    pub const ALL: [GoOs; 4] = [GoOs::Android, GoOs::Linux, GoOs::Windows, GoOs::Darwin];

    /// Value for the `GOOS` environment variable.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoOs::Android => "android",
            GoOs::Linux => "linux",
            GoOs::Windows => "windows",
            GoOs::Darwin => "darwin",
        }
    }

    /// The OS this process runs on. Unknown hosts map to Linux.
    pub fn host() -> Self {
        match std::env::consts::OS {
            "windows" => GoOs::Windows,
            "macos" => GoOs::Darwin,
            "android" => GoOs::Android,
            _ => GoOs::Linux,
        }
    }
}

impl fmt::Display for GoOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoOs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(GoOs::Android),
            "linux" => Ok(GoOs::Linux),
            "windows" => Ok(GoOs::Windows),
            "darwin" | "macos" | "osx" => Ok(GoOs::Darwin),
            _ => Err(format!("unknown target os `{}`", s)),
        }
    }
}

/// Target architecture (`GOARCH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GoArch {
    /// 32-bit ARMv7 (`GOARCH=arm GOARM=7`).
    #[serde(rename = "arm", alias = "armv7", alias = "arm7")]
    Arm,
    #[serde(rename = "arm64", alias = "aarch64", alias = "arm8", alias = "armv8")]
    Arm64,
    #[serde(rename = "386", alias = "i386", alias = "x86", alias = "i686")]
    I386,
    #[serde(rename = "amd64", alias = "x86_64", alias = "x64")]
    Amd64,
}

impl GoArch {
    pub const ALL: [GoArch; 4] = [GoArch::Arm, GoArch::Arm64, GoArch::I386, GoArch::Amd64];

    /// Value for the `GOARCH` environment variable.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoArch::Arm => "arm",
            GoArch::Arm64 => "arm64",
            GoArch::I386 => "386",
            GoArch::Amd64 => "amd64",
        }
    }

    /// Value for `GOARM`, only meaningful for 32-bit ARM.
    pub fn goarm(&self) -> Option<&'static str> {
        match self {
            GoArch::Arm => Some("7"),
            _ => None,
        }
    }

    /// The architecture this process runs on. Unknown hosts map to amd64.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => GoArch::Arm64,
            "arm" => GoArch::Arm,
            "x86" => GoArch::I386,
            _ => GoArch::Amd64,
        }
    }
}

impl fmt::Display for GoArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoArch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm" | "armv7" | "arm7" => Ok(GoArch::Arm),
            "arm64" | "aarch64" | "arm8" | "armv8" => Ok(GoArch::Arm64),
            "386" | "i386" | "x86" | "i686" => Ok(GoArch::I386),
            "amd64" | "x86_64" | "x64" => Ok(GoArch::Amd64),
            _ => Err(format!("unknown target architecture `{}`", s)),
        }
    }
}

/// An (OS, architecture) pair, written `os/arch` like `go tool dist list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetPair {
    pub os: GoOs,
    pub arch: GoArch,
}

impl TargetPair {
    pub fn new(os: GoOs, arch: GoArch) -> Self {
        TargetPair { os, arch }
    }

    pub fn host() -> Self {
        TargetPair::new(GoOs::host(), GoArch::host())
    }

    /// Pairs the Go toolchain ships support for, restricted to the OS and
    /// architecture sets above.
    pub fn supported() -> Vec<TargetPair> {
        let mut pairs = Vec::new();
        for os in GoOs::ALL {
            for arch in GoArch::ALL {
                let pair = TargetPair::new(os, arch);
                if pair.is_known_supported() {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    /// Whether this pair appears in the toolchain's first-class port list.
    pub fn is_known_supported(&self) -> bool {
        !matches!(
            (self.os, self.arch),
            (GoOs::Darwin, GoArch::Arm) | (GoOs::Darwin, GoArch::I386)
        )
    }

    /// Short `os-arch` form used in generated variant names.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}

impl fmt::Display for TargetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for TargetPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid target `{}`: expected `os/arch`", s))?;
        Ok(TargetPair::new(os.trim().parse()?, arch.trim().parse()?))
    }
}

/// The `-buildmode` passed to `go build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildMode {
    #[default]
    #[serde(rename = "exe", alias = "executable")]
    Executable,
    #[serde(rename = "pie")]
    Pie,
    #[serde(rename = "c-shared", alias = "shared")]
    Shared,
    #[serde(rename = "c-archive", alias = "archive")]
    Archive,
}

impl BuildMode {
    /// Value for `-buildmode`.
    pub fn as_flag(&self) -> &'static str {
        match self {
            BuildMode::Executable => "exe",
            BuildMode::Pie => "pie",
            BuildMode::Shared => "c-shared",
            BuildMode::Archive => "c-archive",
        }
    }

    /// Conventional artifact file name for `name` built for `os`.
    pub fn output_filename(&self, name: &str, os: GoOs) -> String {
        match self {
            BuildMode::Executable | BuildMode::Pie => match os {
                GoOs::Windows => format!("{}.exe", name),
                _ => name.to_string(),
            },
            BuildMode::Shared => match os {
                GoOs::Windows => format!("{}.dll", name),
                GoOs::Darwin => format!("lib{}.dylib", name),
                _ => format!("lib{}.so", name),
            },
            BuildMode::Archive => format!("lib{}.a", name),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}
