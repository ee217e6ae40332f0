use serde::{Deserialize, Serialize};

/// Backend engine families whose binaries are kept up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineType {
    Xray,
    SingBox,
    Mihomo,
}

/// Static facts about one engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    /// Subdirectory of the bin directory the engine is installed into.
    pub install_dir: &'static str,
    /// Executable file name without platform suffix.
    pub executable: &'static str,
    pub github_repo: &'static str,
    pub version_arg: &'static str,
}

const XRAY: EngineSpec = EngineSpec {
    name: "xray",
    display_name: "Xray",
    install_dir: "xray",
    executable: "xray",
    github_repo: "XTLS/Xray-core",
    version_arg: "-version",
};

const SING_BOX: EngineSpec = EngineSpec {
    name: "sing-box",
    display_name: "sing-box",
    install_dir: "sing_box",
    executable: "sing-box",
    github_repo: "SagerNet/sing-box",
    version_arg: "version",
};

const MIHOMO: EngineSpec = EngineSpec {
    name: "mihomo",
    display_name: "mihomo",
    install_dir: "mihomo",
    executable: "mihomo",
    github_repo: "MetaCubeX/mihomo",
    version_arg: "-v",
};

impl EngineType {
    /// Every engine, in the order update cycles visit them.
    pub const ALL: [Self; 3] = [Self::Xray, Self::SingBox, Self::Mihomo];

    #[must_use]
    pub const fn spec(self) -> &'static EngineSpec {
        match self {
            Self::Xray => &XRAY,
            Self::SingBox => &SING_BOX,
            Self::Mihomo => &MIHOMO,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.spec().name
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        self.spec().display_name
    }

    #[must_use]
    pub const fn install_dir(self) -> &'static str {
        self.spec().install_dir
    }

    /// Executable file name including the platform suffix.
    #[must_use]
    pub fn executable_file_name(self) -> String {
        format!("{}{}", self.spec().executable, std::env::consts::EXE_SUFFIX)
    }

    /// Release asset name for the current platform, or `None` when the engine
    /// publishes no build for it.
    #[must_use]
    pub fn asset_name(self, version: &str) -> Option<String> {
        let (os, arch) = platform_tags(self)?;
        let name = match self {
            Self::Xray => format!("Xray-{os}-{arch}.zip"),
            Self::SingBox if cfg!(target_os = "windows") => {
                format!("sing-box-{version}-{os}-{arch}.zip")
            }
            Self::SingBox => format!("sing-box-{version}-{os}-{arch}.tar.gz"),
            Self::Mihomo if cfg!(target_os = "windows") => {
                format!("mihomo-{os}-{arch}-v{version}.zip")
            }
            Self::Mihomo => format!("mihomo-{os}-{arch}-v{version}.gz"),
        };
        Some(name)
    }
}

fn platform_tags(engine: EngineType) -> Option<(&'static str, &'static str)> {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        match engine {
            EngineType::Xray => "macos",
            EngineType::SingBox | EngineType::Mihomo => "darwin",
        }
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        return None;
    };

    let arch = if cfg!(target_arch = "x86_64") {
        match engine {
            EngineType::Xray => "64",
            EngineType::SingBox | EngineType::Mihomo => "amd64",
        }
    } else if cfg!(target_arch = "aarch64") {
        match engine {
            EngineType::Xray => "arm64-v8a",
            EngineType::SingBox | EngineType::Mihomo => "arm64",
        }
    } else {
        return None;
    };

    Some((os, arch))
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
