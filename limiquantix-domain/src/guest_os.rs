//! Guest OS family tags.
//!
//! The node daemon tunes virtual hardware per OS family; the control plane
//! only carries the tag and forwards it on the agent wire.

use serde::{Deserialize, Serialize};

/// Guest OS family - major categories with distinct hardware requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuestOsFamily {
    /// Unspecified - the node daemon picks generic defaults
    #[default]
    Unspecified,

    // Linux variants
    /// RHEL, Rocky, AlmaLinux, CentOS
    Rhel,
    /// Debian, Ubuntu, Mint
    Debian,
    /// SLES, openSUSE
    Suse,
    /// Arch, Manjaro
    Arch,
    /// Fedora
    Fedora,
    /// Other Linux distributions
    GenericLinux,

    // Windows variants
    /// Windows Server 2016/2019/2022
    WindowsServer,
    /// Windows 10/11
    WindowsDesktop,
    /// Windows 7/8/8.1 (legacy)
    WindowsLegacy,

    // BSD variants
    FreeBsd,
    OpenBsd,
    NetBsd,

    // Other
    MacOs,
    Solaris,
    Other,
}

impl GuestOsFamily {
    /// Parse from an operator-supplied string.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rhel" | "rocky" | "rockylinux" | "almalinux" | "centos" | "oracle" => Self::Rhel,
            "debian" | "ubuntu" | "mint" | "pop" | "elementary" => Self::Debian,
            "suse" | "sles" | "opensuse" => Self::Suse,
            "arch" | "manjaro" | "endeavouros" => Self::Arch,
            "fedora" => Self::Fedora,
            "linux" | "generic_linux" => Self::GenericLinux,
            "windows_server" | "windowsserver" | "winserver" => Self::WindowsServer,
            "windows" | "windows_desktop" | "win10" | "win11" => Self::WindowsDesktop,
            "windows_legacy" | "win7" | "win8" => Self::WindowsLegacy,
            "freebsd" => Self::FreeBsd,
            "openbsd" => Self::OpenBsd,
            "netbsd" => Self::NetBsd,
            "macos" | "darwin" => Self::MacOs,
            "solaris" | "illumos" => Self::Solaris,
            "other" => Self::Other,
            _ => Self::Unspecified,
        }
    }

    /// Tag emitted on the agent wire.
    ///
    /// The agent accepts a fixed tag set; families it has no profile for are
    /// sent as the empty string, which selects the agent's default.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Rhel => "rhel",
            Self::Debian => "debian",
            Self::Fedora => "fedora",
            Self::Suse => "suse",
            Self::Arch => "arch",
            Self::GenericLinux => "generic_linux",
            Self::WindowsServer => "windows_server",
            Self::WindowsDesktop => "windows_desktop",
            Self::WindowsLegacy => "windows_legacy",
            Self::FreeBsd => "freebsd",
            Self::Unspecified
            | Self::OpenBsd
            | Self::NetBsd
            | Self::MacOs
            | Self::Solaris
            | Self::Other => "",
        }
    }
}
