//! Host package-manager family and its executable → package table.

use std::collections::BTreeMap;
use std::fmt;

use super::lookup::ExecutableLookup;

// ---------------------------------------------------------------------------
// PackageFamily
// ---------------------------------------------------------------------------

/// Supported host package managers.
///
/// | Variant  | Manager  | Distros                 |
/// |----------|----------|-------------------------|
/// | `Apt`    | `apt`    | Debian, Ubuntu, Mint, … |
/// | `Pacman` | `pacman` | Arch, Manjaro, …        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFamily {
    Apt,
    Pacman,
}

impl PackageFamily {
    /// Detection priority: the first family whose manager is on `$PATH` wins.
    pub const DETECTION_ORDER: [PackageFamily; 2] = [PackageFamily::Apt, PackageFamily::Pacman];

    /// The package-manager executable probed during detection.
    pub fn manager(self) -> &'static str {
        match self {
            PackageFamily::Apt => "apt",
            PackageFamily::Pacman => "pacman",
        }
    }

    /// Package providing `executable` on this family, if known.
    fn package_for(self, executable: &str) -> Option<&'static str> {
        let package = match (self, executable) {
            (PackageFamily::Apt, "pactl") => "pulseaudio-utils",
            (PackageFamily::Pacman, "pactl") => "pulseaudio",
            (_, "grep") => "grep",
            (_, "awk") => "gawk",
            (_, "gespeaker") => "gespeaker",
            (PackageFamily::Apt, "pgrep") => "procps",
            (PackageFamily::Pacman, "pgrep") => "procps-ng",
            (_, "sleep") => "coreutils",
            _ => return None,
        };
        Some(package)
    }
}

impl fmt::Display for PackageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manager())
    }
}

// ---------------------------------------------------------------------------
// HostPackageProfile
// ---------------------------------------------------------------------------

/// The detected package family plus its executable → package mapping.
///
/// Built once at startup by [`HostPackageProfile::detect`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPackageProfile {
    family: PackageFamily,
    packages: BTreeMap<String, String>,
}

impl HostPackageProfile {
    /// Profile for `family`, covering every executable in `known`.
    pub fn for_family<S: AsRef<str>>(family: PackageFamily, known: &[S]) -> Self {
        let packages = known
            .iter()
            .filter_map(|exe| {
                let exe = exe.as_ref();
                family
                    .package_for(exe)
                    .map(|pkg| (exe.to_string(), pkg.to_string()))
            })
            .collect();
        Self { family, packages }
    }

    /// Probe for known package managers in [`PackageFamily::DETECTION_ORDER`].
    ///
    /// Returns `None` when no supported manager is installed.
    pub fn detect(lookup: &dyn ExecutableLookup) -> Option<Self> {
        PackageFamily::DETECTION_ORDER
            .into_iter()
            .find(|family| lookup.exists(family.manager()))
            .map(|family| Self::for_family(family, &super::REQUIRED_EXECUTABLES))
    }

    pub fn family(&self) -> PackageFamily {
        self.family
    }

    /// Mapped package name, if this profile knows `executable`.
    pub fn mapped(&self, executable: &str) -> Option<&str> {
        self.packages.get(executable).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
