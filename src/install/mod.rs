//! Package Installer: refresh, then install, through the host package
//! manager.
//!
//! | Family | Refresh           | Install                              |
//! |--------|-------------------|--------------------------------------|
//! | Apt    | `sudo apt update` | `sudo apt install -y <pkgs…>`        |
//! | Pacman | `sudo pacman -Sy` | `sudo pacman -S --noconfirm <pkgs…>` |
//!
//! The refresh step is best-effort; the install step decides the result.
//! Elevation (`sudo` by default) is expected to prompt the user out-of-band.

use crate::command::{RunMode, Shell};
use crate::probe::PackageFamily;

/// Index-refresh command line for `family`.
pub fn refresh_command(family: PackageFamily, elevate_with: &str) -> Vec<String> {
    let tail: &[&str] = match family {
        PackageFamily::Apt => &["apt", "update"],
        PackageFamily::Pacman => &["pacman", "-Sy"],
    };
    elevated(elevate_with, tail, &[])
}

/// Install command line for `packages` on `family`.
pub fn install_command(family: PackageFamily, elevate_with: &str, packages: &[String]) -> Vec<String> {
    let tail: &[&str] = match family {
        PackageFamily::Apt => &["apt", "install", "-y"],
        PackageFamily::Pacman => &["pacman", "-S", "--noconfirm"],
    };
    elevated(elevate_with, tail, packages)
}

fn elevated(elevate_with: &str, tail: &[&str], packages: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(1 + tail.len() + packages.len());
    if !elevate_with.is_empty() {
        argv.push(elevate_with.to_string());
    }
    argv.extend(tail.iter().map(|s| s.to_string()));
    argv.extend(packages.iter().cloned());
    argv
}

/// Install `packages` with the host package manager.
///
/// Returns `true` only if the install step exits cleanly.  Every problem,
/// including an unsupported (absent) family, is reported to the shell's sink
/// and turned into `false`; nothing propagates to the caller.
pub fn install_packages(
    shell: &Shell,
    family: Option<PackageFamily>,
    elevate_with: &str,
    packages: &[String],
) -> bool {
    let Some(family) = family else {
        shell.sink().log("cannot install on this platform");
        log::warn!("install: no supported package manager");
        return false;
    };

    // Refresh failure is tolerated; a stale index usually still installs.
    let _ = shell.run(&refresh_command(family, elevate_with), RunMode::BestEffort);

    shell.sink().log(&format!("installing {}", packages.join(", ")));
    match shell.run(&install_command(family, elevate_with, packages), RunMode::Strict) {
        Ok(_) => {
            log::info!("install: {family} installed {}", packages.join(" "));
            true
        }
        Err(e) => {
            shell.sink().log(&format!("install failed: {e}"));
            log::error!("install: {e}");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
