//! Environment Prober: which required programs are missing, and which
//! packages would provide them.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vmic_provision::probe::{probe, required_executables, HostPackageProfile, PathLookup};
//!
//! let profile = HostPackageProfile::detect(&PathLookup);
//! let plan = probe(&PathLookup, profile.as_ref(), &required_executables("gespeaker"));
//! for (exe, pkg) in plan.missing.iter().zip(&plan.packages) {
//!     println!("{exe} -> {pkg}");
//! }
//! ```

pub mod lookup;
pub mod profile;

pub use lookup::{ExecutableLookup, PathLookup};
pub use profile::{HostPackageProfile, PackageFamily};

#[cfg(test)]
pub use lookup::FakeLookup;

/// Programs the provisioning sequence shells out to, in check order.
pub const REQUIRED_EXECUTABLES: [&str; 6] = ["pactl", "grep", "awk", "gespeaker", "pgrep", "sleep"];

/// [`REQUIRED_EXECUTABLES`] with the TTS slot replaced by `tts_app`.
pub fn required_executables(tts_app: &str) -> Vec<String> {
    REQUIRED_EXECUTABLES
        .iter()
        .map(|exe| if *exe == "gespeaker" { tts_app } else { *exe })
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// InstallPlan
// ---------------------------------------------------------------------------

/// Missing executables and, position by position, the packages that provide
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    pub missing: Vec<String>,
    pub packages: Vec<String>,
}

impl InstallPlan {
    /// `true` when nothing is missing.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Report which of `required` are absent according to `lookup`.
///
/// Each missing executable is mapped through `profile`; without a profile, or
/// without a mapping entry, the executable's own name is used as the package
/// name.  Never fails.
pub fn probe<S: AsRef<str>>(
    lookup: &dyn ExecutableLookup,
    profile: Option<&HostPackageProfile>,
    required: &[S],
) -> InstallPlan {
    let mut plan = InstallPlan::default();

    for exe in required.iter().map(AsRef::as_ref) {
        if lookup.exists(exe) {
            continue;
        }
        let package = profile.and_then(|p| p.mapped(exe)).unwrap_or(exe);
        plan.missing.push(exe.to_string());
        plan.packages.push(package.to_string());
    }

    plan
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn apt() -> HostPackageProfile {
        HostPackageProfile::for_family(PackageFamily::Apt, &REQUIRED_EXECUTABLES)
    }

    #[test]
    fn nothing_missing_gives_empty_plan() {
        let lookup = FakeLookup::with(&REQUIRED_EXECUTABLES);
        let plan = probe(&lookup, Some(&apt()), &REQUIRED_EXECUTABLES);
        assert!(plan.is_empty());
        assert!(plan.packages.is_empty());
    }

    #[test]
    fn missing_list_keeps_required_order_and_maps_packages() {
        let lookup = FakeLookup::with(&["grep", "gespeaker", "sleep"]);
        let plan = probe(&lookup, Some(&apt()), &REQUIRED_EXECUTABLES);

        assert_eq!(plan.missing, vec!["pactl", "awk", "pgrep"]);
        assert_eq!(plan.packages, vec!["pulseaudio-utils", "gawk", "procps"]);
    }

    #[test]
    fn without_profile_package_is_executable_name() {
        let lookup = FakeLookup::with(&["grep", "sleep"]);
        let plan = probe(&lookup, None, &REQUIRED_EXECUTABLES);

        assert_eq!(plan.missing, vec!["pactl", "awk", "gespeaker", "pgrep"]);
        assert_eq!(plan.packages, plan.missing);
    }

    #[test]
    fn unmapped_executable_falls_back_to_its_name() {
        let lookup = FakeLookup::with(&[]);
        let plan = probe(&lookup, Some(&apt()), &["pactl", "espeak-ng"]);
        assert_eq!(plan.packages, vec!["pulseaudio-utils", "espeak-ng"]);
    }

    /// For every subset of missing executables the package list lines up
    /// with the missing list.
    #[test]
    fn package_list_corresponds_to_missing_list_for_all_subsets() {
        let profile = apt();
        for mask in 0u32..(1 << REQUIRED_EXECUTABLES.len()) {
            let present: Vec<&str> = REQUIRED_EXECUTABLES
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, e)| *e)
                .collect();
            let lookup = FakeLookup::with(&present);
            let plan = probe(&lookup, Some(&profile), &REQUIRED_EXECUTABLES);

            assert_eq!(plan.missing.len(), plan.packages.len());
            assert_eq!(plan.missing.len(), REQUIRED_EXECUTABLES.len() - present.len());
            for (exe, pkg) in plan.missing.iter().zip(&plan.packages) {
                assert_eq!(profile.mapped(exe).unwrap_or(exe), pkg);
            }
        }
    }

    /// Installing every package of a plan on a fake host leaves nothing
    /// missing on the next probe.
    #[test]
    fn installing_the_plan_clears_the_missing_list() {
        for family in PackageFamily::DETECTION_ORDER {
            let profile = HostPackageProfile::for_family(family, &REQUIRED_EXECUTABLES);
            let lookup = FakeLookup::with(&["grep"]);

            let plan = probe(&lookup, Some(&profile), &REQUIRED_EXECUTABLES);
            assert!(!plan.is_empty());

            // A package provides every required executable that maps to it.
            for package in &plan.packages {
                for exe in REQUIRED_EXECUTABLES {
                    if profile.mapped(exe).unwrap_or(exe) == package {
                        lookup.install(exe);
                    }
                }
            }

            assert!(probe(&lookup, Some(&profile), &REQUIRED_EXECUTABLES).is_empty());
        }
    }

    #[test]
    fn tts_slot_follows_config() {
        let required = required_executables("espeak-ng");
        assert_eq!(required, vec!["pactl", "grep", "awk", "espeak-ng", "pgrep", "sleep"]);
        assert_eq!(required_executables("gespeaker"), REQUIRED_EXECUTABLES);
    }
}
