//! Per-platform CLI conventions.
//!
//! Each supported `device_type` maps to a static profile describing how to
//! turn off paging, enter/leave configuration mode, and persist the running
//! configuration.

/// CLI conventions for one device family.
#[derive(Debug, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Device type identifier (e.g. "cisco_ios").
    pub device_type: &'static str,
    /// Human-readable platform name used in planner prompts.
    pub display_name: &'static str,
    /// Commands sent right after login to disable paging.
    pub session_setup: &'static [&'static str],
    /// Command that enters configuration mode.
    pub config_enter: &'static str,
    /// Command that leaves configuration mode.
    pub config_exit: &'static str,
    /// Command that writes the running configuration to startup.
    pub save_command: &'static str,
}

const PROFILES: &[PlatformProfile] = &[
    PlatformProfile {
        device_type: "cisco_ios",
        display_name: "Cisco IOS",
        session_setup: &["terminal length 0", "terminal width 511"],
        config_enter: "configure terminal",
        config_exit: "end",
        save_command: "write memory",
    },
    PlatformProfile {
        device_type: "cisco_xe",
        display_name: "Cisco IOS XE",
        session_setup: &["terminal length 0", "terminal width 511"],
        config_enter: "configure terminal",
        config_exit: "end",
        save_command: "write memory",
    },
    PlatformProfile {
        device_type: "cisco_nxos",
        display_name: "Cisco NX-OS",
        session_setup: &["terminal length 0", "terminal width 511"],
        config_enter: "configure terminal",
        config_exit: "end",
        save_command: "copy running-config startup-config",
    },
    PlatformProfile {
        device_type: "arista_eos",
        display_name: "Arista EOS",
        session_setup: &["terminal length 0", "terminal width 32767"],
        config_enter: "configure terminal",
        config_exit: "end",
        save_command: "write memory",
    },
];

/// Device type used when none is configured.
pub const DEFAULT_DEVICE_TYPE: &str = "cisco_ios";

/// Look up the profile for a device type (case-insensitive).
pub fn lookup(device_type: &str) -> Option<&'static PlatformProfile> {
    PROFILES
        .iter()
        .find(|p| p.device_type.eq_ignore_ascii_case(device_type.trim()))
}

/// All supported device type identifiers.
pub fn supported() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|p| p.device_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ios_profile() {
        let p = lookup("cisco_ios").unwrap();
        assert_eq!(p.config_enter, "configure terminal");
        assert_eq!(p.config_exit, "end");
        assert_eq!(p.save_command, "write memory");
        assert!(p.session_setup.contains(&"terminal length 0"));
    }

    #[test]
    fn nxos_saves_with_copy() {
        let p = lookup("cisco_nxos").unwrap();
        assert_eq!(p.save_command, "copy running-config startup-config");
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(lookup(" Cisco_XE ").unwrap().device_type, "cisco_xe");
    }

    #[test]
    fn unknown_platform() {
        assert!(lookup("juniper_junos").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn default_is_supported() {
        assert!(supported().any(|t| t == DEFAULT_DEVICE_TYPE));
        assert_eq!(supported().count(), 4);
    }
}
