//! Processes that may never be killed, static or situational.
//!
//! The static basename set is carried over near-verbatim from
//! `platform::linux::process::LinuxProcessManager::init_protected_processes`;
//! the dynamic rules (PID 1, self, session leader, terminal emulator) are new
//! for this host-watchdog scope. Unlike the teacher's case-insensitive
//! substring match, name matching here is exact and case-sensitive.

use std::collections::HashSet;

/// Basenames of processes that are never candidates for leak-killing or
/// pressure-relief scoring, regardless of observed memory behavior.
pub struct Whitelist {
    protected: HashSet<&'static str>,
    own_pid: u32,
    session_leader_pid: Option<u32>,
    iterm_only: bool,
}

/// Basenames recognized as terminal emulators, used by iterm-only mode to
/// decide whether a process's ancestry roots in an interactive terminal.
pub const TERMINAL_EMULATOR_BASENAMES: &[&str] = &[
    "gnome-terminal-server",
    "konsole",
    "xterm",
    "alacritty",
    "kitty",
    "wezterm",
    "foot",
    "terminator",
    "tilix",
    "xfce4-terminal",
    "iterm2",
    "sshd",
];

impl Whitelist {
    pub fn new(own_pid: u32, session_leader_pid: Option<u32>, iterm_only: bool) -> Self {
        Whitelist {
            protected: init_protected_processes(),
            own_pid,
            session_leader_pid,
            iterm_only,
        }
    }

    /// True if `basename` names a process that must never be killed,
    /// independent of PID. Exact, case-sensitive match only: unlike the
    /// teacher's substring check, short entries like `"X"` or `"atd"` must
    /// not immunize unrelated processes such as `"catdog"`.
    pub fn is_protected_name(&self, basename: &str) -> bool {
        self.protected.contains(basename)
    }

    /// True if `pid` is protected purely by identity (init, self, leader).
    pub fn is_protected_pid(&self, pid: u32) -> bool {
        pid == 1 || pid == 2 || pid == self.own_pid || Some(pid) == self.session_leader_pid
    }

    /// Full admission check for a tracked process: static name, identity,
    /// and (in iterm-only mode) terminal-emulator ancestry.
    pub fn is_whitelisted(&self, basename: &str, pid: u32, terminal_descendant: bool) -> bool {
        if self.is_protected_pid(pid) || self.is_protected_name(basename) {
            return true;
        }
        if self.iterm_only && !terminal_descendant {
            return true;
        }
        false
    }
}

fn init_protected_processes() -> HashSet<&'static str> {
    let mut set = HashSet::new();
    for name in [
        // init / session management
        "systemd",
        "init",
        "upstart",
        "launchd",
        "systemd-logind",
        "systemd-journald",
        "systemd-udevd",
        "systemd-resolved",
        "systemd-networkd",
        "systemd-timesyncd",
        // D-Bus / IPC
        "dbus-daemon",
        "dbus-broker",
        "dbus-launch",
        // networking
        "NetworkManager",
        "wpa_supplicant",
        "dhclient",
        "sshd",
        "ssh-agent",
        // display servers / desktop environments
        "Xorg",
        "X",
        "Xwayland",
        "gdm",
        "gdm3",
        "lightdm",
        "sddm",
        "gnome-shell",
        "kwin_x11",
        "kwin_wayland",
        "plasmashell",
        "xfwm4",
        "xfdesktop",
        "mutter",
        "compiz",
        // audio
        "pulseaudio",
        "pipewire",
        "pipewire-pulse",
        "wireplumber",
        "alsactl",
        // security / PAM
        "polkitd",
        "policykit",
        "gnome-keyring-daemon",
        "gpg-agent",
        // power management
        "upowerd",
        "tlp",
        "thermald",
        // udev / hardware
        "udevd",
        "udisksd",
        "upowerd",
        // filesystem / storage
        "fsck",
        "mount",
        "umount",
        "cryptsetup",
        // system services
        "cron",
        "crond",
        "atd",
        "rsyslogd",
        "syslog-ng",
        "auditd",
        // container runtimes (the runtimes themselves, not containers)
        "dockerd",
        "containerd",
        "containerd-shim",
        "podman",
        "runc",
        // this watchdog itself, matched by basename as a second line of
        // defense on top of PID-based self-protection
        "memory-leak-killer",
    ] {
        set.insert(name);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protects_init_and_self_by_pid() {
        let wl = Whitelist::new(500, Some(500), false);
        assert!(wl.is_protected_pid(1));
        assert!(wl.is_protected_pid(500));
        assert!(!wl.is_protected_pid(9000));
    }

    #[test]
    fn protects_known_system_daemons_by_name() {
        let wl = Whitelist::new(500, None, false);
        assert!(wl.is_protected_name("systemd"));
        assert!(wl.is_protected_name("NetworkManager"));
        assert!(!wl.is_protected_name("firefox"));
    }

    #[test]
    fn name_matching_is_exact_not_substring() {
        let wl = Whitelist::new(500, None, false);
        // "atd" is protected, but a leaker that merely contains it must not
        // be immunized by a substring match.
        assert!(wl.is_protected_name("atd"));
        assert!(!wl.is_protected_name("catdog"));
        // "X" is protected (the display server), but "Xleaker" is not "X".
        assert!(wl.is_protected_name("X"));
        assert!(!wl.is_protected_name("Xleaker"));
    }

    #[test]
    fn iterm_only_mode_whitelists_non_terminal_descendants() {
        let wl = Whitelist::new(500, None, true);
        assert!(wl.is_whitelisted("firefox", 9001, false));
        assert!(!wl.is_whitelisted("firefox", 9001, true));
    }

    #[test]
    fn iterm_only_off_does_not_gate_on_ancestry() {
        let wl = Whitelist::new(500, None, false);
        assert!(!wl.is_whitelisted("firefox", 9001, false));
    }
}
