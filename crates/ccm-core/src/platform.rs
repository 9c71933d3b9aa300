//! Host platform facts, computed once at startup.
//!
//! The orchestrator and tool resolver receive a [`HostPlatform`] value
//! instead of probing the OS themselves, so tests can describe any host.

/// Operating system family of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    /// Unix-like host with distinct signal semantics.
    Posix,
    /// Windows host: processes can only be asked to terminate or be killed.
    Windows,
}

/// Facts about the host ccm runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPlatform {
    pub family: PlatformFamily,
    /// Whether the effective user is root.
    pub running_as_root: bool,
}

impl HostPlatform {
    /// Probe the current host.
    pub fn detect() -> Self {
        let family = if cfg!(windows) {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Posix
        };
        let platform = Self {
            family,
            running_as_root: effective_user_is_root(),
        };
        log::debug!("Detected host platform: {platform:?}");
        platform
    }

    /// A POSIX host running as an unprivileged user.
    pub fn posix() -> Self {
        Self {
            family: PlatformFamily::Posix,
            running_as_root: false,
        }
    }

    /// A Windows host running as an unprivileged user.
    pub fn windows() -> Self {
        Self {
            family: PlatformFamily::Windows,
            running_as_root: false,
        }
    }

    /// Override the root flag.
    pub fn with_root(mut self, root: bool) -> Self {
        self.running_as_root = root;
        self
    }

    pub fn is_windows(&self) -> bool {
        self.family == PlatformFamily::Windows
    }

    /// Pager used for log viewing when `PAGER` is unset.
    pub fn default_pager(&self) -> &'static str {
        match self.family {
            PlatformFamily::Posix => "less",
            PlatformFamily::Windows => "more",
        }
    }

    /// File name of a launcher script on this platform.
    pub fn script_name(&self, base: &str) -> String {
        match self.family {
            PlatformFamily::Posix => base.to_string(),
            PlatformFamily::Windows => format!("{base}.bat"),
        }
    }
}

#[cfg(unix)]
fn effective_user_is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn effective_user_is_root() -> bool {
    false
}
