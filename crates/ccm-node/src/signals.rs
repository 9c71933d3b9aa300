//! Shutdown signal selection.

use ccm_core::{HostPlatform, PlatformFamily, SignalKind};

/// How forcefully a node should be asked to stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ask the server to shut down cleanly.
    #[default]
    Gentle,
    /// Hang-up, which the server treats as a shutdown request.
    HangUp,
    /// Kill without giving the server a chance to clean up.
    Forceful,
}

/// Maps a [`ShutdownSignal`] to the signal actually delivered on this host.
///
/// Resolved once from the [`HostPlatform`]. Hosts without distinct signal
/// semantics only distinguish a polite request from a forced kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSignalPolicy {
    family: PlatformFamily,
}

impl ShutdownSignalPolicy {
    pub fn for_platform(platform: &HostPlatform) -> Self {
        Self {
            family: platform.family,
        }
    }

    pub fn signal_for(&self, requested: ShutdownSignal) -> SignalKind {
        match (self.family, requested) {
            (_, ShutdownSignal::Gentle) => SignalKind::Terminate,
            (PlatformFamily::Posix, ShutdownSignal::HangUp) => SignalKind::HangUp,
            (PlatformFamily::Posix, ShutdownSignal::Forceful) => SignalKind::Kill,
            (PlatformFamily::Windows, _) => SignalKind::Kill,
        }
    }
}
