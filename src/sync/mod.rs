//! Host state reconciliation.
//!
//! One [`Reconciler`] exists per host generation. Each knows how to read
//! its host's state into a [`HostSnapshot`] and how to perform primitive
//! host calls; everything else (diffing, throttling, optimistic updates,
//! play-mode rules) lives in the shared [`SyncCore`].

use tracing::debug;

use crate::{
    error::Result,
    host::HostVersion,
    model::{AdapterCommand, PlayMode, PlaybackStatus, SongInfo, TimelineInfo, VolumeInfo},
};

mod command;
mod engine;
pub mod play_mode;
mod throttle;
mod v2;
mod v3;


pub use {
    command::{HostCommand, HostOp},
    engine::{HostSnapshot, SyncCore},
    play_mode::{HostPlayMode, PlayModeController},
    throttle::TimelineThrottle,
    v2::V2Reconciler,
    v3::V3Reconciler,
};

/// Host-version-specific half of the synchronization engine.
pub trait Reconciler: Send + Sync {
    /// Host generation this reconciler drives.
    fn version(&self) -> HostVersion;

    /// Shared diff-and-emit state.
    fn core(&self) -> &SyncCore;

    /// Subscribes to the host and performs the initial reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::CapabilityUnavailable` if a host primitive
    /// needed for the subscriptions is missing.
    fn start(&self) -> Result<()>;

    /// Releases every host subscription and cancels pending cover work.
    fn dispose(&self);

    /// Reads the full host state and feeds it to the core.
    fn reconcile(&self);

    /// Performs one primitive host call.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::CapabilityUnavailable` if this host generation
    /// has no way to perform `op`.
    fn perform(&self, op: HostOp) -> Result<()>;

    fn current_song(&self) -> Result<SongInfo> {
        self.core().current_song()
    }

    fn playback_status(&self) -> PlaybackStatus {
        self.core().playback_status()
    }

    fn timeline(&self) -> Result<TimelineInfo> {
        self.core().timeline()
    }

    fn play_mode(&self) -> PlayMode {
        self.core().play_mode()
    }

    fn volume(&self) -> VolumeInfo {
        self.core().volume()
    }

    /// Checks that the host can carry out `command` before any local
    /// state changes.
    ///
    /// # Errors
    ///
    /// Returns the reason the command cannot be executed.
    fn prepare(&self, _command: AdapterCommand) -> Result<()> {
        Ok(())
    }

    /// Executes a canonical command against the host.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Reconciler::prepare`], otherwise propagates
    /// the first failing host call.
    fn execute(&self, command: AdapterCommand) -> Result<()> {
        self.prepare(command)?;
        let version = self.version();
        for host_command in self.core().plan(command) {
            debug!(?host_command, %version, "Issuing host command");
            for op in host_command.to_ops(version) {
                self.perform(op)?;
            }
        }
        Ok(())
    }
}
