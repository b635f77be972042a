//! Virtual and physical remotes.
//!
//! A [`Remote`] is one RTS identity this bridge transmits as: a 24-bit id, a rolling
//! code that must advance with every press, and the blinds paired with it. Motors
//! reject frames whose rolling code falls behind what they last accepted, so the
//! rolling code has to be persisted; [`Remote::take_dirty`] tells the storage
//! layer when a fresh [`RemoteConfig`] snapshot is due.
//!
//! [`RemoteRegistry`] holds the known remotes and routes commands received from
//! physical remotes to them.

use heapless::{String, Vec};
use thiserror::Error;

use crate::consts::{REMOTE_ID_MASK, SHORT_PRESS};
use crate::frame::Button;
use crate::queue::RadioQueue;
use crate::receive::ReceivedCommand;

/// Maximum length of a remote name, in bytes.
pub const REMOTE_NAME_LEN: usize = 32;
/// Maximum number of blinds paired with one remote.
pub const MAX_ASSOCIATED_BLINDS: usize = 16;
/// Maximum number of remotes in a [`RemoteRegistry`].
pub const MAX_REMOTES: usize = 16;
/// Number of unknown remote ids kept for discovery.
pub const MAX_DETECTED_REMOTES: usize = 4;

/// Errors from managing remotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RemoteError {
    /// The name doesn't fit in [`REMOTE_NAME_LEN`] bytes.
    #[error("remote name longer than {} bytes", REMOTE_NAME_LEN)]
    NameTooLong,
    /// The remote already has [`MAX_ASSOCIATED_BLINDS`] blinds.
    #[error("too many blinds associated with one remote")]
    TooManyBlinds,
    /// The registry already holds [`MAX_REMOTES`] remotes.
    #[error("remote registry is full")]
    RegistryFull,
    /// A remote with this id is already registered.
    #[error("remote {0:#x} already registered")]
    DuplicateRemote(u32),
}

/// Persisted state of a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Display name.
    pub name: String<REMOTE_NAME_LEN>,
    /// 24-bit RTS identity.
    pub remote_id: u32,
    /// Rolling code of the next press.
    pub rolling_code: u16,
    /// Ids of the blinds this remote controls.
    pub blinds: Vec<u16, MAX_ASSOCIATED_BLINDS>,
}

/// An RTS identity the bridge transmits as, or a physical remote it tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    config: RemoteConfig,
    dirty: bool,
}

impl Remote {
    /// Creates a remote with no blinds.
    ///
    /// # Errors
    /// [`RemoteError::NameTooLong`] if `name` is longer than [`REMOTE_NAME_LEN`] bytes.
    pub fn new(name: &str, remote_id: u32, rolling_code: u16) -> Result<Self, RemoteError> {
        Ok(Self::from_config(RemoteConfig {
            name: to_name(name)?,
            remote_id: remote_id & REMOTE_ID_MASK,
            rolling_code,
            blinds: Vec::new(),
        }))
    }

    /// Restores a remote from its persisted state.
    pub fn from_config(config: RemoteConfig) -> Self {
        Self {
            config,
            dirty: false,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Renames the remote.
    pub fn set_name(&mut self, name: &str) -> Result<(), RemoteError> {
        self.config.name = to_name(name)?;
        self.dirty = true;
        Ok(())
    }

    /// 24-bit RTS identity.
    pub fn remote_id(&self) -> u32 {
        self.config.remote_id
    }

    /// Rolling code the next press will carry.
    pub fn rolling_code(&self) -> u16 {
        self.config.rolling_code
    }

    /// Ids of the blinds this remote controls.
    pub fn associated_blinds(&self) -> &[u16] {
        &self.config.blinds
    }

    /// Presses `buttons` (possibly chorded) for `repeat` repeats.
    ///
    /// The rolling code only advances if the command was queued, so a full queue
    /// never opens a gap the motors would have to skip over.
    pub fn press_buttons(&mut self, queue: &RadioQueue, buttons: Button, repeat: u16) -> bool {
        let queued = queue.queue_command(
            self.config.remote_id,
            self.config.rolling_code,
            buttons,
            repeat,
        );
        if queued {
            self.config.rolling_code = self.config.rolling_code.wrapping_add(1);
            self.dirty = true;
        }
        queued
    }

    /// Runs a named action as a short press.
    pub fn press(&mut self, queue: &RadioQueue, action: RemoteAction) -> bool {
        self.press_buttons(queue, action.button(), SHORT_PRESS)
    }

    /// Takes over the rolling code of a frame received from this remote.
    ///
    /// Used for physical remotes: the next code expected from them is one past the
    /// last one seen.
    pub fn adopt_received(&mut self, rolling_code: u16) {
        let next = rolling_code.wrapping_add(1);
        if next != self.config.rolling_code {
            self.config.rolling_code = next;
            self.dirty = true;
        }
    }

    /// Pairs a blind with this remote. Pairing an already paired blind is a no-op.
    pub fn associate_blind(&mut self, blind_id: u16) -> Result<(), RemoteError> {
        if self.config.blinds.contains(&blind_id) {
            return Ok(());
        }
        self.config
            .blinds
            .push(blind_id)
            .map_err(|_| RemoteError::TooManyBlinds)?;
        self.dirty = true;
        Ok(())
    }

    /// Unpairs a blind. Returns whether it was paired.
    pub fn disassociate_blind(&mut self, blind_id: u16) -> bool {
        match self.config.blinds.iter().position(|&id| id == blind_id) {
            Some(index) => {
                let _ = self.config.blinds.remove(index);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Current persisted state.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Returns whether the state changed since the last call, and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }
}

fn to_name(name: &str) -> Result<String<REMOTE_NAME_LEN>, RemoteError> {
    let mut out = String::new();
    out.push_str(name).map_err(|_| RemoteError::NameTooLong)?;
    Ok(out)
}

/// A command received as a text payload, e.g. from a home-automation bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RemoteAction {
    /// Raise the blind.
    Up,
    /// Lower the blind.
    Down,
    /// Stop, or go to the favourite position.
    Stop,
}

impl RemoteAction {
    /// Parses `up`, `down` or `stop`. Anything else is ignored.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match payload {
            b"up" => Some(Self::Up),
            b"down" => Some(Self::Down),
            b"stop" => Some(Self::Stop),
            _ => None,
        }
    }

    /// The button sent for this action.
    pub fn button(self) -> Button {
        match self {
            Self::Up => Button::UP,
            Self::Down => Button::DOWN,
            Self::Stop => Button::MY,
        }
    }
}

/// The set of known remotes, plus ids of unknown ones heard on air.
#[derive(Debug, Default)]
pub struct RemoteRegistry {
    remotes: Vec<Remote, MAX_REMOTES>,
    detected: Vec<u32, MAX_DETECTED_REMOTES>,
}

impl RemoteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a remote.
    ///
    /// # Errors
    /// - [`RemoteError::DuplicateRemote`] if its id is already registered
    /// - [`RemoteError::RegistryFull`] if there is no room
    pub fn add(&mut self, remote: Remote) -> Result<(), RemoteError> {
        let id = remote.remote_id();
        if self.get(id).is_some() {
            return Err(RemoteError::DuplicateRemote(id));
        }
        self.remotes
            .push(remote)
            .map_err(|_| RemoteError::RegistryFull)?;
        self.detected.retain(|&detected| detected != id);
        Ok(())
    }

    /// Unregisters a remote and returns it.
    pub fn remove(&mut self, remote_id: u32) -> Option<Remote> {
        let index = self
            .remotes
            .iter()
            .position(|remote| remote.remote_id() == remote_id)?;
        Some(self.remotes.remove(index))
    }

    /// Looks up a remote by id.
    pub fn get(&self, remote_id: u32) -> Option<&Remote> {
        self.remotes.iter().find(|remote| remote.remote_id() == remote_id)
    }

    /// Looks up a remote by id, mutably.
    pub fn get_mut(&mut self, remote_id: u32) -> Option<&mut Remote> {
        self.remotes
            .iter_mut()
            .find(|remote| remote.remote_id() == remote_id)
    }

    /// Iterates over the registered remotes, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Remote> {
        self.remotes.iter()
    }

    /// Number of registered remotes.
    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    /// Whether no remote is registered.
    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }

    /// Handles a command heard from a physical remote.
    ///
    /// # Returns
    /// - `Some(blinds)`: the remote is known; its rolling code now follows the received
    ///   one, and `blinds` are the blinds it controls
    /// - `None`: the remote is unknown; its id was kept for discovery if there was room
    pub fn external_button_press(&mut self, command: &ReceivedCommand) -> Option<&[u16]> {
        let Some(index) = self
            .remotes
            .iter()
            .position(|remote| remote.remote_id() == command.remote_id)
        else {
            self.detect(command.remote_id);
            return None;
        };

        let remote = &mut self.remotes[index];
        remote.adopt_received(command.rolling_code);
        debug!(
            "Remote {:#x} pressed {:?}, {} repeats",
            command.remote_id, command.button, command.repeat
        );
        Some(remote.associated_blinds())
    }

    /// Ids of unknown remotes heard on air, oldest first.
    pub fn detected(&self) -> &[u32] {
        &self.detected
    }

    /// Forgets the detected remote ids.
    pub fn clear_detected(&mut self) {
        self.detected.clear();
    }

    fn detect(&mut self, remote_id: u32) {
        if self.detected.contains(&remote_id) {
            return;
        }
        match self.detected.push(remote_id) {
            Ok(()) => info!("Detected unknown remote {:#x}", remote_id),
            Err(_) => debug!("Ignoring unknown remote {:#x}, discovery list full", remote_id),
        }
    }
}
