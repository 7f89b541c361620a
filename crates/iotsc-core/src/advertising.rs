//! Advertising control state machine
//!
//! The controller looks at two observed booleans (connected, advertising)
//! and the `auto_advertise` policy whenever a remote peer connects or
//! disconnects, and decides whether advertising must be started or stopped.
//! It never talks to the platform itself: it returns an
//! [`AdvertisingCommand`] and the peripheral executes it.
//!
//! Evaluation always sees the state as it was *before* the triggering event
//! is committed. A connect is therefore evaluated while `is_connected` is
//! still false, which is what lets advertising be stopped without ever
//! toggling it during an established connection.

use std::fmt;

// ----------------------------------------------------------------------------
// Inputs and Outputs
// ----------------------------------------------------------------------------

/// Command for the platform advertising interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvertisingCommand {
    Start,
    Stop,
}

impl fmt::Display for AdvertisingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start advertising"),
            Self::Stop => write!(f, "stop advertising"),
        }
    }
}

/// What prompted an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Peripheral finished registering with the platform
    Startup,
    RemoteConnected,
    RemoteDisconnected,
}

/// Observed link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkState {
    pub is_connected: bool,
    pub is_advertising: bool,
}

impl LinkState {
    pub const fn new(is_connected: bool, is_advertising: bool) -> Self {
        Self {
            is_connected,
            is_advertising,
        }
    }
}

/// Named states of the advertising lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvertisingState {
    /// Not advertising, not connected
    Idle,
    /// Advertising, not connected
    Advertising,
    /// Connected, advertising was stopped
    ConnectedNoAdvertising,
    /// Connected, advertising was never stopped
    ConnectedStillAdvertising,
}

impl From<LinkState> for AdvertisingState {
    fn from(state: LinkState) -> Self {
        match (state.is_connected, state.is_advertising) {
            (false, false) => Self::Idle,
            (false, true) => Self::Advertising,
            (true, false) => Self::ConnectedNoAdvertising,
            (true, true) => Self::ConnectedStillAdvertising,
        }
    }
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

/// Decides advertising transitions from connection events
#[derive(Debug, Clone)]
pub struct AdvertisingController {
    auto_advertise: bool,
    /// Inputs of the last evaluation that issued a command still in flight
    issued: Option<(Trigger, LinkState)>,
}

impl AdvertisingController {
    pub fn new(auto_advertise: bool) -> Self {
        Self {
            auto_advertise,
            issued: None,
        }
    }

    pub fn auto_advertise(&self) -> bool {
        self.auto_advertise
    }

    /// Evaluate `trigger` against the state observed before it is applied.
    ///
    /// A repeated evaluation with the same inputs issues nothing.
    pub fn evaluate(&mut self, trigger: Trigger, observed: LinkState) -> Option<AdvertisingCommand> {
        if self.issued == Some((trigger, observed)) {
            return None;
        }

        let command = decide(self.auto_advertise, trigger, observed);
        if command.is_some() {
            self.issued = Some((trigger, observed));
        }
        command
    }

    /// Forget the last issued command so the same inputs can issue it again.
    ///
    /// Called when the platform rejected the command.
    pub fn reset(&mut self) {
        self.issued = None;
    }
}

/// Transition function of the controller
pub fn decide(
    auto_advertise: bool,
    trigger: Trigger,
    observed: LinkState,
) -> Option<AdvertisingCommand> {
    match trigger {
        // Advertising cannot be toggled once a connection is established, so
        // it is stopped only while the incoming connection is not yet committed
        Trigger::RemoteConnected => (auto_advertise
            && !observed.is_connected
            && observed.is_advertising)
            .then_some(AdvertisingCommand::Stop),
        Trigger::RemoteDisconnected => {
            (!observed.is_advertising).then_some(AdvertisingCommand::Start)
        }
        Trigger::Startup => (!observed.is_connected && !observed.is_advertising)
            .then_some(AdvertisingCommand::Start),
    }
}
