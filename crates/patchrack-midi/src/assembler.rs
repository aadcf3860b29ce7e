//! NRPN parameter-change assembly
//!
//! A single parameter change arrives as up to four small control-change
//! messages: the high and low halves of the controller number (CC 99/98)
//! and the high and low halves of the value (CC 6/38). This module folds
//! such a stream into discrete (controller, value) pairs through an
//! explicit state value, so every transition is unit-testable in isolation.
//!
//! The state is per device instance; nothing here is shared.

/// Standard NRPN control-change numbers
const CC_NRPN_MSB: u8 = 99;
const CC_NRPN_LSB: u8 = 98;
const CC_DATA_ENTRY_MSB: u8 = 6;
const CC_DATA_ENTRY_LSB: u8 = 38;

/// Which half of which quantity a control-change message carries
///
/// Ordering matters: a role recurring while a *later* role is already
/// filled marks a torn assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NrpnRole {
    NumberMsb,
    NumberLsb,
    ValueMsb,
    ValueLsb,
}

impl NrpnRole {
    /// Map a control-change number to its assembly role
    pub fn from_cc(cc: u8) -> Option<Self> {
        match cc {
            CC_NRPN_MSB => Some(Self::NumberMsb),
            CC_NRPN_LSB => Some(Self::NumberLsb),
            CC_DATA_ENTRY_MSB => Some(Self::ValueMsb),
            CC_DATA_ENTRY_LSB => Some(Self::ValueLsb),
            _ => None,
        }
    }
}

/// Partially collected halves of one parameter change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NrpnPartial {
    number_msb: Option<u8>,
    number_lsb: Option<u8>,
    value_msb: Option<u8>,
    value_lsb: Option<u8>,
}

impl NrpnPartial {
    fn get(&self, role: NrpnRole) -> Option<u8> {
        match role {
            NrpnRole::NumberMsb => self.number_msb,
            NrpnRole::NumberLsb => self.number_lsb,
            NrpnRole::ValueMsb => self.value_msb,
            NrpnRole::ValueLsb => self.value_lsb,
        }
    }

    fn set(&mut self, role: NrpnRole, half: u8) {
        match role {
            NrpnRole::NumberMsb => self.number_msb = Some(half),
            NrpnRole::NumberLsb => self.number_lsb = Some(half),
            NrpnRole::ValueMsb => self.value_msb = Some(half),
            NrpnRole::ValueLsb => self.value_lsb = Some(half),
        }
    }

    /// True if any role strictly after `role` has been filled
    fn has_later_than(&self, role: NrpnRole) -> bool {
        [
            NrpnRole::NumberMsb,
            NrpnRole::NumberLsb,
            NrpnRole::ValueMsb,
            NrpnRole::ValueLsb,
        ]
        .iter()
        .any(|&r| r > role && self.get(r).is_some())
    }

    /// The combined (controller, value) once all four halves are present
    fn complete(&self) -> Option<(u16, i32)> {
        match (self.number_msb, self.number_lsb, self.value_msb, self.value_lsb) {
            (Some(nm), Some(nl), Some(vm), Some(vl)) => {
                let controller = ((nm as u16) << 7) | nl as u16;
                let value = ((vm as i32) << 7) | vl as i32;
                Some((controller, value))
            }
            _ => None,
        }
    }
}

/// Assembly state for one device instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblerState {
    /// No partial assembly in progress
    #[default]
    Idle,
    /// Halves collected so far
    Accumulating(NrpnPartial),
}

impl AssemblerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Advance the machine by one classified half
    ///
    /// Returns the completed (controller, value) pair when this message
    /// fills the last missing role. Rules:
    /// - from `Idle`, any role starts a fresh accumulation;
    /// - a recurring role with no later role filled overwrites (devices
    ///   may resend a half on update);
    /// - a recurring role while a later role is filled is a torn assembly:
    ///   everything collected is discarded, including the triggering
    ///   message, and the machine returns to `Idle`.
    pub fn advance(self, role: NrpnRole, half: u8) -> (Option<(u16, i32)>, Self) {
        let mut partial = match self {
            Self::Idle => NrpnPartial::default(),
            Self::Accumulating(partial) => {
                if partial.get(role).is_some() && partial.has_later_than(role) {
                    log::debug!("nrpn: torn assembly on {:?}, discarding partial", role);
                    return (None, Self::Idle);
                }
                partial
            }
        };

        partial.set(role, half);

        match partial.complete() {
            Some(pair) => (Some(pair), Self::Idle),
            None => (None, Self::Accumulating(partial)),
        }
    }
}
