//! Line configuration value types.
//!
//! [`ControlBlock`] is the in-memory record of everything the device's
//! line-configuration command accepts in one push. The handshake bits
//! live in [`ControlFlags`], a typed flag word with named accessors, so
//! the rest of the crate never hand-encodes bit offsets.

use serde::{Deserialize, Serialize};

/// Parity checking modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// RTS line control modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtsMode {
    /// RTS held deasserted.
    #[default]
    Disabled,
    /// RTS held asserted.
    Enabled,
    /// The device drives RTS itself for hardware flow control.
    Handshake,
}

/// DTR line control modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtrMode {
    /// DTR held deasserted.
    #[default]
    Disabled,
    /// DTR held asserted.
    Enabled,
}

/// Handshake and flow-control flag word of a [`ControlBlock`].
///
/// The accessors clear the relevant sub-field before setting it, so
/// updating one line mode never disturbs another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags(u32);

impl ControlFlags {
    const CTS_FLOW: u32 = 1;
    const DTR_SHIFT: u32 = 4;
    const DTR_MASK: u32 = 0b11 << Self::DTR_SHIFT;
    const RTS_SHIFT: u32 = 8;
    const RTS_MASK: u32 = 0b11 << Self::RTS_SHIFT;

    /// Whether transmission is gated on the CTS input line.
    pub fn cts_flow(self) -> bool {
        self.0 & Self::CTS_FLOW != 0
    }

    pub fn with_cts_flow(self, on: bool) -> Self {
        if on {
            Self(self.0 | Self::CTS_FLOW)
        } else {
            Self(self.0 & !Self::CTS_FLOW)
        }
    }

    pub fn rts_mode(self) -> RtsMode {
        match (self.0 & Self::RTS_MASK) >> Self::RTS_SHIFT {
            1 => RtsMode::Enabled,
            2 => RtsMode::Handshake,
            _ => RtsMode::Disabled,
        }
    }

    pub fn with_rts_mode(self, mode: RtsMode) -> Self {
        let value: u32 = match mode {
            RtsMode::Disabled => 0,
            RtsMode::Enabled => 1,
            RtsMode::Handshake => 2,
        };
        Self((self.0 & !Self::RTS_MASK) | (value << Self::RTS_SHIFT))
    }

    pub fn dtr_mode(self) -> DtrMode {
        match (self.0 & Self::DTR_MASK) >> Self::DTR_SHIFT {
            1 => DtrMode::Enabled,
            _ => DtrMode::Disabled,
        }
    }

    pub fn with_dtr_mode(self, mode: DtrMode) -> Self {
        let value: u32 = match mode {
            DtrMode::Disabled => 0,
            DtrMode::Enabled => 1,
        };
        Self((self.0 & !Self::DTR_MASK) | (value << Self::DTR_SHIFT))
    }
}

/// Full line configuration pushed to the device in one command.
///
/// Two of these live on every open port: the desired block mutated by
/// setters, and a snapshot of what the device last accepted. Equality
/// between the two is what makes repeated identical configuration
/// calls free of hardware side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBlock {
    pub flags: ControlFlags,
    pub baud_rate: u32,
    pub word_length: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

/// Snapshot of the modem input lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineState {
    /// Clear To Send.
    pub cts: bool,
    /// Data Set Ready.
    pub dsr: bool,
    /// Ring Indicator.
    pub ring: bool,
    /// Data Carrier Detect.
    pub carrier: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_are_all_off() {
        let flags = ControlFlags::default();
        assert!(!flags.cts_flow());
        assert_eq!(flags.rts_mode(), RtsMode::Disabled);
        assert_eq!(flags.dtr_mode(), DtrMode::Disabled);
    }

    #[test]
    fn rts_mode_clear_then_set() {
        let flags = ControlFlags::default()
            .with_rts_mode(RtsMode::Handshake)
            .with_rts_mode(RtsMode::Enabled);
        assert_eq!(flags.rts_mode(), RtsMode::Enabled);
    }

    #[test]
    fn line_modes_are_independent() {
        let flags = ControlFlags::default()
            .with_rts_mode(RtsMode::Handshake)
            .with_dtr_mode(DtrMode::Enabled)
            .with_cts_flow(true);
        assert_eq!(flags.rts_mode(), RtsMode::Handshake);
        assert_eq!(flags.dtr_mode(), DtrMode::Enabled);
        assert!(flags.cts_flow());

        let flags = flags.with_dtr_mode(DtrMode::Disabled);
        assert_eq!(flags.rts_mode(), RtsMode::Handshake, "DTR update must not disturb RTS");
        assert!(flags.cts_flow(), "DTR update must not disturb CTS flow");
    }

    #[test]
    fn control_block_equality_covers_every_field() {
        let block = ControlBlock {
            baud_rate: 115_200,
            word_length: 8,
            ..Default::default()
        };
        let mut other = block;
        assert_eq!(block, other);

        other.stop_bits = StopBits::Two;
        assert_ne!(block, other);
    }
}
