//! Desired/applied configuration state and its reconciliation.

use tracing::trace;

use crate::config::{self, Directive};
use crate::control::{ControlBlock, DtrMode, Parity, RtsMode, StopBits};
use crate::error::{PortError, Result};
use crate::sys::{CommSys, DeviceHandle, LineCommand};

/// Borrowed view of the device a [`ControlState`] operates on.
#[derive(Clone, Copy)]
pub(crate) struct DeviceRef<'a> {
    pub sys: &'a dyn CommSys,
    pub dev: DeviceHandle,
    pub name: &'a str,
}

/// Line-configuration bookkeeping for one open device.
///
/// `desired` collects what setters ask for; `applied` is the last block
/// the device accepted. Reconciliation pushes the desired block only
/// when the two differ, so repeated identical configuration calls never
/// reach the hardware. The configuration command is coarse and can
/// glitch the line, which is why the diff is mandatory rather than an
/// optimization.
#[derive(Debug, Default)]
pub(crate) struct ControlState {
    desired: ControlBlock,
    applied: ControlBlock,
    /// Logical RTS/DTR line states, cached separately from the flag
    /// encoding so toggling one line never re-derives the other.
    rts: bool,
    dtr: bool,
    init_done: bool,
}

impl ControlState {
    /// Mark the first configuration push as done; line toggles issue
    /// direct hardware commands from here on.
    pub fn finish_init(&mut self) {
        self.init_done = true;
    }

    /// The last configuration the device accepted.
    pub fn applied(&self) -> &ControlBlock {
        &self.applied
    }

    pub fn set_baudrate(&mut self, dev: DeviceRef<'_>, rate: u32) -> Result<()> {
        self.desired.baud_rate = rate;
        self.reconcile(dev)
    }

    /// Word lengths outside {5, 6, 7, 8} are ignored, not rejected.
    pub fn set_wordlen(&mut self, dev: DeviceRef<'_>, bits: u8) -> Result<()> {
        if let 5..=8 = bits {
            self.desired.word_length = bits;
        }
        self.reconcile(dev)
    }

    pub fn set_parity(&mut self, dev: DeviceRef<'_>, parity: Parity) -> Result<()> {
        self.desired.parity = parity;
        self.reconcile(dev)
    }

    pub fn set_stopbits(&mut self, dev: DeviceRef<'_>, count: u8) -> Result<()> {
        self.desired.stop_bits = stop_bits(count)?;
        self.reconcile(dev)
    }

    pub fn set_rts(&mut self, dev: DeviceRef<'_>, on: bool) -> Result<()> {
        self.rts = on;
        self.desired.flags = self.desired.flags.with_rts_mode(manual_rts(on));
        if !self.init_done {
            return Ok(());
        }
        // The escape command toggles the line directly; mirror the flag
        // into the applied snapshot so the next reconcile stays quiet on
        // this field.
        self.applied.flags = self.applied.flags.with_rts_mode(manual_rts(on));
        let (op, command) = if on {
            ("set rts", LineCommand::SetRts)
        } else {
            ("clr rts", LineCommand::ClearRts)
        };
        dev.sys
            .line_command(dev.dev, command)
            .map_err(|e| PortError::device(op, dev.name, e))
    }

    pub fn set_dtr(&mut self, dev: DeviceRef<'_>, on: bool) -> Result<()> {
        self.dtr = on;
        self.desired.flags = self.desired.flags.with_dtr_mode(manual_dtr(on));
        if !self.init_done {
            return Ok(());
        }
        self.applied.flags = self.applied.flags.with_dtr_mode(manual_dtr(on));
        let (op, command) = if on {
            ("set dtr", LineCommand::SetDtr)
        } else {
            ("clr dtr", LineCommand::ClearDtr)
        };
        dev.sys
            .line_command(dev.dev, command)
            .map_err(|e| PortError::device(op, dev.name, e))
    }

    /// Switch RTS/CTS hardware handshaking as a unit.
    ///
    /// Disabling falls back to the cached manual RTS line state.
    pub fn set_rts_cts(&mut self, dev: DeviceRef<'_>, on: bool) -> Result<()> {
        let flags = self.desired.flags;
        self.desired.flags = if on {
            flags.with_rts_mode(RtsMode::Handshake).with_cts_flow(true)
        } else {
            flags.with_cts_flow(false).with_rts_mode(manual_rts(self.rts))
        };
        self.reconcile(dev)
    }

    /// Apply a directive string as one batch with a single push.
    pub fn configure(&mut self, dev: DeviceRef<'_>, directives: &str) -> Result<()> {
        for directive in config::parse(directives)? {
            match directive {
                Directive::Baud(rate) => self.desired.baud_rate = rate,
                Directive::WordLength(bits) => {
                    if let 5..=8 = bits {
                        self.desired.word_length = bits;
                    }
                }
                Directive::Parity(parity) => self.desired.parity = parity,
                Directive::StopBits(count) => self.desired.stop_bits = stop_bits(count)?,
                Directive::Rts(on) => self.set_rts(dev, on)?,
                Directive::Dtr(on) => self.set_dtr(dev, on)?,
            }
        }
        self.reconcile(dev)
    }

    /// Push the desired block if it differs from what the device holds.
    pub fn reconcile(&mut self, dev: DeviceRef<'_>) -> Result<()> {
        if self.desired == self.applied {
            return Ok(());
        }
        trace!(
            device = dev.name,
            baud = self.desired.baud_rate,
            "pushing line configuration"
        );
        dev.sys
            .apply_settings(dev.dev, &self.desired)
            .map_err(|e| PortError::device("setdcb", dev.name, e))?;
        self.applied = self.desired;
        Ok(())
    }
}

fn stop_bits(count: u8) -> Result<StopBits> {
    match count {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        n => Err(PortError::invalid(format!(
            "invalid number of stopbits: {n}"
        ))),
    }
}

fn manual_rts(on: bool) -> RtsMode {
    if on {
        RtsMode::Enabled
    } else {
        RtsMode::Disabled
    }
}

fn manual_dtr(on: bool) -> DtrMode {
    if on {
        DtrMode::Enabled
    } else {
        DtrMode::Disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::MockCommSys;

    fn device(sys: &MockCommSys) -> (DeviceRef<'_>, DeviceHandle) {
        sys.add_device("COM3");
        let dev = sys.open_device("COM3").unwrap();
        (
            DeviceRef {
                sys,
                dev,
                name: "COM3",
            },
            dev,
        )
    }

    #[test]
    fn reconcile_skips_when_nothing_changed() {
        let sys = MockCommSys::new();
        let (dev, _) = device(&sys);
        let mut state = ControlState::default();

        state.set_baudrate(dev, 9600).unwrap();
        assert_eq!(sys.settings_pushes(), 1);
        state.reconcile(dev).unwrap();
        state.set_baudrate(dev, 9600).unwrap();
        assert_eq!(sys.settings_pushes(), 1);
    }

    #[test]
    fn failed_push_leaves_applied_unchanged() {
        let sys = MockCommSys::new();
        let (dev, handle) = device(&sys);
        let mut state = ControlState::default();
        state.set_baudrate(dev, 9600).unwrap();

        // A dead device makes the next push fail.
        sys.close_device(handle).unwrap();
        assert!(state.set_baudrate(dev, 115_200).is_err());
        assert_eq!(state.applied().baud_rate, 9600);
    }

    #[test]
    fn line_toggles_before_init_stay_cached() {
        let sys = MockCommSys::new();
        let (dev, _) = device(&sys);
        let mut state = ControlState::default();

        state.set_rts(dev, true).unwrap();
        state.set_dtr(dev, true).unwrap();
        assert!(sys.line_commands().is_empty(), "no hardware command before init");
        assert_eq!(sys.settings_pushes(), 0);

        state.reconcile(dev).unwrap();
        assert_eq!(sys.settings_pushes(), 1);
        let applied = sys.applied_settings().unwrap();
        assert_eq!(applied.flags.rts_mode(), RtsMode::Enabled);
        assert_eq!(applied.flags.dtr_mode(), DtrMode::Enabled);
    }

    #[test]
    fn line_toggles_after_init_use_escape_commands() {
        let sys = MockCommSys::new();
        let (dev, _) = device(&sys);
        let mut state = ControlState::default();
        state.reconcile(dev).ok();
        state.finish_init();

        state.set_rts(dev, true).unwrap();
        state.set_dtr(dev, false).unwrap();
        assert_eq!(
            sys.line_commands(),
            vec![LineCommand::SetRts, LineCommand::ClearDtr]
        );
        // The applied mirror keeps the next reconcile from re-pushing.
        let before = sys.settings_pushes();
        state.reconcile(dev).unwrap();
        assert_eq!(sys.settings_pushes(), before);
    }
}
