//! Controller-in-charge role.

use log::{debug, warn};
use snafu::ensure;

use crate::bus::{BusMode, Clock, Gpio};
use crate::commands::{DCL, GET, GTL, LAD, LLO, SDC, SPD, SPE, TAD, UNL, UNT};
use crate::node::{HandshakeState, Node, NodeState, Role, TransmitMode};
use crate::pinmap::Signal;
use crate::types::Address;
use crate::{AddressingFailureSnafu, Error, UnsupportedRoleSnafu};

impl<G: Gpio, C: Clock> Node<G, C> {
    fn ensure_controller(&self) -> Result<(), Error> {
        ensure!(
            matches!(self.role, Role::Controller { .. }),
            UnsupportedRoleSnafu
        );
        Ok(())
    }

    /// Take charge of the bus: clear all devices, pulse IFC and, for a
    /// configured primary address of 2 or more, address that instrument to
    /// listen.
    pub(crate) fn controller_init(&mut self) -> Result<(), Error> {
        self.init_lines();
        self.send_all_clear()?;
        self.deinit();
        // settle
        self.clock.delay_ms(200);
        self.set_state(NodeState::Init)?;
        self.io.ready_data_bus();
        self.send_ifc()?;

        let paddr = self.config.paddr;
        if *paddr > 1 {
            if let Err(e) = self.address_device(paddr, false) {
                warn!("instrument at {} did not respond: {}", *paddr, e);
            }
        }
        Ok(())
    }

    pub(crate) fn controller_set_state(&mut self, state: NodeState) -> Result<(), Error> {
        let m = *self.io.masks();
        let atn = m[Signal::Atn];
        match state {
            NodeState::Init => {
                self.io.set_mode(m[Signal::Srq], BusMode::InputPullup);
                self.io.set_mode(
                    m[Signal::Ifc] | m[Signal::Ren] | atn,
                    BusMode::OutputHigh,
                );
                self.set_transmit_mode(TransmitMode::Idle);
                self.io.assert_signal(m[Signal::Ren]);
            }
            NodeState::Idle => {
                if let Err(e) = self.unaddress_device() {
                    warn!("failed to unaddress instrument: {}", e);
                }
                self.set_transmit_mode(TransmitMode::Idle);
                self.io.clear_signal(atn);
            }
            NodeState::Command => {
                self.set_transmit_mode(TransmitMode::Send);
                self.io.assert_signal(atn);
            }
            NodeState::Listen => {
                // the instrument talks, we listen
                let paddr = self.config.paddr;
                self.address_device(paddr, true)?;
                self.set_transmit_mode(TransmitMode::Receive);
                self.io.clear_signal(atn);
            }
            NodeState::Talk => {
                // listeners are addressed by the caller
                self.set_transmit_mode(TransmitMode::Send);
                self.io.clear_signal(atn);
            }
            NodeState::Invalid => {}
        }
        self.enter(state);
        Ok(())
    }

    /// Return every device on the bus to local mode: release REN, then pulse
    /// ATN together with REN.
    pub fn send_all_clear(&mut self) -> Result<(), Error> {
        self.ensure_controller()?;
        let (atn, ren) = (self.io.bit(Signal::Atn), self.io.bit(Signal::Ren));
        self.io.clear_signal(ren);
        self.clock.delay_ms(40);
        self.io.assert_signal(atn | ren);
        self.clock.delay_ms(40);
        self.io.clear_signal(atn);
        Ok(())
    }

    /// Pulse IFC to become controller-in-charge.
    pub fn send_ifc(&mut self) -> Result<(), Error> {
        self.ensure_controller()?;
        let ifc = self.io.bit(Signal::Ifc);
        self.io.assert_signal(ifc);
        self.clock.delay_ms(150);
        self.io.clear_signal(ifc);
        Ok(())
    }

    /// Send one multiline command byte with ATN asserted.
    /// # Errors
    /// [`Error::AddressingFailure`] if the handshake fails.
    pub fn send_cmd(&mut self, command: u8) -> Result<(), Error> {
        self.ensure_controller()?;
        if self.state != NodeState::Command {
            self.set_state(NodeState::Command)?;
        }

        match self.write_byte(command, false) {
            HandshakeState::Complete => Ok(()),
            state => {
                debug!("command {:#04x} failed in {:?}", command, state);
                AddressingFailureSnafu { command }.fail()
            }
        }
    }

    /// Unlisten the bus, then address the instrument at `addr` to talk
    /// (`talk == true`) or to listen.
    ///
    /// No retry is attempted; the instrument is only marked addressed when
    /// both commands went through.
    pub fn address_device(&mut self, addr: Address, talk: bool) -> Result<(), Error> {
        self.send_cmd(UNL)?;
        let group = if talk { TAD } else { LAD };
        self.send_cmd(group + *addr)?;
        debug!(
            "addressed {} to {}",
            *addr,
            if talk { "talk" } else { "listen" }
        );
        self.set_device_addressed(true);
        Ok(())
    }

    /// Unlisten and untalk the bus.
    ///
    /// Returns `Ok(false)` without touching the bus when no instrument is
    /// addressed.
    pub fn unaddress_device(&mut self) -> Result<bool, Error> {
        self.ensure_controller()?;
        if !self.is_device_addressed() {
            return Ok(false);
        }
        // de-bounce
        self.clock.delay_us(30);
        self.send_cmd(UNL)?;
        self.send_cmd(UNT)?;
        self.set_device_addressed(false);
        Ok(true)
    }

    /// Read the status byte of the instrument at `addr`.
    pub fn serial_poll(&mut self, addr: Address) -> Result<u8, Error> {
        self.ensure_controller()?;
        let result = self.poll_status(addr);
        self.return_to_idle();
        result
    }

    fn poll_status(&mut self, addr: Address) -> Result<u8, Error> {
        self.send_cmd(UNL)?;
        self.send_cmd(SPE)?;
        self.send_cmd(TAD + *addr)?;
        self.set_device_addressed(true);

        self.set_transmit_mode(TransmitMode::Receive);
        let atn = self.io.bit(Signal::Atn);
        self.io.clear_signal(atn);
        self.enter(NodeState::Listen);
        let read = self.read_byte(false);

        // leave serial poll mode even if the status byte never came
        let disabled = self.send_cmd(SPD);
        if read.state != HandshakeState::Complete {
            return Err(Error::from_handshake(read.state));
        }
        disabled?;
        Ok(read.byte)
    }

    /// Selected Device Clear for the instrument at `addr`.
    pub fn clear_device(&mut self, addr: Address) -> Result<(), Error> {
        self.send_addressed(addr, SDC)
    }

    /// Group Execute Trigger for the instrument at `addr`.
    pub fn trigger(&mut self, addr: Address) -> Result<(), Error> {
        self.send_addressed(addr, GET)
    }

    /// Return the instrument at `addr` to local control.
    pub fn go_to_local(&mut self, addr: Address) -> Result<(), Error> {
        self.send_addressed(addr, GTL)
    }

    /// Disable the front panel local controls of every device.
    pub fn local_lockout(&mut self) -> Result<(), Error> {
        self.send_universal(LLO)
    }

    /// Device Clear for every device on the bus.
    pub fn clear_all(&mut self) -> Result<(), Error> {
        self.send_universal(DCL)
    }

    /// True while some device requests service.
    pub fn is_srq_asserted(&mut self) -> bool {
        let srq = self.io.bit(Signal::Srq);
        self.io.is_asserted(srq)
    }

    fn send_addressed(&mut self, addr: Address, command: u8) -> Result<(), Error> {
        self.ensure_controller()?;
        let result = self
            .address_device(addr, false)
            .and_then(|_| self.send_cmd(command));
        self.return_to_idle();
        result
    }

    fn send_universal(&mut self, command: u8) -> Result<(), Error> {
        self.ensure_controller()?;
        let result = self.send_cmd(command);
        self.return_to_idle();
        result
    }
}
