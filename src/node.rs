//! See [`Node`] for more details.

use log::{debug, trace};

use crate::bus::{BusMode, Clock, Gpio};
use crate::data::Data;
use crate::interface::IoInterface;
use crate::pinmap::{PinMap, Signal};
use crate::types::{Config, Eor};
use crate::Error;

/// Logical bus state of a node.
///
/// Each role maps these onto its own line configuration, see
/// [`Node::set_state`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeState {
    Invalid,
    Init,
    Idle,
    /// Sending multiline commands with ATN asserted. Controller only.
    Command,
    /// Receiving data.
    Listen,
    /// Sending data.
    Talk,
}

/// Progress of a single byte handshake.
///
/// A call to [`Node::read_byte`] or [`Node::write_byte`] that doesn't return
/// `Complete` has failed; the returned state tells how far it got.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    Complete,
    IfcAsserted,
    AtnAsserted,
    // read
    WaitForData,
    ReadData,
    DataAccepted,
    // write
    WaitForReceiverReady,
    PlaceData,
    DataReady,
    ReceiverAccepting,
}

/// Direction of the handshake lines.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransmitMode {
    /// All handshake lines released.
    Idle,
    /// Drive NRFD and NDAC, listen to DAV and EOI.
    Receive,
    /// Drive DAV and EOI, listen to NRFD and NDAC.
    Send,
}

/// The part a node plays on the bus, chosen at construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Controller-in-charge, remembering whether the configured instrument
    /// is currently addressed.
    Controller { device_addressed: bool },
    /// Addressed instrument. Only the byte handshake is available.
    Device,
}

/// Outcome of [`Node::read_byte`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ByteRead {
    pub state: HandshakeState,
    pub byte: u8,
    /// EOI was asserted together with this byte.
    pub eoi: bool,
}

/// A GPIB bus node.
///
/// The node owns the GPIO bank and the clock it runs on, so it has to stay
/// within one task. All operations busy-poll the bus lines and return once
/// the transfer is done, `Config::rtmo` expires, or the bus aborts it.
///
/// # Example
///
/// ```no_run
/// # use gpib_node::{Clock, Gpio};
/// # struct Pins; struct Ticks;
/// # impl Gpio for Pins {
/// #     fn get_all(&mut self) -> u32 { 0 }
/// #     fn put_masked(&mut self, _: u32, _: u32) {}
/// #     fn set_dir_masked(&mut self, _: u32, _: u32) {}
/// #     fn set_pulls(&mut self, _: u32, _: bool) {}
/// # }
/// # impl Clock for Ticks {
/// #     fn millis(&self) -> u32 { 0 }
/// #     fn delay_ms(&mut self, _: u32) {}
/// #     fn delay_us(&mut self, _: u32) {}
/// # }
/// use gpib_node::{addr, Config, Data, Eor, Node, PinMap};
///
/// let pins = PinMap::new([6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21]).unwrap();
/// let config = Config { paddr: addr(9), eor: Eor::Lf, ..Config::default() };
/// let mut node = Node::controller(pins, config, Pins, Ticks);
/// node.init().unwrap();
///
/// node.address_device(addr(9), false).unwrap();
/// let mut reading = Data::new();
/// if node.send_data(b"MEAS:VOLT?").is_ok() && node.receive_data(&mut reading, false, None).is_ok() {
///     println!("{}", reading);
/// }
/// ```
#[derive(Debug)]
pub struct Node<G, C> {
    pub(crate) io: IoInterface<G>,
    pub(crate) clock: C,
    pub(crate) config: Config,
    pub(crate) state: NodeState,
    pub(crate) role: Role,
}

impl<G: Gpio, C: Clock> Node<G, C> {
    pub fn new(pins: PinMap, config: Config, gpio: G, clock: C, role: Role) -> Self {
        Self {
            io: IoInterface::new(pins, gpio),
            clock,
            config,
            state: NodeState::Invalid,
            role,
        }
    }

    /// Create a node acting as controller-in-charge.
    pub fn controller(pins: PinMap, config: Config, gpio: G, clock: C) -> Self {
        Self::new(
            pins,
            config,
            gpio,
            clock,
            Role::Controller {
                device_addressed: false,
            },
        )
    }

    /// Create a node acting as an addressed device.
    pub fn device(pins: PinMap, config: Config, gpio: G, clock: C) -> Self {
        Self::new(pins, config, gpio, clock, Role::Device)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_device(&self) -> bool {
        self.role == Role::Device
    }

    /// True while the controller has the configured instrument addressed.
    pub fn is_device_addressed(&self) -> bool {
        matches!(
            self.role,
            Role::Controller {
                device_addressed: true
            }
        )
    }

    pub(crate) fn set_device_addressed(&mut self, addressed: bool) {
        if let Role::Controller { device_addressed } = &mut self.role {
            *device_addressed = addressed;
        }
    }

    /// Give back the GPIO bank and clock.
    pub fn release(self) -> (G, C) {
        (self.io.into_gpio(), self.clock)
    }

    /// Bring up the bus for this node's role.
    /// # Errors
    /// Device nodes return [`Error::UnsupportedRole`].
    pub fn init(&mut self) -> Result<(), Error> {
        match self.role {
            Role::Controller { .. } => self.controller_init(),
            Role::Device => self.device_init(),
        }
    }

    /// Stop driving the bus; every line is released to input.
    pub fn deinit(&mut self) {
        self.state = NodeState::Invalid;
        let all = self.io.masks().all;
        self.io.reset_bus(all);
    }

    /// Configure the bus lines for `state`.
    /// # Errors
    /// Fails if addressing the instrument fails on the way into `Listen`,
    /// and with [`Error::UnsupportedRole`] for device nodes.
    pub fn set_state(&mut self, state: NodeState) -> Result<(), Error> {
        match self.role {
            Role::Controller { .. } => self.controller_set_state(state),
            Role::Device => self.device_set_state(state),
        }
    }

    pub(crate) fn enter(&mut self, state: NodeState) {
        if self.state != state {
            debug!("{:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    /// Route every bus pin to software control with pull-ups.
    pub(crate) fn init_lines(&mut self) {
        let all = self.io.masks().all;
        self.io.bus().init_lines(all);
    }

    pub fn set_transmit_mode(&mut self, mode: TransmitMode) {
        let m = *self.io.masks();
        let (dav, eoi) = (m[Signal::Dav], m[Signal::Eoi]);
        let (nrfd, ndac) = (m[Signal::Nrfd], m[Signal::Ndac]);
        match mode {
            TransmitMode::Idle => self.io.reset_bus(m.hand),
            TransmitMode::Receive => {
                self.io.set_mode(dav | eoi, BusMode::InputPullup);
                self.io.set_mode(nrfd | ndac, BusMode::OutputLow);
            }
            TransmitMode::Send => {
                self.io.set_mode(nrfd | ndac, BusMode::InputPullup);
                self.io.set_mode(dav | eoi, BusMode::OutputHigh);
            }
        }
    }

    fn within_timeout(&self, start: u32) -> bool {
        self.clock.millis().wrapping_sub(start) < self.config.rtmo
    }

    /// Accept one byte from the current talker.
    ///
    /// With `read_with_eoi` the EOI line is sampled together with the data.
    pub fn read_byte(&mut self, read_with_eoi: bool) -> ByteRead {
        use HandshakeState::*;

        let m = *self.io.masks();
        let device = self.is_device();
        let atn_at_start = self.io.is_asserted(m[Signal::Atn]);
        let mut read = ByteRead {
            state: Start,
            byte: 0,
            eoi: false,
        };

        let start = self.clock.millis();
        while self.within_timeout(start) {
            if device {
                if self.io.is_asserted(m[Signal::Ifc]) {
                    read.state = IfcAsserted;
                    break;
                }
                if self.io.is_asserted(m[Signal::Atn]) != atn_at_start {
                    read.state = AtnAsserted;
                    break;
                }
            }

            match read.state {
                Start => {
                    // ready for data
                    self.io.clear_signal(m[Signal::Nrfd]);
                    read.state = WaitForData;
                }
                WaitForData => {
                    if self.io.is_asserted(m[Signal::Dav]) {
                        self.io.assert_signal(m[Signal::Nrfd]);
                        read.state = ReadData;
                    }
                }
                ReadData => {
                    read.eoi = read_with_eoi && self.io.is_asserted(m[Signal::Eoi]);
                    read.byte = self.io.load_data_byte();
                    // data accepted
                    self.io.clear_signal(m[Signal::Ndac]);
                    read.state = DataAccepted;
                }
                DataAccepted => {
                    if !self.io.is_asserted(m[Signal::Dav]) {
                        self.io.assert_signal(m[Signal::Ndac]);
                        read.state = Complete;
                        break;
                    }
                }
                _ => break,
            }
        }

        if read.state != Complete {
            trace!("read handshake stopped in {:?}", read.state);
        }
        read
    }

    /// Source one byte to the listeners.
    ///
    /// EOI is asserted together with the byte when `is_last` is set and
    /// `Config::eoi` is enabled. The data lines are released again on every
    /// exit, including timeouts and aborts.
    pub fn write_byte(&mut self, byte: u8, is_last: bool) -> HandshakeState {
        use HandshakeState::*;

        let m = *self.io.masks();
        let device = self.is_device();
        let dav = if self.config.eoi && is_last {
            m[Signal::Dav] | m[Signal::Eoi]
        } else {
            m[Signal::Dav]
        };
        let mut state = Start;

        let start = self.clock.millis();
        while self.within_timeout(start) {
            if device {
                if self.io.is_asserted(m[Signal::Ifc]) {
                    state = IfcAsserted;
                } else if self.io.is_asserted(m[Signal::Atn]) {
                    state = AtnAsserted;
                }
            }

            match state {
                Start => {
                    // listeners present and holding NDAC
                    if self.io.is_asserted(m[Signal::Ndac]) {
                        state = WaitForReceiverReady;
                    }
                }
                WaitForReceiverReady => {
                    if !self.io.is_asserted(m[Signal::Nrfd]) {
                        state = PlaceData;
                    }
                }
                PlaceData => {
                    self.io.push_data_byte(byte);
                    self.io.assert_signal(dav);
                    state = DataReady;
                }
                DataReady => {
                    if self.io.is_asserted(m[Signal::Nrfd]) {
                        state = ReceiverAccepting;
                    }
                }
                ReceiverAccepting => {
                    if !self.io.is_asserted(m[Signal::Ndac]) {
                        state = Complete;
                        break;
                    }
                }
                IfcAsserted | AtnAsserted => {
                    self.set_transmit_mode(TransmitMode::Receive);
                    self.io.ready_data_bus();
                    break;
                }
                _ => break,
            }
        }

        match state {
            Complete => {
                self.io.clear_signal(dav);
                self.io.ready_data_bus();
            }
            DataReady | ReceiverAccepting => {
                // timed out with the byte on the bus
                trace!("write handshake for {:#04x} stopped in {:?}", byte, state);
                self.io.clear_signal(dav);
                self.io.ready_data_bus();
            }
            _ => trace!("write handshake for {:#04x} stopped in {:?}", byte, state),
        }
        state
    }

    /// Receive a message into `data`.
    ///
    /// Reception stops after a byte that carries EOI (when EOI termination
    /// is active), that equals `end_byte`, or that completes the configured
    /// [`Eor`] sequence. An ATN assertion between bytes also ends the message.
    /// The node returns to `Idle` afterwards, whatever the outcome.
    ///
    /// EOI termination is active when `detect_eoi` is set, when `Config::eoi`
    /// is enabled, when the EOR mode is [`Eor::Space`], and for device nodes.
    ///
    /// # Errors
    /// Handshake failures, a full buffer, or failing to address the talker.
    /// Bytes received before the error stay in `data`.
    pub fn receive_data(
        &mut self,
        data: &mut Data,
        detect_eoi: bool,
        end_byte: Option<u8>,
    ) -> Result<(), Error> {
        let read_with_eoi =
            self.config.eoi || detect_eoi || self.config.eor == Eor::Space || self.is_device();

        let result = self.receive_message(data, read_with_eoi, end_byte);
        self.return_to_idle();
        result
    }

    fn receive_message(
        &mut self,
        data: &mut Data,
        read_with_eoi: bool,
        end_byte: Option<u8>,
    ) -> Result<(), Error> {
        self.set_state(NodeState::Listen)?;
        self.io.ready_data_bus();

        let atn = self.io.bit(Signal::Atn);
        loop {
            if self.io.is_asserted(atn) {
                debug!("ATN asserted, message truncated at {} bytes", data.len());
                return Ok(());
            }

            let read = self.read_byte(read_with_eoi);
            if read.state != HandshakeState::Complete {
                return Err(Error::from_handshake(read.state));
            }
            if !data.push(read.byte) {
                return Err(Error::BufferFull);
            }

            if (read_with_eoi && read.eoi)
                || end_byte == Some(read.byte)
                || data.has_terminator(self.config.eor)
            {
                return Ok(());
            }
        }
    }

    /// Send `text` followed by the configured EOS terminator.
    ///
    /// A controller only sends to instruments addressed to listen beforehand,
    /// by `init` or [`Node::address_device`].
    ///
    /// With `Config::eoi` EOI marks the last byte on the wire: the final
    /// terminator byte, or the last payload byte when EOS is `None`.
    /// # Errors
    /// Stops at the first failed handshake. The node returns to `Idle`
    /// either way.
    pub fn send_data(&mut self, text: &[u8]) -> Result<(), Error> {
        let result = self.send_message(text);
        self.return_to_idle();
        result
    }

    fn send_message(&mut self, text: &[u8]) -> Result<(), Error> {
        self.set_state(NodeState::Talk)?;

        let terminator = self.config.eos.terminator();
        for (i, &byte) in text.iter().enumerate() {
            self.send_byte(byte, terminator.is_empty() && i + 1 == text.len())?;
        }
        for (i, &byte) in terminator.iter().enumerate() {
            self.send_byte(byte, i + 1 == terminator.len())?;
        }
        Ok(())
    }

    fn send_byte(&mut self, byte: u8, is_last: bool) -> Result<(), Error> {
        match self.write_byte(byte, is_last) {
            HandshakeState::Complete => Ok(()),
            state => Err(Error::from_handshake(state)),
        }
    }

    pub(crate) fn return_to_idle(&mut self) {
        if let Err(e) = self.set_state(NodeState::Idle) {
            debug!("could not return to idle: {}", e);
        }
    }
}
