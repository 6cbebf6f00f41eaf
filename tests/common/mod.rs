#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gpib_node::commands::{DCL, GET, GTL, LAD, LLO, SDC, SPD, SPE, TAD, UNL, UNT};
use gpib_node::{pinmap, Clock, Config, Gpio, Node, PinMap, Signal};

/// Pin table of the test board, DIO lines out of GPIO order.
pub const PINS: PinMap = pinmap([9, 8, 7, 6, 5, 4, 3, 2, 10, 11, 12, 13, 14, 15, 16, 17]);

pub type SimNode = Node<SimPins, SimClock>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One byte seen by the simulated instrument.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    pub byte: u8,
    pub eoi: bool,
    pub atn: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Passive,
    /// Acceptor, waiting for DAV.
    Ready,
    /// Acceptor, byte taken, waiting for DAV to go away.
    Accepted,
    /// Source, waiting for the listeners to be ready.
    Idle,
    /// Source, byte on the bus.
    Placed,
}

/// A GPIB instrument on the far end of the cable.
///
/// It accepts every command byte sent under ATN, follows its own listen and
/// talk addressing, and sources queued bytes (or its status byte during a
/// serial poll) while addressed to talk.
pub struct Instrument {
    pub address: u8,
    pub present: bool,
    pub listen: bool,
    pub talk: bool,
    pub serial_poll: bool,
    pub status: u8,
    pub outgoing: VecDeque<(u8, bool)>,
    pub frames: Vec<Frame>,
    pub ifc_count: usize,
    pub clear_count: usize,
    pub trigger_count: usize,
    pub local_count: usize,
    pub locked_out: bool,
    pub remote: bool,
    /// Answers a complete LF terminated line written to the instrument.
    pub reply: Option<fn(&[u8]) -> Vec<u8>>,
    /// Stop taking bytes once this many have been accepted. The instrument
    /// keeps holding NDAC and looks ready, but never accepts.
    pub accept_limit: Option<usize>,
    line: Vec<u8>,
    phase: Phase,
    asserted: u32,
    ifc_active: bool,
    status_sent: bool,
}

impl Instrument {
    fn new(address: u8) -> Self {
        Self {
            address,
            present: true,
            listen: false,
            talk: false,
            serial_poll: false,
            status: 0,
            outgoing: VecDeque::new(),
            frames: Vec::new(),
            ifc_count: 0,
            clear_count: 0,
            trigger_count: 0,
            local_count: 0,
            locked_out: false,
            remote: false,
            reply: None,
            accept_limit: None,
            line: Vec::new(),
            phase: Phase::Passive,
            asserted: 0,
            ifc_active: false,
            status_sent: false,
        }
    }

    /// Queue a message to source when addressed to talk.
    pub fn queue(&mut self, message: &[u8], eoi_on_last: bool) {
        for (i, &byte) in message.iter().enumerate() {
            let eoi = eoi_on_last && i + 1 == message.len();
            self.outgoing.push_back((byte, eoi));
        }
    }

    pub fn commands(&self) -> Vec<u8> {
        self.frames.iter().filter(|f| f.atn).map(|f| f.byte).collect()
    }

    pub fn data(&self) -> Vec<Frame> {
        self.frames.iter().filter(|f| !f.atn).copied().collect()
    }

    pub fn data_bytes(&self) -> Vec<u8> {
        self.data().iter().map(|f| f.byte).collect()
    }

    fn hold(&mut self, mask: u32) {
        self.asserted |= mask;
    }

    fn release(&mut self, mask: u32) {
        self.asserted &= !mask;
    }

    fn step(&mut self, pins: &PinMap, levels: u32) {
        if !self.present {
            self.asserted = 0;
            return;
        }
        let low = |s: Signal| levels & pins.mask(s) == 0;

        if low(Signal::Ifc) {
            if !self.ifc_active {
                self.ifc_count += 1;
                self.listen = false;
                self.talk = false;
                self.serial_poll = false;
            }
            self.ifc_active = true;
        } else {
            self.ifc_active = false;
        }
        self.remote = low(Signal::Ren);

        let atn = low(Signal::Atn);
        let acceptor = atn || self.listen;
        let source = !atn && self.talk;
        let switch = match self.phase {
            Phase::Ready | Phase::Accepted => !acceptor,
            Phase::Idle | Phase::Placed => !source,
            Phase::Passive => acceptor || source,
        };
        if switch {
            self.asserted = 0;
            self.phase = if acceptor {
                Phase::Ready
            } else if source {
                Phase::Idle
            } else {
                Phase::Passive
            };
        }

        let (nrfd, ndac) = (pins.mask(Signal::Nrfd), pins.mask(Signal::Ndac));
        let (dav, eoi) = (pins.mask(Signal::Dav), pins.mask(Signal::Eoi));
        match self.phase {
            Phase::Passive => {}
            Phase::Ready => {
                self.hold(ndac);
                self.release(nrfd);
                let stalled = self
                    .accept_limit
                    .map_or(false, |limit| self.frames.len() >= limit);
                if low(Signal::Dav) && !stalled {
                    let byte = Signal::DATA
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| low(**s))
                        .fold(0u8, |b, (i, _)| b | (1 << i));
                    let frame = Frame {
                        byte,
                        eoi: low(Signal::Eoi),
                        atn,
                    };
                    self.accept(frame);
                    self.hold(nrfd);
                    self.release(ndac);
                    self.phase = Phase::Accepted;
                }
            }
            Phase::Accepted => {
                if !low(Signal::Dav) {
                    self.hold(ndac);
                    self.release(nrfd);
                    self.phase = Phase::Ready;
                }
            }
            Phase::Idle => {
                if low(Signal::Ndac) && !low(Signal::Nrfd) {
                    if let Some((byte, last)) = self.next_byte() {
                        for (i, s) in Signal::DATA.iter().enumerate() {
                            if byte & (1 << i) != 0 {
                                self.hold(pins.mask(*s));
                            }
                        }
                        if last {
                            self.hold(eoi);
                        }
                        self.hold(dav);
                        self.phase = Phase::Placed;
                    }
                }
            }
            Phase::Placed => {
                if !low(Signal::Ndac) {
                    self.release(dav | eoi | pins.masks().dio);
                    if self.serial_poll {
                        self.status_sent = true;
                    } else {
                        self.outgoing.pop_front();
                    }
                    self.phase = Phase::Idle;
                }
            }
        }
    }

    fn next_byte(&self) -> Option<(u8, bool)> {
        if self.serial_poll {
            if self.status_sent {
                None
            } else {
                Some((self.status, false))
            }
        } else {
            self.outgoing.front().copied()
        }
    }

    fn accept(&mut self, frame: Frame) {
        self.frames.push(frame);
        if !frame.atn {
            self.line.push(frame.byte);
            if frame.byte == b'\n' {
                if let Some(reply) = self.reply {
                    let answer = reply(&self.line);
                    self.queue(&answer, true);
                }
                self.line.clear();
            }
            return;
        }
        let own = frame.byte & 0x1f == self.address;
        match frame.byte {
            UNL => self.listen = false,
            UNT => self.talk = false,
            SPE => {
                self.serial_poll = true;
                self.status_sent = false;
            }
            SPD => self.serial_poll = false,
            DCL => self.clear_count += 1,
            LLO => self.locked_out = true,
            SDC if self.listen => self.clear_count += 1,
            GET if self.listen => self.trigger_count += 1,
            GTL if self.listen => self.local_count += 1,
            b if b & 0xe0 == LAD => {
                if own {
                    self.listen = true;
                }
            }
            b if b & 0xe0 == TAD => self.talk = own,
            _ => {}
        }
    }
}

/// Wired-AND model of the bus: a line is low if the node or the outside
/// world pulls it low, high otherwise.
pub struct BusSim {
    pub pins: PinMap,
    pub instrument: Instrument,
    /// Lines held low by some other party, e.g. a foreign controller.
    pub external: u32,
    /// Lines the other party starts holding low at a given time in µs.
    pub scheduled: Vec<(u64, u32)>,
    pub dir: u32,
    pub out: u32,
    pub pulls: u32,
    pub reads: usize,
    pub writes: usize,
    pub now_us: u64,
    /// Time that passes on every clock reading.
    pub tick_us: u64,
}

impl BusSim {
    pub fn new(address: u8) -> Rc<RefCell<BusSim>> {
        Rc::new(RefCell::new(BusSim {
            pins: PINS,
            instrument: Instrument::new(address),
            external: 0,
            scheduled: Vec::new(),
            dir: 0,
            out: 0,
            pulls: 0,
            reads: 0,
            writes: 0,
            now_us: 0,
            tick_us: 100,
        }))
    }

    pub fn levels(&self) -> u32 {
        let low = (self.dir & !self.out) | self.external | self.instrument.asserted;
        !low
    }

    /// True if the node itself drives `signal` low.
    pub fn node_asserts(&self, signal: Signal) -> bool {
        let mask = self.pins.mask(signal);
        self.dir & !self.out & mask != 0
    }

    /// True if the node drives any of DIO1-8.
    pub fn node_drives_data(&self) -> bool {
        self.dir & self.pins.masks().dio != 0
    }

    pub fn is_low(&self, signal: Signal) -> bool {
        self.levels() & self.pins.mask(signal) == 0
    }

    pub fn now_ms(&self) -> u64 {
        self.now_us / 1000
    }

    pub fn ops(&self) -> usize {
        self.reads + self.writes
    }

    /// Hold `signal` low from `delay_us` from now on.
    pub fn assert_after(&mut self, signal: Signal, delay_us: u64) {
        let at = self.now_us + delay_us;
        let mask = self.pins.mask(signal);
        self.scheduled.push((at, mask));
    }

    fn settle(&mut self) {
        let now = self.now_us;
        let external = self
            .scheduled
            .iter()
            .filter(|(at, _)| *at <= now)
            .fold(self.external, |lines, (_, mask)| lines | mask);
        self.external = external;
        self.scheduled.retain(|(at, _)| *at > now);
        let levels = self.levels();
        let pins = self.pins;
        self.instrument.step(&pins, levels);
    }
}

pub struct SimPins(Rc<RefCell<BusSim>>);

impl SimPins {
    pub fn new(sim: &Rc<RefCell<BusSim>>) -> SimPins {
        SimPins(sim.clone())
    }
}

impl Gpio for SimPins {
    fn get_all(&mut self) -> u32 {
        let mut sim = self.0.borrow_mut();
        sim.reads += 1;
        sim.settle();
        sim.levels()
    }

    fn put_masked(&mut self, mask: u32, value: u32) {
        let mut sim = self.0.borrow_mut();
        sim.writes += 1;
        sim.out = (sim.out & !mask) | (value & mask);
        sim.settle();
    }

    fn set_dir_masked(&mut self, mask: u32, value: u32) {
        let mut sim = self.0.borrow_mut();
        sim.writes += 1;
        sim.dir = (sim.dir & !mask) | (value & mask);
        sim.settle();
    }

    fn set_pulls(&mut self, mask: u32, pull_up: bool) {
        let mut sim = self.0.borrow_mut();
        sim.writes += 1;
        if pull_up {
            sim.pulls |= mask;
        } else {
            sim.pulls &= !mask;
        }
    }
}

pub struct SimClock(Rc<RefCell<BusSim>>);

impl SimClock {
    pub fn new(sim: &Rc<RefCell<BusSim>>) -> SimClock {
        SimClock(sim.clone())
    }
}

impl Clock for SimClock {
    fn millis(&self) -> u32 {
        let mut sim = self.0.borrow_mut();
        sim.now_us += sim.tick_us;
        (sim.now_us / 1000) as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().now_us += u64::from(ms) * 1000;
    }

    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().now_us += u64::from(us);
    }
}

/// A controller node wired to an instrument at `address`.
pub fn controller(address: u8, config: Config) -> (Rc<RefCell<BusSim>>, SimNode) {
    init_logging();
    let sim = BusSim::new(address);
    let node = Node::controller(PINS, config, SimPins::new(&sim), SimClock::new(&sim));
    (sim, node)
}

/// A device node on the same simulated bus.
pub fn device(config: Config) -> (Rc<RefCell<BusSim>>, SimNode) {
    init_logging();
    let sim = BusSim::new(1);
    let node = Node::device(PINS, config, SimPins::new(&sim), SimClock::new(&sim));
    (sim, node)
}
