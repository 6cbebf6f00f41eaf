//! Line based query console for a single instrument.
//!
//! Usage: `cargo run --example bench_repl -- "paddr=9 eos=lf eor=lf rtmo=200"`
//!
//! Every line read from stdin is sent to the instrument at `paddr` and the
//! reply is printed. The pin bank below has nothing attached, so swap in the
//! board's GPIO driver to talk to real hardware.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use gpib_node::{pinmap, Clock, Config, Data, Gpio, Node, PinMap};

const PINS: PinMap = pinmap([6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21]);

/// A GPIO bank with pull-ups and an empty bus.
#[derive(Default)]
struct FloatingBank {
    dir: u32,
    out: u32,
}

impl Gpio for FloatingBank {
    fn get_all(&mut self) -> u32 {
        (self.out & self.dir) | !self.dir
    }

    fn put_masked(&mut self, mask: u32, value: u32) {
        self.out = (self.out & !mask) | (value & mask);
    }

    fn set_dir_masked(&mut self, mask: u32, value: u32) {
        self.dir = (self.dir & !mask) | (value & mask);
    }

    fn set_pulls(&mut self, _mask: u32, _pull_up: bool) {}
}

struct SysClock(Instant);

impl Clock for SysClock {
    fn millis(&self) -> u32 {
        self.0.elapsed().as_millis() as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }

    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(us.into()));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let settings = std::env::args().nth(1).unwrap_or_default();
    let config: Config = settings.parse()?;
    let paddr = config.paddr;
    let mut node = Node::controller(
        PINS,
        config,
        FloatingBank::default(),
        SysClock(Instant::now()),
    );
    node.init()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut reply = Data::new();
        let result = node
            .address_device(paddr, false)
            .and_then(|_| node.send_data(line.trim_end().as_bytes()))
            .and_then(|_| node.receive_data(&mut reply, false, None));
        match result {
            Ok(()) => println!("{}", reply),
            Err(e) => println!("error: {}", e),
        }
        io::stdout().flush()?;
    }

    node.deinit();
    Ok(())
}
