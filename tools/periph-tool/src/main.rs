use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, Args, ArgEnum};
use console::style;
use crossbeam::channel::{unbounded, Receiver};

use periph_pac::layout::{self, Layout};
use periph_tool::monitor::{self, MonitorEvent};
use periph_tool::periph::dump::{registers_dump_raw, registers_dump_debug, attributes_dump};
use periph_tool::periph::memory::DEVMEM_PATH;
use periph_tool::periph::{parse_u32, parse_u64, DevMemProvider, Error, MemoryProvider, Peripheral, Registry, Result, SimulatedBus, WindowDescriptor};

#[derive(Parser)]
#[clap(author, version, about, long_about=None)]
pub(crate) struct Cli {
    /// Use in-process register blocks instead of the hardware.
    #[clap(long)]
    pub simulate: bool,

    #[clap(long, env="PERIPH_DEVMEM", default_value=DEVMEM_PATH)]
    pub devmem: PathBuf,

    #[clap(flatten)]
    pub target: Target,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(ArgEnum, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Buzzer,
    LedArray,
    RgbLed,
    Rotary,
}

#[derive(ArgEnum, Clone, Copy)]
pub(crate) enum RgbTable {
    /// Duty cycles at 0x0..0x8, period at 0xc.
    Driver,
    /// Period at 0x0, duty cycles at 0x4..0xc.
    PeriodFirst,
}

#[derive(Args)]
pub(crate) struct Target {
    #[clap(arg_enum)]
    pub peripheral: Kind,

    /// Physical base address of the register block.
    #[clap(long, parse(try_from_str=parse_u64))]
    pub base: Option<u64>,

    #[clap(long, arg_enum, default_value="driver")]
    pub rgb_table: RgbTable,
}

impl Target {
    fn layout(&self) -> &'static Layout {
        match (self.peripheral, self.rgb_table) {
            (Kind::Buzzer, _)                   => &layout::BUZZER,
            (Kind::LedArray, _)                 => &layout::LED_ARRAY,
            (Kind::RgbLed, RgbTable::Driver)      => &layout::RGB_LED,
            (Kind::RgbLed, RgbTable::PeriodFirst) => &layout::RGB_LED_PERIOD_FIRST,
            (Kind::Rotary, _)                   => &layout::ROTARY,
        }
    }
}

/// Where each block sits in the simulated fabric when no `--base` is given.
const SIMULATED_BASES: [(Kind, u64); 4] = [
    (Kind::Buzzer,   0xff20_0000),
    (Kind::LedArray, 0xff20_0010),
    (Kind::RgbLed,   0xff20_0020),
    (Kind::Rotary,   0xff20_0030),
];

#[derive(Args)]
pub(crate) struct DumpArgs {
    /// Decode registers through their bitfield views.
    #[clap(long)]
    pub decode: bool,

    /// Show attributes instead of raw words.
    #[clap(long, conflicts_with="decode")]
    pub attributes: bool,
}

#[derive(Args)]
pub(crate) struct WatchArgs {
    #[clap(long, default_value="100")]
    pub interval_ms: u64,

    /// Stop after this many samples.
    #[clap(long)]
    pub count: Option<usize>,
}

#[derive(Args)]
pub(crate) struct EncoderToLedArgs {
    /// Base address of the LED array to drive.
    #[clap(long, parse(try_from_str=parse_u64))]
    pub led_base: Option<u64>,

    #[clap(long, default_value="50")]
    pub interval_ms: u64,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    #[clap(name="dump")]
    Dump(DumpArgs),

    /// Read one word through the raw interface.
    #[clap(name="read")]
    Read {
        #[clap(parse(try_from_str=parse_u64))]
        offset: u64,
    },

    /// Write one word through the raw interface.
    #[clap(name="write")]
    Write {
        #[clap(parse(try_from_str=parse_u64))]
        offset: u64,
        #[clap(parse(try_from_str=parse_u32))]
        value: u32,
    },

    #[clap(name="get")]
    Get {
        attribute: String,
    },

    #[clap(name="set")]
    Set {
        attribute: String,
        value: String,
    },

    #[clap(name="watch")]
    Watch(WatchArgs),

    /// Light the LED array as a bar graph of the rotary encoder position.
    #[clap(name="encoder-to-led")]
    EncoderToLed(EncoderToLedArgs),
}

struct Board {
    simulate: bool,
    bus: SimulatedBus,
    devmem: DevMemProvider,
    registry: Registry,
}

impl Board {
    fn new(args: &Cli) -> Self {
        Self {
            simulate: args.simulate,
            bus: SimulatedBus::new(),
            devmem: DevMemProvider::new(&args.devmem),
            registry: Registry::new(),
        }
    }

    fn provider(&self) -> &dyn MemoryProvider {
        if self.simulate {
            &self.bus
        } else {
            &self.devmem
        }
    }

    fn base(&self, kind: Kind, base: Option<u64>, layout: &Layout) -> Result<u64> {
        let missing = || Error::ResourceUnavailable {
            name: layout.device_name.to_string(),
            reason: "no base address given".to_string(),
        };
        match base {
            Some(base) => Ok(base),
            None if self.simulate => SIMULATED_BASES.iter()
                .find(|(k, _)| *k == kind)
                .map(|&(_, base)| base)
                .ok_or_else(missing),
            None => Err(missing()),
        }
    }

    fn attach(&self, kind: Kind, base: Option<u64>, layout: &'static Layout) -> Result<Arc<Peripheral>> {
        let base = self.base(kind, base, layout)?;
        if self.simulate {
            self.bus.add_region(base, layout.span);
        }
        let descriptor = WindowDescriptor::new(layout.device_name, base, layout.span);
        self.registry.attach(layout, descriptor, self.provider())
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let board = Board::new(&args);
    let layout = args.target.layout();
    let peripheral = board.attach(args.target.peripheral, args.target.base, layout)?;

    let name = peripheral.name();
    match args.command {
        Commands::Dump(a) => {
            let mut out = io::stdout().lock();
            if a.attributes {
                attributes_dump(&peripheral, &mut out)?;
            } else if a.decode {
                registers_dump_debug(&peripheral, &mut out)?;
            } else {
                registers_dump_raw(&peripheral, &mut out)?;
            }
        },
        Commands::Read { offset } => {
            let mut file = board.registry.open(name)?;
            file.seek(SeekFrom::Start(offset))?;
            match file.read_u32()? {
                Some(value) => println!("{offset:02x}: {value:08x}"),
                None => println!("{offset:02x}: {}", style("end of device").dim()),
            }
        },
        Commands::Write { offset, value } => {
            let mut file = board.registry.open(name)?;
            file.seek(SeekFrom::Start(offset))?;
            if file.write_u32(value)? == 0 {
                eprintln!("{offset:02x}: {}", style("end of device, nothing written").dim());
            }
        },
        Commands::Get { attribute } => {
            let attribute = board.registry.attribute(&format!("{name}/{attribute}"))?;
            print!("{}", attribute.show()?);
        },
        Commands::Set { attribute, value } => {
            let attribute = board.registry.attribute(&format!("{name}/{attribute}"))?;
            attribute.set(&value)?;
            print!("{}", attribute.show()?);
        },
        Commands::Watch(a) => {
            let (event_sender, event_receiver) = unbounded();
            let (_stop_sender, stop_receiver) = unbounded();

            thread::Builder::new()
                .name("watch".to_string())
                .spawn({
                    let peripheral = peripheral.clone();
                    let interval = Duration::from_millis(a.interval_ms);
                    move || {
                        if let Err(e) = monitor::watch(peripheral, interval, a.count, event_sender, stop_receiver) {
                            eprintln!("error: watch: {e}");
                        }
                    }
                })?;

            print_events(event_receiver);
        },
        Commands::EncoderToLed(a) => {
            if args.target.peripheral != Kind::Rotary {
                return Err(Error::ResourceUnavailable {
                    name: name.to_string(),
                    reason: "encoder-to-led reads the rotary encoder".to_string(),
                });
            }
            let leds = board.attach(Kind::LedArray, a.led_base, &layout::LED_ARRAY)?;

            let (event_sender, event_receiver) = unbounded();
            let (_stop_sender, stop_receiver) = unbounded();

            thread::Builder::new()
                .name("enc_led".to_string())
                .spawn({
                    let encoder = peripheral.clone();
                    let interval = Duration::from_millis(a.interval_ms);
                    move || {
                        if let Err(e) = monitor::encoder_to_led(encoder, leds, interval, event_sender, stop_receiver) {
                            eprintln!("error: encoder-to-led: {e}");
                        }
                        eprintln!("done: encoder-to-led");
                    }
                })?;

            if board.simulate {
                if let Some(knob) = board.bus.region(board.base(Kind::Rotary, args.target.base, layout)?) {
                    thread::Builder::new()
                        .name("knob".to_string())
                        .spawn(move || {
                            // Sweep the simulated encoder back and forth.
                            loop {
                                for count in (0..=9).chain((1..9).rev()) {
                                    knob.poke(0, count);
                                    thread::sleep(Duration::from_millis(250));
                                }
                            }
                        })?;
                }
            }

            print_events(event_receiver);
        },
    }

    board.registry.detach_all()
}

///////////////////////////////////////////////////////////////////////

fn print_events(receiver: Receiver<MonitorEvent>) {
    while let Ok(event) = receiver.recv() {
        monitor::print_event(&event);
    }
}
