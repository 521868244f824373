pub mod chardev;
pub mod device;
pub mod dump;
pub mod error;
pub mod field;
pub mod memory;
pub mod registry;
pub mod window;

pub use chardev::DeviceFile;
pub use device::{Peripheral, State};
pub use error::{Error, Result};
pub use field::{parse_u32, parse_u64, Attribute};
pub use memory::{DevMemProvider, MemoryProvider, SimulatedBus, WindowDescriptor};
pub use registry::Registry;
pub use window::RegisterWindow;
