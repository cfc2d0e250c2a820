//! A fixed-capacity byte FIFO shared by concurrent readers and writers
//!
//! Readers block while the store is empty, writers block while it is full.
//! Bytes are delivered exactly once and in order; requests larger than the
//! available data or space are satisfied partially.
//!
//! ```
//! use globalfifo::{GlobalFifo, IoMode};
//!
//! let fifo = GlobalFifo::with_capacity(8).unwrap();
//! let fd = fifo.open();
//!
//! assert_eq!(fifo.write_blocking(fd, b"ABCDEFGH", IoMode::Blocking), Ok(8));
//! assert_eq!(fifo.read_blocking(fd, 3, IoMode::Blocking).unwrap(), b"ABC");
//! assert_eq!(fifo.snapshot(), b"DEFGH");
//! ```

pub mod config;
pub mod control;
pub mod cursor;
pub mod device;
pub mod error;
pub mod file;
pub mod file_table;
pub mod gate;
pub mod idgen;
pub mod signal;
pub mod store;
pub mod uaccess;
pub mod wait_queue;

// Re-export the device surface for convenience
pub use config::DeviceConfig;
pub use control::{Command, MEM_CLEAR_CMD};
pub use cursor::{SeekCursor, SeekMode};
pub use device::GlobalFifo;
pub use error::{ConfigError, DeviceError};
pub use file::File;
pub use gate::{Gate, IoMode};
pub use idgen::{Handle, IdGen};
pub use signal::Interrupt;
pub use store::{ByteStore, Readiness, StoreState};
pub use uaccess::{Fault, UserBuf, UserBufMut};
pub use wait_queue::WaitSet;
