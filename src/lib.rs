//! GrizzlyTime attendance core.
//!
//! Students check in and out by holding a barcoded ID card up to a
//! camera or by typing their ID. This crate is the engine behind the
//! time-clock window: frame capture, barcode decoding, duplicate-scan
//! suppression and the attendance ledger, all running on a worker thread
//! that talks to the UI only through non-blocking queues.
//!
//! # Architecture
//!
//! ```text
//! capture → decode → attendance (gate, ledger)
//!    ↓                     ↓
//!  display queue    notification queue      (pipeline → UI)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use grizzlytime::{
//!     attendance::{AttendanceLedger, Roster, TracingJournal},
//!     capture::{CaptureConfig, MockCamera, MockStep},
//!     decode::Code39Decoder,
//!     pipeline::{self, LoopConfig, Notification},
//! };
//!
//! let ledger = AttendanceLedger::new(Roster::new(), TracingJournal).with_guest_fallback(true);
//! let camera = MockCamera::new(CaptureConfig::default())
//!     .with_script([MockStep::Barcode("114477".into())])
//!     .paced();
//!
//! let handle = pipeline::spawn(camera, Code39Decoder::new(), ledger, &LoopConfig::default(), None)
//!     .unwrap();
//!
//! // On the UI thread: poll, never block.
//! for note in handle.notifications() {
//!     if let Notification::Accepted { event, .. } = note {
//!         println!("{:?}", event);
//!     }
//! }
//!
//! handle.cancel();
//! let report = handle.join().unwrap();
//! println!("frames processed: {}", report.stats.frames);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod attendance;
pub mod capture;
pub mod config;
pub mod decode;
pub mod metrics;
pub mod pipeline;

// Re-export commonly used types at crate root
pub use attendance::{AttendanceLedger, AttendanceRecord, DebounceGate, Identifier, LedgerView};
pub use capture::{CaptureConfig, CaptureError, Frame, FrameSource, MockCamera};
pub use config::FileConfig;
pub use decode::{BarcodeDecoder, Code39Decoder, DecodedId};
pub use pipeline::{CaptureHandle, CaptureLoop, CancelToken, LoopConfig, Notification};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
