//! # Events Module
//!
//! Event-driven architecture for GUI-ready reporting.
//!
//! ## Design
//! The core library emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display log lines and reports.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Log(log) => println!("[{}] {}", log.level, log.message),
//!             Event::Resolution(ResolutionEvent::Completed(r)) => {
//!                 println!("deleted {} files", r.files_deleted)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
