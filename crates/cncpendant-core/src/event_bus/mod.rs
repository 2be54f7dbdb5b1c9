//! # Event Bus Module
//!
//! Publish/subscribe notifications between the device engine, the job
//! feeder and any outer collaborator (display, network mirror).
//!
//! ## Overview
//!
//! - Publishers emit typed events without knowing subscribers
//! - Subscribers filter by category and are called synchronously, on the
//!   publishing thread, in registration order
//! - Async consumers can poll a broadcast receiver instead
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cncpendant_core::event_bus::{AppEvent, DeviceStatusEvent, EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Device]),
//!     |event| {
//!         if let AppEvent::Device(DeviceStatusEvent::Failure) = event {
//!             println!("device failed");
//!         }
//!     },
//! );
//!
//! bus.publish(AppEvent::Device(DeviceStatusEvent::Failure));
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
