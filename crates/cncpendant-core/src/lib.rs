//! # CNC Pendant Core
//!
//! Core types, traits, and utilities for CNC Pendant.
//! Provides the error taxonomy, the event bus, machine data models and
//! the transport/program-source abstractions the engine polls.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod transport;

pub use data::{Axis, OverrideState, Position, SenderToken, Temperature};

pub use error::{DeviceError, Error, JobError, Result, TransportError};

pub use event_bus::{
    AppEvent, DeviceStatusEvent, EventBus, EventBusConfig, EventBusError, EventCategory,
    EventFilter, JobStatusEvent, RawLine, SubscriptionId,
};

pub use transport::{ByteTransport, FileSource, MemorySource, ProgramSource};
