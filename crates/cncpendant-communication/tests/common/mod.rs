#![allow(dead_code)]

use cncpendant_communication::{Device, DeviceConfig, FirmwareKind, VirtualPort};
use cncpendant_core::{AppEvent, DeviceStatusEvent, EventBus, EventFilter, RawLine};
use parking_lot::Mutex;
use std::sync::Arc;

/// Collects every event published on a bus
pub struct Recorder {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl Recorder {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(EventFilter::All, move |event| sink.lock().push(event));
        Self { events }
    }

    pub fn failures(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| **e == AppEvent::Device(DeviceStatusEvent::Failure))
            .count()
    }

    pub fn traffic(&self) -> Vec<RawLine> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                AppEvent::Traffic(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// A device bound to one end of a virtual link, and the firmware end
pub struct Rig {
    pub device: Device,
    pub firmware: VirtualPort,
    pub bus: Arc<EventBus>,
    pub recorder: Recorder,
}

impl Rig {
    pub fn new(kind: FirmwareKind, config: DeviceConfig) -> Self {
        Self::with_bus(kind, config, Arc::new(EventBus::new()))
    }

    pub fn with_bus(kind: FirmwareKind, config: DeviceConfig, bus: Arc<EventBus>) -> Self {
        let (host, firmware) = VirtualPort::pair();
        let recorder = Recorder::attach(&bus);
        let device = Device::new(kind, Box::new(host), 115200, config, bus.clone());
        Self {
            device,
            firmware,
            bus,
            recorder,
        }
    }

    pub fn grbl() -> Self {
        Self::new(FirmwareKind::Grbl, DeviceConfig::default())
    }

    pub fn marlin() -> Self {
        Self::new(FirmwareKind::Marlin, DeviceConfig::default())
    }

    /// Send `text` from the firmware and run one engine cycle
    pub fn reply(&mut self, text: &str) {
        self.firmware.send_str(text);
        self.device.tick();
    }

    /// Lines the firmware received since the last call
    pub fn received(&self) -> Vec<String> {
        self.firmware.take_lines()
    }
}
