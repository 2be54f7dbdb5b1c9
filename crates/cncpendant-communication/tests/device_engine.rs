mod common;

use cncpendant_communication::{CounterLimits, DeviceConfig, FirmwareKind};
use cncpendant_core::{
    AppEvent, Axis, ByteTransport, DeviceStatusEvent, EventBus, Position, SenderToken,
    Temperature, TransportError,
};
use common::Rig;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_grbl_begin_queries_build_info_and_status() {
    let mut rig = Rig::grbl();
    rig.device.begin();
    assert!(rig.device.is_connected());
    rig.device.tick();

    assert_eq!(rig.firmware.take_string(), "?$I\n");
    assert_eq!(rig.device.in_flight(), 1);
    assert!(rig.device.is_watchdog_armed());

    rig.reply("[VER:1.1h.20190825:]\n[OPT:V,15,128]\nok\n");
    let snapshot = rig.device.handle().snapshot();
    assert_eq!(snapshot.firmware.description, "Grbl 1.1h.20190825:");
    assert_eq!(snapshot.firmware.options, "V,15,128");
    assert_eq!(rig.device.in_flight(), 0);
    assert!(!rig.device.is_watchdog_armed());
}

#[test]
fn test_grbl_status_report_updates_positions() {
    let mut rig = Rig::grbl();
    rig.device.begin();
    rig.reply("<Idle|WPos:1.000,2.000,3.000|FS:100,0|WCO:1.000,1.000,1.000>\n");

    let snapshot = rig.device.handle().snapshot();
    assert_eq!(snapshot.position, Position::new(2.0, 3.0, 4.0));
    assert_eq!(snapshot.work_position, Position::new(1.0, 2.0, 3.0));
    let grbl = snapshot.grbl().unwrap();
    assert_eq!(grbl.status, "Idle");
    assert_eq!(grbl.feed, 100.0);
}

#[test]
fn test_grbl_message_line_is_published() {
    let mut rig = Rig::grbl();
    rig.device.begin();
    rig.reply("[MSG:Caution: Unlocked]\n");
    assert_eq!(rig.device.handle().snapshot().last_message, "Caution: Unlocked");
}

#[test]
fn test_grbl_character_counting_window() {
    let mut rig = Rig::grbl();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");
    rig.received();

    // 11 bytes per line on the wire, 127 byte window
    for _ in 0..14 {
        assert!(handle.schedule_command("G1 X1.0000", None));
    }
    rig.device.tick();
    assert_eq!(rig.received().len(), 11);
    assert_eq!(rig.device.in_flight(), 11);
    assert_eq!(rig.device.queued(), 14);

    rig.reply("ok\nok\nok\n");
    assert_eq!(rig.device.in_flight(), 8);
    rig.device.tick();
    assert_eq!(rig.received().len(), 3);
    assert_eq!(rig.device.in_flight(), 11);
    assert_eq!(rig.device.queued(), 11);
}

#[test]
fn test_grbl_error_panics_and_flushes() {
    let mut rig = Rig::grbl();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");

    assert!(handle.schedule_command("G1 X1", None));
    assert!(handle.schedule_command("G1 X2", None));
    rig.device.tick();
    rig.recorder.clear();

    rig.reply("error:20\n");
    assert!(rig.device.is_in_panic());
    assert!(handle.is_in_panic());
    assert_eq!(rig.device.queued(), 0);
    assert_eq!(rig.device.in_flight(), 0);
    assert_eq!(handle.free_slots(), DeviceConfig::default().normal_lines);
    assert_eq!(rig.recorder.failures(), 1);
    assert_eq!(handle.snapshot().last_response, "error:20");

    assert!(!handle.schedule_command("G1 X3", None));
    assert!(!handle.can_schedule(5));
    assert!(!handle.schedule_realtime(b'?'));
}

#[test]
fn test_grbl_alarm_is_a_fault() {
    let mut rig = Rig::grbl();
    rig.device.begin();
    rig.reply("ALARM:1\n");
    assert!(rig.device.is_in_panic());
}

#[test]
fn test_reset_clears_panic_and_soft_resets() {
    let mut rig = Rig::grbl();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("error:1\n");
    assert!(handle.is_in_panic());
    rig.firmware.take_string();

    assert!(handle.reset());
    rig.device.tick();
    assert!(!handle.is_in_panic());
    assert_eq!(rig.firmware.take_string().as_bytes(), &[0x18]);
    assert!(handle.schedule_command("G0 X0", None));
}

#[test]
fn test_grbl_realtime_bytes_bypass_queue() {
    let mut rig = Rig::grbl();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");
    rig.firmware.take_string();

    assert!(handle.schedule_priority_command("!", None));
    assert!(handle.schedule_realtime(b'~'));
    assert!(!handle.schedule_realtime(b'G'));
    rig.device.tick();

    assert_eq!(rig.firmware.take_string(), "!~");
    assert_eq!(rig.device.in_flight(), 0);
    assert_eq!(handle.pending(), 0);
}

#[test]
fn test_traffic_is_attributed_to_oldest_sender() {
    let mut rig = Rig::grbl();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");
    rig.recorder.clear();

    assert!(handle.schedule_command("G0 X1", Some(SenderToken(7))));
    assert!(handle.schedule_command("G0 X2", Some(SenderToken(8))));
    rig.device.tick();
    rig.reply("ok\nok\n");

    let traffic = rig.recorder.traffic();
    assert_eq!(traffic.len(), 2);
    assert_eq!(traffic[0].text, "ok");
    assert_eq!(traffic[0].sender, Some(SenderToken(7)));
    assert_eq!(traffic[1].sender, Some(SenderToken(8)));
}

#[test]
fn test_priority_commands_are_sent_first() {
    let mut rig = Rig::grbl();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");
    rig.received();

    assert!(handle.schedule_command("G1 X1", None));
    assert!(handle.schedule_priority_command("$X", None));
    rig.device.tick();
    assert_eq!(rig.received(), vec!["$X", "G1 X1"]);
}

#[test]
fn test_command_length_limits() {
    let rig = Rig::grbl();
    let handle = rig.device.handle();
    assert!(!handle.schedule_command("", None));
    assert!(!handle.schedule_command(&"G".repeat(101), None));
    assert!(handle.schedule_command(&"G".repeat(100), None));
    assert!(!handle.can_schedule(0));
    assert!(!handle.can_schedule(101));
}

#[test]
fn test_lines_wider_than_the_window_are_rejected() {
    let config = DeviceConfig {
        grbl_window: CounterLimits::new(32, 40),
        ..Default::default()
    };
    let mut rig = Rig::new(FirmwareKind::Grbl, config);
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");
    rig.received();

    let wide = format!("G1 X{}", "1".repeat(50));
    assert!(!handle.can_schedule(wide.len()));
    assert!(!handle.schedule_command(&wide, None));
    assert!(handle.schedule_command(&"G".repeat(39), None));
    assert!(!handle.schedule_command(&"G".repeat(40), None));
    assert!(handle.schedule_command("G1 Y1", None));

    let start = Instant::now();
    rig.device.tick_at(start);
    assert_eq!(rig.received(), vec!["G".repeat(39)]);
    assert!(rig.device.is_watchdog_armed());

    rig.firmware.send_str("ok\n");
    rig.device.tick_at(start + Duration::from_millis(10));
    rig.device.tick_at(start + Duration::from_millis(20));
    assert_eq!(rig.received(), vec!["G1 Y1"]);
    assert_eq!(rig.device.queued(), 1);
}

#[test]
fn test_normal_lane_capacity_is_reserved_up_front() {
    let config = DeviceConfig {
        normal_lines: 2,
        ..Default::default()
    };
    let mut rig = Rig::new(FirmwareKind::Grbl, config);
    let handle = rig.device.handle();

    assert!(handle.schedule_command("G0 X1", None));
    assert!(handle.schedule_command("G0 X2", None));
    assert!(!handle.schedule_command("G0 X3", None));
    assert!(!handle.can_schedule(5));

    rig.device.begin();
    rig.device.tick();
    rig.reply("ok\nok\nok\n");
    assert_eq!(handle.free_slots(), 2);
    assert!(handle.can_schedule(5));
}

#[test]
fn test_watchdog_expiry_disconnects_once() {
    let mut rig = Rig::marlin();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.device.tick();
    assert_eq!(rig.received(), vec!["M115", "M114"]);
    assert!(rig.device.is_watchdog_armed());

    let now = Instant::now();
    rig.device.set_watchdog_deadline(now);
    rig.device.tick_at(now + Duration::from_millis(1));

    assert!(!rig.device.is_connected());
    assert!(!handle.is_connected());
    assert_eq!(rig.device.queued(), 0);
    assert_eq!(rig.device.in_flight(), 0);
    assert_eq!(rig.recorder.failures(), 1);

    rig.device.tick_at(now + Duration::from_secs(10));
    assert_eq!(rig.recorder.failures(), 1);
}

#[test]
fn test_watchdog_rearms_while_responses_arrive() {
    let mut rig = Rig::marlin();
    rig.device.begin();
    let start = Instant::now();
    rig.device.tick_at(start);

    let later = start + Duration::from_millis(2000);
    rig.firmware.send_str("echo:busy\n");
    rig.device.tick_at(later);
    rig.device.tick_at(later + Duration::from_millis(2000));
    assert!(rig.device.is_connected());
    assert_eq!(rig.recorder.failures(), 0);
}

#[test]
fn test_marlin_jog_is_all_or_nothing() {
    let mut rig = Rig::marlin();
    let handle = rig.device.handle();

    assert!(handle.schedule_priority_command("M105", None));
    assert!(handle.schedule_priority_command("M105", None));
    assert_eq!(handle.priority_free_slots(), 2);

    assert!(!handle.jog(Axis::X, 5.0, 1000.0, None));
    assert_eq!(handle.priority_free_slots(), 2);
    assert_eq!(handle.pending(), 2);

    rig.device.begin();
    rig.device.tick();
    assert_eq!(rig.received().len(), 4);
}

#[test]
fn test_marlin_jog_tracks_relative_motion() {
    let mut rig = Rig::marlin();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.device.tick();
    rig.reply("ok\nX:1.00 Y:2.00 Z:3.00 E:0.00 Count X:100 Y:200 Z:300\nok\n");
    assert_eq!(handle.position(), Position::new(1.0, 2.0, 3.0));
    rig.received();

    assert!(handle.jog(Axis::X, 5.0, 1000.0, None));
    rig.device.tick();
    assert_eq!(rig.received(), vec!["G91", "G0 F1000 X5.000", "G90"]);
    rig.reply("ok\nok\nok\n");

    assert_eq!(handle.position(), Position::new(6.0, 2.0, 3.0));
    assert!(!handle.snapshot().marlin().unwrap().relative);
}

#[test]
fn test_marlin_capabilities_enable_autoreport() {
    let mut rig = Rig::marlin();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.device.tick();
    rig.received();

    rig.reply(
        "FIRMWARE_NAME:Marlin 2.1.2 (Github) MACHINE_TYPE:Ender EXTRUDER_COUNT:2\n\
         Cap:AUTOREPORT_TEMP:1\nCap:PROGRESS:0\nok\n",
    );
    let firmware = handle.snapshot().firmware;
    assert_eq!(firmware.description, "Marlin 2.1.2 (Github)");
    assert_eq!(firmware.machine_type, "Ender");
    assert_eq!(firmware.extruders, 2);
    assert!(firmware.autoreport_temp);
    assert!(!firmware.autoreport_enabled);

    rig.reply("X:0.00 Y:0.00 Z:0.00 E:0.00 Count X:0 Y:0 Z:0\nok\n");
    assert_eq!(rig.received(), vec!["M155 S2"]);
    rig.reply("ok\n");
    assert!(handle.snapshot().firmware.autoreport_enabled);

    assert!(handle.request_status_update(None));
    rig.device.tick();
    assert_eq!(rig.received(), vec!["M114"]);
}

#[test]
fn test_marlin_temperature_report() {
    let config = DeviceConfig::default();
    let mut rig = Rig::new(FirmwareKind::Marlin, config);
    let handle = rig.device.handle();
    rig.device.begin();
    rig.device.tick();
    rig.reply("FIRMWARE_NAME:Marlin EXTRUDER_COUNT:2\nok\nX:0.00 Y:0.00 Z:0.00 E:0.00\nok\n");
    rig.received();

    assert!(handle.schedule_priority_command("M105", None));
    rig.device.tick();
    rig.reply("ok T0:20.0 /0.0 T1:30.0 /200.0 B:25.0 /60.0\n");

    let snapshot = handle.snapshot();
    let marlin = snapshot.marlin().unwrap();
    assert_eq!(marlin.tools.len(), 2);
    assert_eq!(marlin.tools[0], Temperature::new(20.0, 0.0));
    assert_eq!(marlin.tools[1], Temperature::new(30.0, 200.0));
    assert_eq!(marlin.bed, Temperature::new(25.0, 60.0));
}

#[test]
fn test_marlin_cold_extrusion_is_a_warning() {
    let mut rig = Rig::marlin();
    rig.device.begin();
    rig.reply("echo: cold extrusion prevented\n");
    assert!(!rig.device.is_in_panic());
    assert_eq!(rig.recorder.failures(), 1);
}

#[test]
fn test_marlin_error_and_reset() {
    let mut rig = Rig::marlin();
    let handle = rig.device.handle();
    rig.device.begin();
    rig.device.tick();
    rig.received();

    rig.reply("Error:Printer halted. kill() called!\n");
    assert!(handle.is_in_panic());
    assert_eq!(rig.device.queued(), 0);

    handle.reset();
    rig.device.tick();
    assert!(!handle.is_in_panic());
    assert_eq!(rig.received(), vec!["M999"]);
}

#[test]
fn test_marlin_reset_command_owns_its_slot() {
    let config = DeviceConfig {
        priority_lines: 1,
        ..Default::default()
    };
    let mut rig = Rig::new(FirmwareKind::Marlin, config);
    let handle = rig.device.handle();
    rig.device.begin();
    rig.device.tick();
    rig.received();

    rig.reply("Error:Printer halted. kill() called!\n");
    assert!(!handle.schedule_priority_command("M114", None));
    assert_eq!(handle.priority_free_slots(), 1);

    handle.reset();
    rig.device.tick();
    assert_eq!(rig.received(), vec!["M999"]);
    assert_eq!(handle.priority_free_slots(), 0);
    assert!(!handle.schedule_priority_command("M114", None));

    rig.reply("ok\n");
    assert_eq!(handle.priority_free_slots(), 1);
    assert!(handle.schedule_priority_command("M114", None));
}

#[test]
fn test_marlin_ignores_noise_while_disconnected() {
    let mut rig = Rig::marlin();
    rig.reply("Error:garbage during boot\nstart\n");
    assert!(!rig.device.is_in_panic());
    assert_eq!(rig.recorder.failures(), 0);
}

#[test]
fn test_xon_xoff_pauses_transmission() {
    let config = DeviceConfig {
        xon_xoff: true,
        ..Default::default()
    };
    let mut rig = Rig::new(FirmwareKind::Grbl, config);
    let handle = rig.device.handle();
    rig.device.begin();
    rig.reply("ok\n");
    rig.firmware.take_string();

    rig.firmware.send_str("\u{13}");
    rig.device.tick();
    assert!(handle.schedule_command("G0 X1", None));
    rig.device.tick();
    assert_eq!(rig.firmware.take_string(), "");

    rig.firmware.send_str("\u{11}");
    rig.device.tick();
    rig.device.tick();
    assert_eq!(rig.received(), vec!["G0 X1"]);
}

struct BrokenPort;

impl ByteTransport for BrokenPort {
    fn available(&mut self) -> Result<usize, TransportError> {
        Err(TransportError::Closed)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        Err(TransportError::Closed)
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }

    fn set_baud(&mut self, _rate: u32) -> Result<(), TransportError> {
        Ok(())
    }
}

#[test]
fn test_transport_failure_disconnects() {
    let bus = Arc::new(EventBus::new());
    let recorder = common::Recorder::attach(&bus);
    let mut device = cncpendant_communication::Device::new(
        FirmwareKind::Grbl,
        Box::new(BrokenPort),
        115200,
        DeviceConfig::default(),
        bus,
    );
    device.begin();
    assert!(!device.is_connected());
    assert_eq!(recorder.failures(), 1);

    device.tick();
    device.tick();
    assert_eq!(recorder.failures(), 1);
    assert!(recorder
        .events()
        .contains(&AppEvent::Device(DeviceStatusEvent::Changed)));
}
