use embassy_futures::block_on;

use super::*;
use crate::{
    config::STATUS_REPORT_PERIOD_MS,
    events::{InputEvent, InputEventKind, Key, ProximityEvent},
    power::{Feature, LowPowerFeatures, PowerPlan, RejectZone},
    protocol::{
        calibration_word, exception_word, gesture_word, reg, RawRecord, RecordStatus,
        ScanStatus, TouchHeader,
    },
    testing::{FakeBus, FakePlatform, PlatformCall, SharedSink},
};

struct Rig {
    device: TouchDevice<FakeBus, FakePlatform, SharedSink>,
    bus: FakeBus,
    platform: FakePlatform,
    sink: SharedSink,
}

impl Rig {
    fn new() -> Self {
        let bus = FakeBus::new();
        let platform = FakePlatform::new();
        let sink = SharedSink::new();
        let device = TouchDevice::new(
            TouchConfig::default(),
            bus.clone(),
            platform.clone(),
            sink.clone(),
        );
        Self {
            device,
            bus,
            platform,
            sink,
        }
    }

    fn probed() -> Self {
        let rig = Self::new();
        block_on(rig.device.probe(0)).unwrap();
        rig.reset_logs();
        rig
    }

    fn reset_logs(&self) {
        self.bus.clear_log();
        self.platform.clear();
        self.sink.take();
    }

    fn interrupt(&self, word: u32, now_ms: u64) -> IrqOutcome {
        self.bus.push_status(word);
        block_on(self.device.handle_interrupt(now_ms))
    }

    fn touch(&self, records: &[RawRecord], now_ms: u64) -> IrqOutcome {
        self.bus.set_records(reg::COORD, records);
        self.interrupt(touch_word(records.len() as u8), now_ms)
    }

    /// One watchdog tick followed by the idle check it queues.
    fn idle_cycle(&self, now_ms: u64) -> IdleCheckOutcome {
        assert_eq!(self.device.on_timer_tick(now_ms), TickOutcome::IdleCheckQueued);
        assert!(self.device.idle_check().begin(now_ms));
        let outcome = block_on(self.device.run_idle_check(now_ms));
        self.device.idle_check().finish();
        outcome
    }

    fn recover(&self, now_ms: u64) -> RecoveryOutcome {
        assert!(self.device.reset_work().begin(now_ms));
        let outcome = block_on(self.device.run_reset_recovery(now_ms));
        self.device.reset_work().finish();
        outcome
    }

    fn status(&self) -> DeviceStatus {
        block_on(self.device.status())
    }

    fn counters(&self) -> HealthCounters {
        block_on(self.device.health_counters())
    }
}

fn touch_word(count: u8) -> u32 {
    TouchHeader {
        count,
        ..TouchHeader::default()
    }
    .to_word()
}

fn press(id: u8, x: u16, y: u16) -> RawRecord {
    RawRecord::coordinate(id, RecordStatus::Press, x, y)
}

fn scan(count: u16, finger_enable: bool) -> u32 {
    ScanStatus {
        finger_enable,
        scan_count: count,
    }
    .to_word()
}

const POWER_BIT: u32 = 1 << 15;

#[test]
fn probe_starts_scanning_and_arms_timer() {
    let rig = Rig::new();

    block_on(rig.device.probe(0)).unwrap();

    let status = rig.status();
    assert_eq!(status.sys_mode, SysMode::PowerOn);
    assert!(status.initialized);
    assert!(status.irq_enabled);
    assert_eq!(rig.bus.written_words(reg::SET_MODE_SPECIAL), std::vec![POWER_BIT]);
    assert_eq!(rig.bus.written_words(reg::CMD_START_SCAN), std::vec![1]);
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_000));
    assert!(rig.device.status_report().is_pending());
    assert_eq!(
        rig.platform.control_calls(),
        std::vec![
            PlatformCall::Power(true),
            PlatformCall::Power(false),
            PlatformCall::Power(true),
            PlatformCall::Irq(true),
        ]
    );
}

#[test]
fn probe_failure_leaves_device_powered_off() {
    let rig = Rig::new();
    rig.bus.fail_at(Some(reg::CMD_START_SCAN));

    assert!(matches!(
        block_on(rig.device.probe(0)),
        Err(Error::Transport(_))
    ));

    let status = rig.status();
    assert_eq!(status.sys_mode, SysMode::PowerOff);
    assert!(!status.initialized);
    assert!(!rig.device.event_timer().is_pending());
}

#[test]
fn press_then_empty_frame_pairs_press_and_release() {
    let rig = Rig::probed();

    assert_eq!(
        rig.touch(&[press(4, 100, 200)], 10),
        IrqOutcome::Touch { pressed: 1 }
    );
    let events = rig.sink.take();
    assert_eq!(
        events.iter().map(InputEvent::kind).collect::<std::vec::Vec<_>>(),
        std::vec![InputEventKind::Press(3), InputEventKind::KeyDown(Key::Touch)]
    );
    match events[0] {
        InputEvent::Press { contact, .. } => assert_eq!((contact.x, contact.y), (100, 200)),
        other => panic!("unexpected {other:?}"),
    }
    let slots = block_on(rig.device.slots());
    assert!(slots.touched(3));
    assert_eq!(slots.pressed, 1);

    assert_eq!(rig.touch(&[], 20), IrqOutcome::Touch { pressed: 0 });
    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![InputEventKind::Release(3), InputEventKind::KeyUp(Key::Touch)]
    );
    let slots = block_on(rig.device.slots());
    assert!(!slots.touched(3));
    assert_eq!(slots.pressed, 0);
}

#[test]
fn interrupt_rearms_timer_and_marks_activity() {
    let rig = Rig::probed();

    rig.touch(&[], 400);

    assert_eq!(rig.device.event_timer().due_ms(), Some(1_400));
    assert_eq!(rig.device.on_timer_tick(450), TickOutcome::Quiet);
}

#[test]
fn large_frame_is_read_in_two_transfers() {
    let rig = Rig::probed();
    let records: std::vec::Vec<RawRecord> =
        (1..=7).map(|id| press(id, 100 * id as u16, 200)).collect();
    rig.bus.set_records(reg::COORD, &records[..5]);
    rig.bus.set_records(reg::EXT_COORD, &records[5..]);

    assert_eq!(rig.interrupt(touch_word(7), 10), IrqOutcome::Touch { pressed: 7 });

    assert_eq!(
        rig.bus.reads(),
        std::vec![(reg::INTR_MSG, 4), (reg::COORD, 40), (reg::EXT_COORD, 16)]
    );
    let kinds = rig.sink.take_kinds();
    assert_eq!(kinds.len(), 8);
    assert_eq!(kinds[6], InputEventKind::Press(6));
    assert_eq!(kinds[7], InputEventKind::KeyDown(Key::Touch));
    assert_eq!(block_on(rig.device.slots()).all_multi_finger_count, 1);
}

#[test]
fn failed_record_read_aborts_frame_without_mutation() {
    let rig = Rig::probed();
    rig.touch(&[press(4, 100, 200)], 10);
    rig.reset_logs();

    rig.bus.fail_at(Some(reg::COORD));
    rig.bus
        .set_records(reg::COORD, &[RawRecord::coordinate(4, RecordStatus::Move, 300, 300)]);
    let word = TouchHeader {
        count: 1,
        hover: 2,
        pocket: false,
    }
    .to_word();

    assert_eq!(rig.interrupt(word, 20), IrqOutcome::TransportFailed);

    assert!(rig.sink.take().is_empty());
    let slots = block_on(rig.device.slots());
    assert!(slots.touched(3));
    assert_eq!(slots.slots[3].x, 100);
    assert_eq!(rig.status().hover, 0);
    assert_eq!(rig.counters().irq_err_cnt, 1);
    let coord_reads = rig
        .bus
        .reads()
        .iter()
        .filter(|(addr, _)| *addr == reg::COORD)
        .count();
    assert_eq!(coord_reads, 3);
}

#[test]
fn exhausted_error_budget_schedules_reset() {
    let rig = Rig::probed();
    rig.bus.fail_always(true);

    for n in 0..4 {
        assert_eq!(
            block_on(rig.device.handle_interrupt(10 + n)),
            IrqOutcome::TransportFailed
        );
    }
    assert!(!rig.device.reset_work().is_pending());
    assert_eq!(rig.counters().irq_err_cnt, 4);

    block_on(rig.device.handle_interrupt(20));

    assert!(rig.device.reset_work().is_pending());
    assert_eq!(rig.counters().irq_err_cnt, 0);
}

#[test]
fn successful_frame_clears_error_budget() {
    let rig = Rig::probed();
    rig.bus.fail_next(3);
    block_on(rig.device.handle_interrupt(5));
    assert_eq!(rig.counters().irq_err_cnt, 1);

    rig.touch(&[], 10);

    assert_eq!(rig.counters().irq_err_cnt, 0);
}

#[test]
fn glitch_is_counted_without_events() {
    let rig = Rig::probed();

    assert_eq!(rig.interrupt(0x1234_5678, 10), IrqOutcome::Glitch);

    assert!(rig.sink.take().is_empty());
    assert_eq!(rig.status().glitch_count, 1);
    assert_eq!(rig.counters().irq_err_cnt, 1);
}

#[test]
fn exception_schedules_recovery_and_keeps_counters_until_it_runs() {
    let rig = Rig::probed();
    rig.bus.fail_next(3);
    block_on(rig.device.handle_interrupt(5));

    assert_eq!(
        rig.interrupt(exception_word(0x3a), 10),
        IrqOutcome::Exception { code: 0x3a }
    );

    assert!(rig.sink.take().is_empty());
    assert!(rig.device.reset_work().is_pending());
    assert_eq!(rig.status().last_exception, Some(0x3a));
    assert_eq!(rig.counters().irq_err_cnt, 1);

    rig.reset_logs();
    assert_eq!(rig.recover(20), RecoveryOutcome::Recovered);

    assert_eq!(rig.counters(), HealthCounters::default());
    assert_eq!(
        rig.platform.control_calls(),
        std::vec![
            PlatformCall::Irq(false),
            PlatformCall::Power(false),
            PlatformCall::Power(true),
            PlatformCall::Irq(true),
        ]
    );
    assert_eq!(rig.bus.written_words(reg::CMD_START_SCAN), std::vec![1]);
}

#[test]
fn recovery_force_releases_held_fingers() {
    let rig = Rig::probed();
    rig.touch(&[press(2, 50, 60)], 10);
    rig.interrupt(exception_word(0x01), 20);
    rig.sink.take();

    rig.recover(30);

    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![InputEventKind::Release(1), InputEventKind::KeyUp(Key::Touch)]
    );
}

#[test]
fn reset_is_dropped_while_calibrating() {
    let rig = Rig::probed();
    rig.interrupt(exception_word(0x10), 10);
    block_on(rig.device.set_maintenance(Maintenance {
        calibrating: true,
        ..Maintenance::default()
    }));
    rig.reset_logs();

    assert_eq!(rig.recover(20), RecoveryOutcome::Dropped);
    assert!(rig.platform.calls().is_empty());
    assert_eq!(rig.bus.op_count(), 0);
    assert!(!rig.device.reset_work().is_pending());

    block_on(rig.device.set_maintenance(Maintenance::default()));
    rig.interrupt(exception_word(0x10), 30);
    assert!(rig.device.reset_work().is_pending());
}

#[test]
fn stalled_scan_counter_schedules_one_reset() {
    let rig = Rig::probed();
    rig.bus.set_word(reg::TOUCH_STATUS, scan(7, true));
    assert_eq!(rig.idle_cycle(500), IdleCheckOutcome::Advanced);

    assert_eq!(rig.idle_cycle(1_500), IdleCheckOutcome::Stalled);
    assert_eq!(rig.counters().scan_retry, 1);
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_600));

    rig.bus.set_word(reg::TOUCH_STATUS, 0);
    assert_eq!(rig.idle_cycle(2_500), IdleCheckOutcome::ResetScheduled);
    assert_eq!(rig.counters().scan_retry, 0);
    assert_eq!(rig.device.reset_work().due_ms(), Some(2_500));

    rig.bus.set_word(reg::TOUCH_STATUS, scan(7, true));
    assert_eq!(rig.idle_cycle(3_500), IdleCheckOutcome::Stalled);
    assert_eq!(rig.device.reset_work().due_ms(), Some(2_500));
}

#[test]
fn idle_check_with_no_fingers_clears_stuck_slots() {
    let rig = Rig::probed();
    rig.touch(&[press(4, 100, 200)], 10);
    rig.sink.take();
    rig.bus.set_word(reg::TOUCH_STATUS, scan(5, false));

    rig.idle_cycle(1_000);

    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![InputEventKind::Release(3), InputEventKind::KeyUp(Key::Touch)]
    );
    assert_eq!(block_on(rig.device.slots()).touched_count(), 0);
}

#[test]
fn tick_never_waits_on_a_busy_device() {
    let rig = Rig::probed();

    rig.device.irq_working.store(true, Ordering::Release);
    assert_eq!(rig.device.on_timer_tick(500), TickOutcome::Busy);
    rig.device.irq_working.store(false, Ordering::Release);

    {
        let _guard = block_on(rig.device.core.lock());
        assert_eq!(rig.device.on_timer_tick(600), TickOutcome::Busy);
    }

    assert!(!rig.device.idle_check().is_pending());
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_600));
}

#[test]
fn tick_skips_while_recording() {
    let rig = Rig::probed();

    block_on(rig.device.set_recording(true)).unwrap();

    assert_eq!(rig.bus.written_words(reg::SET_REC_MODE), std::vec![1]);
    assert_eq!(rig.device.on_timer_tick(500), TickOutcome::Skipped);
    assert!(!rig.device.idle_check().is_pending());
}

#[test]
fn tick_skips_before_probe() {
    let rig = Rig::new();

    assert_eq!(rig.device.on_timer_tick(500), TickOutcome::Skipped);
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_500));
}

#[test]
fn suspend_resume_round_trip_restores_power_on() {
    let rig = Rig::probed();

    assert_eq!(block_on(rig.device.suspend()), PowerPlan::EnterPowerOff);
    assert_eq!(rig.status().sys_mode, SysMode::PowerOff);
    assert!(!rig.device.event_timer().is_pending());
    assert!(!rig.device.status_report().is_pending());
    assert_eq!(
        rig.platform.control_calls(),
        std::vec![PlatformCall::Irq(false), PlatformCall::Power(false)]
    );

    assert_eq!(block_on(rig.device.resume(100)).unwrap(), PowerPlan::ColdStart);
    assert_eq!(rig.status().sys_mode, SysMode::PowerOn);
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_100));
    assert!(rig.device.status_report().is_pending());
}

#[test]
fn interrupts_are_ignored_while_powered_off() {
    let rig = Rig::probed();
    block_on(rig.device.suspend());
    rig.reset_logs();

    assert_eq!(rig.interrupt(touch_word(0), 10), IrqOutcome::Ignored);
    assert_eq!(rig.bus.op_count(), 0);
}

#[test]
fn low_power_suspend_enables_gestures_and_resume_disables_them() {
    let rig = Rig::probed();
    block_on(rig.device.set_low_power_features(LowPowerFeatures {
        aod: true,
        double_tap_wake: true,
        ..LowPowerFeatures::default()
    }))
    .unwrap();

    assert_eq!(block_on(rig.device.suspend()), PowerPlan::EnterLowPower);
    assert_eq!(rig.status().sys_mode, SysMode::LowPowerMonitor);
    assert_eq!(rig.bus.written_words(reg::SPONGE_FEATURE), std::vec![0b11]);
    assert_eq!(rig.bus.written_words(reg::GESTURE_EN), std::vec![1]);
    assert_eq!(rig.platform.control_calls(), std::vec![PlatformCall::Wake(true)]);
    assert!(rig.status().irq_enabled);
    rig.reset_logs();

    assert_eq!(
        block_on(rig.device.resume(50)).unwrap(),
        PowerPlan::WakeFromLowPower
    );
    assert_eq!(rig.status().sys_mode, SysMode::PowerOn);
    assert_eq!(rig.bus.written_words(reg::GESTURE_EN), std::vec![0]);
    assert!(rig.bus.written_words(reg::CMD_START_SCAN).is_empty());
    assert_eq!(
        rig.platform.control_calls(),
        std::vec![PlatformCall::Wake(false), PlatformCall::Irq(true)]
    );
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_050));
}

#[test]
fn proximity_power_off_masks_wakeup_and_cancels_input() {
    let rig = Rig::probed();
    block_on(rig.device.set_low_power_features(LowPowerFeatures {
        aod: true,
        double_tap_wake: true,
        ..LowPowerFeatures::default()
    }))
    .unwrap();
    rig.touch(&[press(1, 10, 10)], 10);
    rig.sink.take();
    block_on(rig.device.set_prox_power_off(true));

    block_on(rig.device.suspend());

    assert_eq!(rig.bus.written_words(reg::SPONGE_FEATURE), std::vec![0b01]);
    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![
            InputEventKind::Release(0),
            InputEventKind::KeyUp(Key::Touch),
            InputEventKind::KeyDown(Key::InterruptCancel),
            InputEventKind::KeyUp(Key::InterruptCancel),
        ]
    );
    assert!(!rig.status().prox_power_off);
}

#[test]
fn aod_double_tap_reports_packed_coordinates() {
    let rig = Rig::probed();
    block_on(rig.device.set_low_power_features(LowPowerFeatures {
        aod: true,
        ..LowPowerFeatures::default()
    }))
    .unwrap();
    block_on(rig.device.suspend());
    rig.reset_logs();
    rig.bus
        .set_bytes(reg::GESTURE_MSG, &[2, 1, 0, 0x12, 0x34, 0x56, 0, 0]);

    assert_eq!(rig.interrupt(gesture_word(0), 10), IrqOutcome::Gesture);

    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![
            InputEventKind::KeyDown(Key::Gesture),
            InputEventKind::KeyUp(Key::Gesture)
        ]
    );
    let gesture = rig.device.gesture_status();
    assert_eq!((gesture.scrub_x, gesture.scrub_y), (0x125, 0x346));
    assert_eq!(gesture.aod_count, 1);
}

#[test]
fn unsupported_gesture_command_is_dropped() {
    let rig = Rig::probed();

    assert_eq!(rig.interrupt(gesture_word(3), 10), IrqOutcome::GestureDropped);

    assert!(rig.sink.take().is_empty());
    assert_eq!(rig.bus.reads(), std::vec![(reg::INTR_MSG, 4)]);
}

#[test]
fn recovery_in_low_power_restores_gesture_mode() {
    let rig = Rig::probed();
    block_on(rig.device.set_low_power_features(LowPowerFeatures {
        single_tap: true,
        ..LowPowerFeatures::default()
    }))
    .unwrap();
    block_on(rig.device.suspend());
    rig.interrupt(exception_word(0x22), 10);
    rig.reset_logs();

    assert_eq!(rig.recover(20), RecoveryOutcome::Recovered);

    assert_eq!(rig.bus.written_words(reg::SPONGE_FEATURE), std::vec![0b100]);
    assert_eq!(rig.bus.written_words(reg::GESTURE_EN), std::vec![1]);
    assert!(rig.platform.control_calls().contains(&PlatformCall::Wake(true)));
    assert!(!rig.device.event_timer().is_pending());
}

#[test]
fn calibration_result_is_stored() {
    let rig = Rig::probed();
    let mut block = std::vec::Vec::new();
    for word in [0x1111_2222u32, 0x3333_4444, 0x5555_6666] {
        block.extend_from_slice(&word.to_be_bytes());
    }
    rig.bus.set_bytes(reg::INTR_MSG, &block);

    assert_eq!(rig.interrupt(calibration_word(), 10), IrqOutcome::ResultStored);

    assert_eq!(
        rig.status().calib_result,
        Some([0x1111_2222, 0x3333_4444, 0x5555_6666])
    );
    assert!(rig.sink.take().is_empty());
}

#[test]
fn proximity_changes_are_reported_once() {
    let rig = Rig::probed();
    let word = TouchHeader {
        count: 0,
        hover: 3,
        pocket: true,
    }
    .to_word();

    rig.interrupt(word, 10);
    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![
            InputEventKind::Proximity(ProximityEvent::Hover(3)),
            InputEventKind::Proximity(ProximityEvent::Pocket(true)),
        ]
    );

    rig.interrupt(word, 20);
    assert!(rig.sink.take().is_empty());
}

#[test]
fn pocket_suspend_forces_next_pocket_report() {
    let rig = Rig::probed();
    block_on(rig.device.set_feature(Feature::Pocket, true)).unwrap();
    let word = TouchHeader {
        count: 0,
        hover: 0,
        pocket: true,
    }
    .to_word();
    rig.interrupt(word, 10);
    rig.sink.take();

    assert_eq!(block_on(rig.device.suspend()), PowerPlan::EnterLowPower);
    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![
            InputEventKind::KeyDown(Key::InterruptCancel),
            InputEventKind::KeyUp(Key::InterruptCancel),
        ]
    );

    block_on(rig.device.resume(20)).unwrap();
    rig.interrupt(word, 30);
    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![InputEventKind::Proximity(ProximityEvent::Pocket(true))]
    );
}

#[test]
fn features_latch_while_powered_off() {
    let rig = Rig::new();

    assert!(block_on(rig.device.set_feature(Feature::Glove, true)).unwrap());
    assert_eq!(rig.bus.op_count(), 0);

    block_on(rig.device.probe(0)).unwrap();
    assert_eq!(
        rig.bus.written_words(reg::SET_MODE_SPECIAL),
        std::vec![POWER_BIT | 1 << 8]
    );
    rig.bus.clear_log();

    assert!(block_on(rig.device.set_feature(Feature::Charger, true)).unwrap());
    assert!(!block_on(rig.device.set_feature(Feature::Charger, true)).unwrap());
    assert_eq!(
        rig.bus.written_words(reg::SET_MODE_SPECIAL),
        std::vec![POWER_BIT | 1 << 8 | 1]
    );
}

#[test]
fn reject_zone_writes_extents_and_mode_bit() {
    let rig = Rig::probed();

    block_on(rig.device.set_reject_zone(Some(RejectZone {
        top: 100,
        bottom: 200,
    })))
    .unwrap();

    assert_eq!(rig.bus.written_words(reg::SET_REJECTZONE_TOP), std::vec![100]);
    assert_eq!(rig.bus.written_words(reg::SET_REJECTZONE_BOTTOM), std::vec![200]);
    assert_eq!(
        rig.bus.written_words(reg::SET_MODE_SPECIAL),
        std::vec![POWER_BIT | 1 << 9]
    );
}

#[test]
fn secure_session_fails_fast_without_bus_traffic() {
    let rig = Rig::probed();
    rig.touch(&[press(4, 100, 200)], 10);
    rig.reset_logs();

    block_on(rig.device.enter_secure_session());

    assert!(rig.device.is_session_locked());
    assert_eq!(
        rig.sink.take_kinds(),
        std::vec![InputEventKind::Release(3), InputEventKind::KeyUp(Key::Touch)]
    );
    assert!(!rig.device.event_timer().is_pending());

    assert_eq!(rig.interrupt(touch_word(0), 20), IrqOutcome::SessionLocked);
    assert!(!rig.device.event_timer().is_pending());
    assert_eq!(block_on(rig.device.run_idle_check(30)), IdleCheckOutcome::Skipped);
    assert_eq!(
        block_on(rig.device.run_reset_recovery(40)),
        RecoveryOutcome::Dropped
    );
    assert_eq!(rig.bus.op_count(), 0);
    assert_eq!(rig.counters().irq_err_cnt, 0);

    block_on(rig.device.exit_secure_session(100));
    assert!(!rig.device.is_session_locked());
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_100));
}

#[test]
fn status_report_reschedules_itself() {
    let rig = Rig::probed();

    assert!(rig.device.status_report().begin(0));
    block_on(rig.device.run_status_report(0));
    rig.device.status_report().finish();

    assert_eq!(
        rig.device.status_report().due_ms(),
        Some(STATUS_REPORT_PERIOD_MS as u64)
    );
}

#[test]
fn shutdown_blocks_resume() {
    let rig = Rig::probed();

    block_on(rig.device.shutdown());

    let status = rig.status();
    assert_eq!(status.sys_mode, SysMode::PowerOff);
    assert!(!status.initialized);
    assert!(matches!(
        block_on(rig.device.resume(10)),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn reset_cancelled_by_suspend_does_not_block_later_recovery() {
    let rig = Rig::probed();
    rig.interrupt(exception_word(0x3a), 10);
    assert!(rig.device.reset_work().is_pending());

    block_on(rig.device.suspend());
    assert!(!rig.device.reset_work().is_pending());
    block_on(rig.device.resume(100)).unwrap();

    assert_eq!(
        rig.interrupt(exception_word(0x3b), 110),
        IrqOutcome::Exception { code: 0x3b }
    );
    assert!(rig.device.reset_work().is_pending());
}

#[test]
fn watchdog_escalates_again_after_cancelled_reset() {
    let rig = Rig::probed();
    rig.interrupt(exception_word(0x3a), 10);
    block_on(rig.device.suspend());
    block_on(rig.device.resume(100)).unwrap();
    rig.bus.set_word(reg::TOUCH_STATUS, scan(7, true));

    assert_eq!(rig.idle_cycle(300), IdleCheckOutcome::Advanced);
    assert_eq!(rig.idle_cycle(500), IdleCheckOutcome::Stalled);
    assert_eq!(rig.counters().scan_retry, 1);
    assert_eq!(rig.idle_cycle(700), IdleCheckOutcome::ResetScheduled);
    assert!(rig.device.reset_work().is_pending());
}

#[test]
fn gesture_in_low_power_leaves_timer_disarmed() {
    let rig = Rig::probed();
    block_on(rig.device.set_low_power_features(LowPowerFeatures {
        aod: true,
        ..LowPowerFeatures::default()
    }))
    .unwrap();
    block_on(rig.device.suspend());
    rig.bus
        .set_bytes(reg::GESTURE_MSG, &[2, 1, 0, 0x12, 0x34, 0x56, 0, 0]);

    assert_eq!(rig.interrupt(gesture_word(0), 10), IrqOutcome::Gesture);

    assert_eq!(rig.status().sys_mode, SysMode::LowPowerMonitor);
    assert!(!rig.device.event_timer().is_pending());
}

#[test]
fn interrupt_while_powered_off_leaves_timer_disarmed() {
    let rig = Rig::probed();
    block_on(rig.device.suspend());

    assert_eq!(rig.interrupt(touch_word(0), 10), IrqOutcome::Ignored);

    assert!(!rig.device.event_timer().is_pending());
}

#[test]
fn failed_wake_powers_off_and_next_resume_starts_cold() {
    let rig = Rig::probed();
    block_on(rig.device.set_low_power_features(LowPowerFeatures {
        aod: true,
        ..LowPowerFeatures::default()
    }))
    .unwrap();
    block_on(rig.device.suspend());
    rig.bus.fail_at(Some(reg::GESTURE_EN));

    assert!(matches!(
        block_on(rig.device.resume(50)),
        Err(Error::Transport(_))
    ));
    let status = rig.status();
    assert_eq!(status.sys_mode, SysMode::PowerOff);
    assert!(!status.irq_enabled);
    assert!(!rig.device.event_timer().is_pending());
    assert!(!rig.device.status_report().is_pending());

    rig.bus.fail_at(None);
    rig.reset_logs();
    assert_eq!(block_on(rig.device.resume(100)).unwrap(), PowerPlan::ColdStart);

    assert_eq!(rig.status().sys_mode, SysMode::PowerOn);
    assert_eq!(rig.bus.written_words(reg::CMD_START_SCAN), std::vec![1]);
    assert_eq!(rig.device.event_timer().due_ms(), Some(1_100));
    assert!(rig.device.status_report().is_pending());
}
