//! Savestate behavior through the public surface.

mod common;

use emu_core::types::ControllerState;
use emu_core::{StateError, System};
use emu_md::{ConsoleKind, MdConfig};

fn run_frames(sys: &mut emu_md::MdSystem, count: usize) {
    let mut audio = Vec::new();
    for _ in 0..count {
        audio.clear();
        sys.run_frame(None, &ControllerState::default(), &mut audio)
            .unwrap();
    }
}

fn continuation_matches(kind: ConsoleKind) {
    let mut original = common::build(kind, MdConfig::default());
    run_frames(&mut original, 3);
    let image = original.save_state();
    run_frames(&mut original, 3);

    let mut restored = common::build(kind, MdConfig::default());
    restored.load_state(&image).unwrap();
    run_frames(&mut restored, 3);

    assert_eq!(original.save_state(), restored.save_state());
}

#[test]
fn dual_console_restore_continues_identically() {
    continuation_matches(ConsoleKind::Dual);
}

#[test]
fn compact_console_restore_continues_identically() {
    continuation_matches(ConsoleKind::Compact);
}

#[test]
fn roundtrip_is_bit_identical_after_live_frames() {
    for kind in [ConsoleKind::Dual, ConsoleKind::Compact] {
        let mut sys = common::build(kind, MdConfig::default());
        run_frames(&mut sys, 4);
        let image = sys.save_state();
        sys.load_state(&image).unwrap();
        assert_eq!(sys.save_state(), image);
    }
}

#[test]
fn unknown_signature_leaves_state_untouched() {
    let mut sys = common::build(ConsoleKind::Compact, MdConfig::default());
    run_frames(&mut sys, 2);
    let before = sys.save_state();

    let garbage = vec![0x5A; 0x4000];
    assert_eq!(sys.load_state(&garbage), Err(StateError::UnknownSignature));
    assert_eq!(sys.save_state(), before);

    // Frames still run normally afterwards
    run_frames(&mut sys, 1);
}

#[test]
fn restore_rebuilds_video_memory_context() {
    let mut sys = common::build(ConsoleKind::Compact, MdConfig::default());

    // Render some frames so the backend context diverges from power-on
    let mut audio = Vec::new();
    let mut frame = emu_core::types::Frame::new(1, 1);
    for _ in 0..3 {
        audio.clear();
        sys.run_frame(Some(&mut frame), &ControllerState::default(), &mut audio)
            .unwrap();
    }
    let image = sys.save_state();

    let mut restored = common::build(ConsoleKind::Compact, MdConfig::default());
    restored.load_state(&image).unwrap();

    // The restored backend reports the same accumulated frame count
    audio.clear();
    let mut check = emu_core::types::Frame::new(1, 1);
    restored
        .run_frame(Some(&mut check), &ControllerState::default(), &mut audio)
        .unwrap();
    assert_eq!(check.pixels[0], 4 * 192);
}
