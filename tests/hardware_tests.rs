//! Hardware-dependent tests that require a real KD100
//!
//! These tests are ignored by default and can be run with:
//! `cargo test -- --ignored`
//!
//! They require:
//! - A connected Huion KD100 (256c:006d)
//! - Read access to its hidraw node (udev rule or root)

use keydial::config::DeviceSettings;
use keydial::device::{self, HidTransport, Transport};
use keydial::keycode::{self, LogicalEvent};
use std::time::{Duration, Instant};

/// Test device detection with real hardware
#[test]
#[ignore]
fn test_real_device_detection() {
    let settings = DeviceSettings::default();
    let devices = device::list_devices(settings.vendor_id, settings.product_id)
        .expect("hidapi should initialize");

    assert!(!devices.is_empty(), "No KD100 found. Connect one to run this test.");
    for dev in &devices {
        println!(
            "Found: {} {} interface {} at {}",
            dev.manufacturer, dev.product, dev.interface_number, dev.path
        );
    }
}

/// Test opening the device and reading reports
#[test]
#[ignore]
fn test_real_device_open_and_read() {
    let settings = DeviceSettings::default();
    let mut transport = HidTransport::new(settings.vendor_id, settings.product_id);

    transport.open().expect("Failed to open KD100");
    assert!(transport.is_open());

    // Reads that time out are fine; any report must decode or be reported
    println!("Press buttons or turn the wheel for 3 seconds...");
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        match transport.read_report(Duration::from_millis(100)) {
            Ok(Some(report)) => {
                let code = keycode::raw_keycode(&report);
                match keycode::decode(&report) {
                    Some(LogicalEvent::Idle) => {}
                    Some(event) => println!("code {} -> {:?}", code, event),
                    None => println!("code {} -> unknown", code),
                }
            }
            Ok(None) => {}
            Err(e) => panic!("Read failed: {}", e),
        }
    }

    transport.close();
    assert!(!transport.is_open());
}

/// Test uclogic detection against the running kernel
#[test]
#[ignore]
fn test_uclogic_module_state() {
    let loaded = device::kernel_module_loaded("hid_uclogic");
    println!("hid_uclogic loaded: {}", loaded);
}
