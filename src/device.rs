//! Device detection and communication module
//!
//! The key dial is read through hidapi. Reports arrive on the interrupt
//! endpoint as 40-byte packets; a read that times out is not an error.

use crate::keycode::{REPORT_LEN, Report};
use hidapi::{HidApi, HidDevice};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Read buffer, larger than a report so oversized packets are not truncated mid-read
const READ_BUF_LEN: usize = 64;

/// Errors from the device transport. All of them send the daemon back to
/// waiting for the device.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    NotFound { vendor_id: u16, product_id: u16 },

    #[error("device disconnected: {0}")]
    Disconnected(String),

    #[error("permission denied opening device (check udev rules): {0}")]
    PermissionDenied(String),

    #[error("HID error: {0}")]
    Hid(String),
}

impl TransportError {
    fn from_hid(err: hidapi::HidError) -> Self {
        let message = err.to_string();
        if message.contains("ermission") {
            TransportError::PermissionDenied(message)
        } else {
            TransportError::Hid(message)
        }
    }
}

/// Source of raw reports
pub trait Transport {
    /// Open the device; called again after every failure
    fn open(&mut self) -> Result<(), TransportError>;

    /// Read one report, `None` when nothing arrived within `timeout`
    fn read_report(&mut self, timeout: Duration) -> Result<Option<Report>, TransportError>;

    /// Drop the device handle
    fn close(&mut self);
}

/// Information about a detected device interface
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
    pub interface_number: i32,
}

/// List every HID interface matching `vendor_id:product_id`
pub fn list_devices(vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>, TransportError> {
    let api = HidApi::new().map_err(TransportError::from_hid)?;
    let mut devices = Vec::new();

    for device in api.device_list() {
        if device.vendor_id() == vendor_id && device.product_id() == product_id {
            devices.push(DeviceInfo {
                path: device.path().to_string_lossy().to_string(),
                vendor_id: device.vendor_id(),
                product_id: device.product_id(),
                manufacturer: device.manufacturer_string().unwrap_or_default().to_string(),
                product: device.product_string().unwrap_or_default().to_string(),
                interface_number: device.interface_number(),
            });
        }
    }

    Ok(devices)
}

/// Copy a raw read into a fixed report, zero-padding short reads
pub fn to_report(data: &[u8]) -> Report {
    let mut report = [0u8; REPORT_LEN];
    let len = data.len().min(REPORT_LEN);
    report[..len].copy_from_slice(&data[..len]);
    report
}

/// hidapi-backed transport
pub struct HidTransport {
    vendor_id: u16,
    product_id: u16,
    handle: Option<HidDevice>,
}

impl HidTransport {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            handle: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

impl Transport for HidTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let api = HidApi::new().map_err(TransportError::from_hid)?;

        let candidates: Vec<_> = api
            .device_list()
            .filter(|d| d.vendor_id() == self.vendor_id && d.product_id() == self.product_id)
            .collect();
        for device in &candidates {
            debug!(
                "Found interface {}: {:?}",
                device.interface_number(),
                device.path().to_string_lossy()
            );
        }

        // Buttons and wheel report on the first interface
        let Some(device) = candidates
            .iter()
            .min_by_key(|d| d.interface_number().max(0))
        else {
            return Err(TransportError::NotFound {
                vendor_id: self.vendor_id,
                product_id: self.product_id,
            });
        };

        let handle = device.open_device(&api).map_err(TransportError::from_hid)?;
        info!(
            "Opened {:04x}:{:04x} ({})",
            self.vendor_id,
            self.product_id,
            device.product_string().unwrap_or("unknown")
        );
        self.handle = Some(handle);
        Ok(())
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Option<Report>, TransportError> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(TransportError::Disconnected("device not open".into()));
        };

        let mut buf = [0u8; READ_BUF_LEN];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        match handle.read_timeout(&mut buf, timeout_ms) {
            Ok(0) => Ok(None),
            Ok(len) => Ok(Some(to_report(&buf[..len]))),
            Err(e) => {
                self.handle = None;
                Err(TransportError::Disconnected(e.to_string()))
            }
        }
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            info!("Closed device");
        }
    }
}

/// Whether a kernel module is loaded, judged by /sys/module
pub fn kernel_module_loaded(name: &str) -> bool {
    Path::new("/sys/module").join(name).exists()
}
