use candle_core::Device;
use tracing::{info, warn};

/// Where both encoders run. `APP_DEVICE=cpu` pins the CPU; otherwise Metal is
/// used when compiled in and present.
pub fn select_device() -> Device {
    device_for(std::env::var("APP_DEVICE").ok().as_deref())
}

fn device_for(requested: Option<&str>) -> Device {
    match requested.map(str::to_ascii_lowercase).as_deref() {
        Some("cpu") => {}
        None | Some("" | "auto" | "metal") => {
            if let Some(dev) = metal() { return dev; }
        }
        Some(other) => warn!(device = other, "unknown APP_DEVICE, falling back to CPU"),
    }
    info!(device = "cpu", "encoder device");
    Device::Cpu
}

#[cfg(feature = "metal")]
fn metal() -> Option<Device> {
    let dev = Device::new_metal(0).ok()?;
    info!(device = "metal", "encoder device");
    Some(dev)
}

#[cfg(not(feature = "metal"))]
fn metal() -> Option<Device> { None }
