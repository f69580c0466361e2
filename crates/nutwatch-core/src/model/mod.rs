// ── Domain model ──
//
// Canonical types handed to consumers: the device list, static device
// identity, and the per-device status snapshot.

pub mod device;
pub mod snapshot;

pub use device::{DeviceInfo, DeviceList, display_name, title_case};
pub use snapshot::{ChargingState, StatusSnapshot};
