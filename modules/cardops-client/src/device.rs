use serde::Serialize;
use uuid::Uuid;

/// Device metadata attached to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: String,
    pub manufacturer: String,
    pub os: String,
    pub os_version: String,
    pub app_version: String,
    pub ip_address: String,
    pub channel: String,
    pub browser: String,
    pub browser_version: String,
}

impl DeviceInfo {
    /// Describe this process with a fresh device id.
    pub fn detect() -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            device_type: "desktop".to_string(),
            manufacturer: "Unknown".to_string(),
            os: std::env::consts::OS.to_string(),
            os_version: "Unknown".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            ip_address: String::new(),
            channel: "WEB".to_string(),
            browser: "cardops-client".to_string(),
            browser_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Same device description, new identity. Used after a forced logout.
    pub fn rotated(&self) -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}
