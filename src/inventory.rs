//! Device inventory resolution.
//!
//! The persistence collaborator is abstracted behind [`DeviceStore`]; this
//! crate only reads device records and never mutates them. The
//! [`InventoryBuilder`] turns device ids or filter criteria into ordered
//! per-host [`DeviceProfile`]s ready for connection establishment.

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::adapter::{Vendor, adapter_for};
use crate::error::NetError;

/// A device row as owned by the persistence collaborator. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub hostname: Option<String>,
    pub management_ip: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vendor: Vendor,
    pub model: Option<String>,
    pub area: Option<String>,
    pub group: Option<String>,
    pub is_active: bool,
    pub description: Option<String>,
}

impl DeviceRecord {
    /// Hostname when set, otherwise the inventory name.
    pub fn display_name(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.name)
    }
}

/// Filter criteria for inventory queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviceFilters {
    pub vendors: Option<Vec<Vendor>>,
    pub areas: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
    pub is_active: bool,
}

impl Default for DeviceFilters {
    fn default() -> Self {
        Self {
            vendors: None,
            areas: None,
            groups: None,
            is_active: true,
        }
    }
}

impl DeviceFilters {
    fn matches(&self, record: &DeviceRecord) -> bool {
        if record.is_active != self.is_active {
            return false;
        }
        if let Some(vendors) = &self.vendors
            && !vendors.contains(&record.vendor)
        {
            return false;
        }
        if let Some(areas) = &self.areas
            && !record.area.as_ref().is_some_and(|a| areas.contains(a))
        {
            return false;
        }
        if let Some(groups) = &self.groups
            && !record.group.as_ref().is_some_and(|g| groups.contains(g))
        {
            return false;
        }
        true
    }
}

/// Read-only device lookup boundary.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, NetError>;
    async fn list_devices(&self, filters: &DeviceFilters) -> Result<Vec<DeviceRecord>, NetError>;
}

/// In-memory device store for embedding and tests.
#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<Vec<DeviceRecord>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record by id, keeping insertion order.
    pub async fn insert(&self, record: DeviceRecord) {
        let mut devices = self.devices.write().await;
        if let Some(existing) = devices.iter_mut().find(|d| d.id == record.id) {
            *existing = record;
        } else {
            devices.push(record);
        }
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, NetError> {
        let devices = self.devices.read().await;
        Ok(devices.iter().find(|d| d.id == device_id).cloned())
    }

    async fn list_devices(&self, filters: &DeviceFilters) -> Result<Vec<DeviceRecord>, NetError> {
        let devices = self.devices.read().await;
        Ok(devices.iter().filter(|d| filters.matches(d)).cloned().collect())
    }
}

/// Resolved per-host connection profile.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device_id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vendor: Vendor,
    /// Vendor post-connect sequence, run before caller commands.
    pub on_open: Vec<String>,
    pub description: Option<String>,
}

impl DeviceProfile {
    /// Builds a connection profile from a device record, optionally
    /// overriding the stored password.
    pub fn from_record(record: &DeviceRecord, password_override: Option<&str>) -> Self {
        let adapter = adapter_for(record.vendor);
        Self {
            device_id: record.id.clone(),
            name: record.display_name().to_string(),
            host: record.management_ip.clone(),
            port: record.port,
            username: record.username.clone(),
            password: password_override
                .map(str::to_string)
                .unwrap_or_else(|| record.password.clone()),
            vendor: record.vendor,
            on_open: adapter
                .connection_extras()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            description: record.description.clone(),
        }
    }

    pub fn platform(&self) -> &'static str {
        self.vendor.platform()
    }
}

/// Builds ordered per-host profiles from the device store.
pub struct InventoryBuilder<S: DeviceStore> {
    store: Arc<S>,
}

impl<S: DeviceStore> InventoryBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolves explicit device ids into connection profiles.
    ///
    /// Fails on an empty id list; unknown and inactive ids are skipped
    /// with a warning. Store failures are wrapped as persistence errors.
    pub async fn build_from_device_ids(
        &self,
        device_ids: &[String],
        password: Option<&str>,
    ) -> Result<Vec<DeviceProfile>, NetError> {
        if device_ids.is_empty() {
            return Err(NetError::EmptyDeviceList);
        }

        let mut profiles = Vec::with_capacity(device_ids.len());
        for device_id in device_ids {
            let record = self
                .store
                .get_device(device_id)
                .await
                .map_err(|e| NetError::Persistence(format!("inventory build failed: {e}")))?;
            match record {
                Some(record) if record.is_active => {
                    profiles.push(DeviceProfile::from_record(&record, password));
                }
                Some(_) => warn!("skipping inactive device: {device_id}"),
                None => warn!("skipping unknown device: {device_id}"),
            }
        }
        Ok(profiles)
    }

    /// Resolves filter criteria into connection profiles.
    pub async fn build_from_filters(
        &self,
        filters: &DeviceFilters,
        password: Option<&str>,
    ) -> Result<Vec<DeviceProfile>, NetError> {
        let records = self
            .store
            .list_devices(filters)
            .await
            .map_err(|e| NetError::Persistence(format!("inventory build failed: {e}")))?;
        Ok(records
            .iter()
            .map(|record| DeviceProfile::from_record(record, password))
            .collect())
    }
}

/// Summary of one device's resolved connection parameters, without
/// credentials.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HostSummary {
    pub host: String,
    pub port: u16,
    pub platform: String,
    pub vendor: Vendor,
}

impl From<&DeviceProfile> for HostSummary {
    fn from(profile: &DeviceProfile) -> Self {
        Self {
            host: profile.host.clone(),
            port: profile.port,
            platform: profile.platform().to_string(),
            vendor: profile.vendor,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_record(id: &str, vendor: Vendor) -> DeviceRecord {
    DeviceRecord {
        id: id.to_string(),
        name: format!("device-{id}"),
        hostname: None,
        management_ip: format!("192.0.2.{}", id.len()),
        port: 22,
        username: "admin".to_string(),
        password: "secret".to_string(),
        vendor,
        model: None,
        area: Some("dc-a".to_string()),
        group: None,
        is_active: true,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_from_ids_rejects_empty_list() {
        let store = Arc::new(MemoryDeviceStore::new());
        let builder = InventoryBuilder::new(store);
        let err = builder
            .build_from_device_ids(&[], None)
            .await
            .expect_err("empty list");
        assert!(matches!(err, NetError::EmptyDeviceList));
    }

    #[tokio::test]
    async fn build_from_ids_keeps_request_order_and_skips_unknown() {
        let store = Arc::new(MemoryDeviceStore::new());
        store.insert(test_record("sw1", Vendor::H3c)).await;
        store.insert(test_record("sw2", Vendor::Cisco)).await;

        let builder = InventoryBuilder::new(store);
        let ids = vec![
            "sw2".to_string(),
            "missing".to_string(),
            "sw1".to_string(),
        ];
        let profiles = builder
            .build_from_device_ids(&ids, None)
            .await
            .expect("profiles");
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["device-sw2", "device-sw1"]);
    }

    #[tokio::test]
    async fn inactive_devices_are_filtered_out() {
        let store = Arc::new(MemoryDeviceStore::new());
        let mut record = test_record("sw1", Vendor::Huawei);
        record.is_active = false;
        store.insert(record).await;

        let builder = InventoryBuilder::new(store);
        let profiles = builder
            .build_from_device_ids(&["sw1".to_string()], None)
            .await
            .expect("profiles");
        assert!(profiles.is_empty());
    }

    #[tokio::test]
    async fn filters_select_by_vendor_and_area() {
        let store = Arc::new(MemoryDeviceStore::new());
        store.insert(test_record("sw1", Vendor::H3c)).await;
        let mut other_area = test_record("sw2", Vendor::H3c);
        other_area.area = Some("dc-b".to_string());
        store.insert(other_area).await;
        store.insert(test_record("rt1", Vendor::Cisco)).await;

        let builder = InventoryBuilder::new(store);
        let filters = DeviceFilters {
            vendors: Some(vec![Vendor::H3c]),
            areas: Some(vec!["dc-a".to_string()]),
            ..Default::default()
        };
        let profiles = builder
            .build_from_filters(&filters, None)
            .await
            .expect("profiles");
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].device_id, "sw1");
    }

    #[tokio::test]
    async fn password_override_replaces_stored_credential() {
        let store = Arc::new(MemoryDeviceStore::new());
        store.insert(test_record("sw1", Vendor::H3c)).await;
        let builder = InventoryBuilder::new(store);
        let profiles = builder
            .build_from_device_ids(&["sw1".to_string()], Some("override"))
            .await
            .expect("profiles");
        assert_eq!(profiles[0].password, "override");
    }

    #[tokio::test]
    async fn profiles_carry_vendor_post_connect_sequence() {
        let store = Arc::new(MemoryDeviceStore::new());
        store.insert(test_record("sw1", Vendor::Huawei)).await;
        let builder = InventoryBuilder::new(store);
        let profiles = builder
            .build_from_device_ids(&["sw1".to_string()], None)
            .await
            .expect("profiles");
        assert_eq!(
            profiles[0].on_open,
            ["screen-length 0 temporary", "undo terminal monitor"]
        );
        assert_eq!(profiles[0].platform(), "huawei_vrp");
    }
}
