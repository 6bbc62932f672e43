//! End-to-end behavior of inventory resolution and batch dispatch,
//! exercised with injected task functions so no device is contacted.

use std::collections::HashMap;
use std::sync::Arc;

use netpilot::NetError;
use netpilot::adapter::{Vendor, adapter_for};
use netpilot::inventory::{DeviceFilters, DeviceRecord, DeviceStore, MemoryDeviceStore};
use netpilot::runner::TaskRunner;
use netpilot::tasks::{TaskContext, TaskFn, TaskResult, available_tasks, execute_network_task};

fn record(id: &str, vendor: Vendor, area: &str) -> DeviceRecord {
    DeviceRecord {
        id: id.to_string(),
        name: format!("device-{id}"),
        hostname: None,
        management_ip: "192.0.2.10".to_string(),
        port: 22,
        username: "admin".to_string(),
        password: "secret".to_string(),
        vendor,
        model: None,
        area: Some(area.to_string()),
        group: None,
        is_active: true,
        description: None,
    }
}

async fn seeded_store() -> Arc<MemoryDeviceStore> {
    let store = Arc::new(MemoryDeviceStore::new());
    store.insert(record("sw1", Vendor::H3c, "dc-a")).await;
    store.insert(record("sw2", Vendor::Huawei, "dc-a")).await;
    store.insert(record("sw3", Vendor::Cisco, "dc-b")).await;
    store
}

/// Succeeds everywhere except the named device.
fn faulty_on(device_id: &str) -> TaskFn {
    let device_id = device_id.to_string();
    Arc::new(move |ctx: TaskContext| {
        let device_id = device_id.clone();
        Box::pin(async move {
            if ctx.device_id == device_id {
                TaskResult::failure(&ctx, "show version", "link flapped mid-command", 0.2)
            } else {
                let parsed =
                    adapter_for(ctx.vendor).parse_output("get_version", "Version 7.1.070");
                TaskResult::ok(
                    &ctx,
                    "show version",
                    "Version 7.1.070".to_string(),
                    parsed,
                    0.2,
                )
            }
        })
    })
}

#[tokio::test]
async fn one_faulty_device_never_fails_the_batch() {
    let runner = TaskRunner::new(seeded_store().await);
    let ids: Vec<String> = ["sw1", "sw2", "sw3"].iter().map(|s| s.to_string()).collect();

    let outcome = runner
        .run_on_devices(faulty_on("sw2"), &ids, None, HashMap::new())
        .await
        .expect("batch call itself must not fail");

    assert_eq!(outcome.success.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert!(outcome.failed["device-sw2"].contains("link flapped"));

    for result in outcome.success.values() {
        assert!(result.success);
        assert!(result.raw_output.is_some());
        assert!(result.execution_time >= 0.0);
    }
}

#[tokio::test]
async fn batch_results_keep_resolved_inventory_order() {
    let runner = TaskRunner::new(seeded_store().await);
    let ids: Vec<String> = ["sw3", "sw2", "sw1"].iter().map(|s| s.to_string()).collect();

    let outcome = runner
        .run_on_devices(faulty_on("none"), &ids, None, HashMap::new())
        .await
        .expect("batch");
    let hosts: Vec<&str> = outcome.success.keys().map(String::as_str).collect();
    assert_eq!(hosts, ["device-sw3", "device-sw2", "device-sw1"]);
}

#[tokio::test]
async fn filter_dispatch_targets_matching_devices_only() {
    let runner = TaskRunner::new(seeded_store().await);
    let filters = DeviceFilters {
        areas: Some(vec!["dc-a".to_string()]),
        ..Default::default()
    };

    let outcome = runner
        .run_on_filters(faulty_on("none"), &filters, None, HashMap::new())
        .await
        .expect("batch");
    assert_eq!(outcome.total(), 2);
    assert!(outcome.success.contains_key("device-sw1"));
    assert!(outcome.success.contains_key("device-sw2"));
}

#[tokio::test]
async fn empty_device_list_is_rejected_up_front() {
    let runner = TaskRunner::new(seeded_store().await);
    let err = runner
        .run_on_devices(faulty_on("none"), &[], None, HashMap::new())
        .await
        .expect_err("empty id list");
    assert!(matches!(err, NetError::EmptyDeviceList));
}

#[tokio::test]
async fn unknown_named_task_degrades_per_host() {
    let runner = TaskRunner::new(seeded_store().await);
    let ids = vec!["sw1".to_string()];

    let outcome = runner
        .run_named("defragment_flash", &ids, None, HashMap::new())
        .await
        .expect("batch");
    assert!(outcome.success.is_empty());
    assert!(outcome.failed["device-sw1"].contains("unknown task"));
}

#[tokio::test]
async fn task_registry_round_trips_through_execute() {
    assert!(available_tasks().contains(&"find_mac"));

    let store = seeded_store().await;
    let device = store.get_device("sw1").await.expect("lookup").expect("sw1");
    let profile = netpilot::inventory::DeviceProfile::from_record(&device, None);
    let ctx = TaskContext::new(&profile, HashMap::new());

    // No mac_address supplied: the failure must name the missing param.
    let result = execute_network_task("find_mac", ctx, HashMap::new()).await;
    assert!(!result.success);
    assert!(result.error.expect("error").contains("mac_address"));
}
