//! Peripheral lifecycle tests against the in-memory platform stack
//!
//! Covers the advertising scenarios for both roles, request dispatch through
//! the event loop and the error policy for platform rejections.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use iotsc_core::testing::{MockHandle, MockStack, StackCall};
use iotsc_core::uuids::SENDER_SERVICE_UUID;
use iotsc_core::{
    AdvertisingCommand, AdvertisingState, GattError, Operation, Peripheral, PeripheralError,
    PlatformEvent, RequestOptions, Role, Service,
};
use tokio::sync::oneshot;
use tokio_test::{assert_err, assert_ok};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn create_peripheral(role: Role, auto_advertise: bool) -> (Peripheral<MockStack>, MockHandle) {
    let (stack, handle) = MockStack::new("hci0");
    let mut peripheral = Peripheral::new(stack, "iotsc-test", auto_advertise);
    peripheral
        .add_service(Service::new(0, role, "node-17"))
        .unwrap();
    peripheral
        .add_advertised_service_uuid(role.service_uuid())
        .unwrap();
    (peripheral, handle)
}

/// Register and run the startup evaluation without entering the loop
async fn start(peripheral: &mut Peripheral<MockStack>) {
    peripheral.start().await.unwrap();
}

fn connected(device: &str) -> PlatformEvent {
    PlatformEvent::RemoteConnected {
        device: device.to_string(),
    }
}

fn disconnected(device: &str) -> PlatformEvent {
    PlatformEvent::RemoteDisconnected {
        device: device.to_string(),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

// ----------------------------------------------------------------------------
// Advertising Scenarios
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_sender_starts_advertising_from_idle() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    let status = peripheral.status();
    assert_eq!(peripheral.advertising_state(), AdvertisingState::Idle);

    let task = tokio::spawn(async move {
        let result = peripheral.run().await;
        (peripheral, result)
    });

    wait_until(|| !handle.advertising_calls().is_empty()).await;
    drop(handle);
    let (peripheral, result) = task.await.unwrap();

    assert!(matches!(result, Err(PeripheralError::EventSourceClosed)));
    assert_eq!(peripheral.advertising_state(), AdvertisingState::Advertising);
    assert!(!status.is_connected());
}

#[tokio::test]
async fn test_registration_publishes_alias_service_and_advertisement() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    start(&mut peripheral).await;

    let calls = handle.calls();
    assert_eq!(calls[0], StackCall::SetAlias("iotsc-test".to_string()));
    assert_eq!(calls[1], StackCall::RegisterService(SENDER_SERVICE_UUID));
    match &calls[2] {
        StackCall::StartAdvertising(advertisement) => {
            assert_eq!(advertisement.alias, "iotsc-test");
            assert!(advertisement.service_uuids.contains(&SENDER_SERVICE_UUID));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_stops_advertising_with_auto_advertise() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, true);
    start(&mut peripheral).await;

    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);

    assert_eq!(
        peripheral.advertising_state(),
        AdvertisingState::ConnectedNoAdvertising
    );
    assert_eq!(
        handle.advertising_calls(),
        vec![AdvertisingCommand::Start, AdvertisingCommand::Stop]
    );
}

#[tokio::test]
async fn test_disconnect_restarts_advertising() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, true);
    start(&mut peripheral).await;

    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);
    assert_ok!(peripheral.handle_event(disconnected("AA:BB:CC:DD:EE:01")).await);

    assert_eq!(peripheral.advertising_state(), AdvertisingState::Advertising);
    assert_eq!(
        handle.advertising_calls(),
        vec![
            AdvertisingCommand::Start,
            AdvertisingCommand::Stop,
            AdvertisingCommand::Start
        ]
    );
}

#[tokio::test]
async fn test_without_auto_advertise_advertising_survives_connection() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    start(&mut peripheral).await;

    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);
    assert_eq!(
        peripheral.advertising_state(),
        AdvertisingState::ConnectedStillAdvertising
    );

    assert_ok!(peripheral.handle_event(disconnected("AA:BB:CC:DD:EE:01")).await);
    assert_eq!(peripheral.advertising_state(), AdvertisingState::Advertising);
    assert_eq!(handle.advertising_calls(), vec![AdvertisingCommand::Start]);
}

#[tokio::test]
async fn test_repeated_connect_does_not_stop_during_connection() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, true);
    start(&mut peripheral).await;
    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);
    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);

    let stops = handle
        .advertising_calls()
        .into_iter()
        .filter(|c| *c == AdvertisingCommand::Stop)
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn test_status_follows_connection_events() {
    let (mut peripheral, _handle) = create_peripheral(Role::Sender, false);
    let status = peripheral.status();
    start(&mut peripheral).await;
    assert!(!status.is_connected());

    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);
    assert!(status.is_connected());

    assert_ok!(peripheral.handle_event(disconnected("AA:BB:CC:DD:EE:01")).await);
    assert!(!status.is_connected());
}

// ----------------------------------------------------------------------------
// Advertising Errors
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_rejected_start_is_surfaced_without_retry() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    handle.reject_advertising(true);

    let err = assert_err!(peripheral.run().await);
    assert!(matches!(
        err,
        PeripheralError::Advertising {
            command: AdvertisingCommand::Start,
            ..
        }
    ));
    assert_eq!(handle.advertising_calls(), vec![AdvertisingCommand::Start]);
    assert!(!peripheral.is_advertising());
}

#[tokio::test]
async fn test_run_can_be_reentered_after_rejection() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    handle.reject_advertising(true);
    assert!(peripheral.run().await.unwrap_err().is_advertising());

    handle.reject_advertising(false);
    let task = tokio::spawn(async move {
        let result = peripheral.run().await;
        (peripheral, result)
    });

    wait_until(|| handle.advertising_calls().len() == 2).await;
    drop(handle);
    let (peripheral, result) = task.await.unwrap();
    assert!(matches!(result, Err(PeripheralError::EventSourceClosed)));
    assert!(peripheral.is_advertising());
}

#[tokio::test]
async fn test_restart_after_manual_stop_advertises_again() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    start(&mut peripheral).await;
    assert_ok!(peripheral.stop_advertising().await);
    assert_eq!(peripheral.advertising_state(), AdvertisingState::Idle);

    start(&mut peripheral).await;
    assert_eq!(peripheral.advertising_state(), AdvertisingState::Advertising);
    assert_eq!(
        handle.advertising_calls(),
        vec![
            AdvertisingCommand::Start,
            AdvertisingCommand::Stop,
            AdvertisingCommand::Start
        ]
    );
}

#[tokio::test]
async fn test_restart_after_shutdown_advertises_again() {
    let (mut peripheral, handle) = create_peripheral(Role::Collector, true);
    start(&mut peripheral).await;
    assert_ok!(peripheral.shutdown().await);
    assert!(!peripheral.is_advertising());

    start(&mut peripheral).await;
    assert!(peripheral.is_advertising());
    assert_eq!(handle.advertising_calls().len(), 3);
}

#[tokio::test]
async fn test_rejected_stop_still_records_connection() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, true);
    start(&mut peripheral).await;
    handle.reject_advertising(true);

    let err = assert_err!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);
    assert!(err.is_advertising());
    assert!(peripheral.is_connected());
    assert!(peripheral.is_advertising());
}

// ----------------------------------------------------------------------------
// Object Model Misuse
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_second_service_rejected() {
    let (mut peripheral, _handle) = create_peripheral(Role::Sender, false);
    let err = peripheral
        .add_service(Service::new(1, Role::Collector, "other"))
        .unwrap_err();
    assert!(matches!(
        err,
        PeripheralError::AlreadyRegistered { uuid } if uuid == SENDER_SERVICE_UUID
    ));
}

#[tokio::test]
async fn test_advertised_uuids_frozen_after_registration() {
    let (mut peripheral, _handle) = create_peripheral(Role::Sender, false);
    start(&mut peripheral).await;
    assert!(matches!(
        peripheral.add_advertised_service_uuid(Role::Collector.service_uuid()),
        Err(PeripheralError::AlreadyRunning)
    ));
}

#[tokio::test]
async fn test_run_without_service_fails() {
    let (stack, _handle) = MockStack::new("hci0");
    let mut peripheral = Peripheral::new(stack, "iotsc-test", false);
    assert!(matches!(
        peripheral.run().await,
        Err(PeripheralError::NotRegistered)
    ));
}

// ----------------------------------------------------------------------------
// Request Dispatch
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_collector_accepts_write_and_refuses_read() {
    let (mut peripheral, _handle) = create_peripheral(Role::Collector, false);
    start(&mut peripheral).await;

    let (reply, rx) = oneshot::channel();
    assert_ok!(
        peripheral
            .handle_event(PlatformEvent::WriteRequest {
                characteristic: Service::DEVICE_ID_INDEX,
                value: b"device-42".to_vec(),
                options: RequestOptions::from_device("AA:BB:CC:DD:EE:01"),
                reply,
            })
            .await
    );
    assert_eq!(rx.await.unwrap(), Ok(()));
    assert_eq!(peripheral.service().unwrap().device_id(), "device-42");

    let (reply, rx) = oneshot::channel();
    let err = peripheral
        .handle_event(PlatformEvent::ReadRequest {
            characteristic: Service::DEVICE_ID_INDEX,
            options: RequestOptions::default(),
            reply,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PeripheralError::Gatt(GattError::Capability {
            operation: Operation::Read,
            ..
        })
    ));
    assert!(matches!(
        rx.await.unwrap(),
        Err(GattError::Capability { .. })
    ));
}

#[tokio::test]
async fn test_malformed_write_keeps_loop_running() {
    let (mut peripheral, handle) = create_peripheral(Role::Collector, false);
    let task = tokio::spawn(async move {
        let result = peripheral.run().await;
        (peripheral, result)
    });

    let err = handle
        .write(Service::DEVICE_ID_INDEX, &[0xc3, 0x28])
        .await
        .unwrap_err();
    assert!(err.is_remote_fault());

    assert_eq!(
        handle.write(Service::DEVICE_ID_INDEX, b"device-7").await,
        Ok(())
    );

    drop(handle);
    let (peripheral, _) = task.await.unwrap();
    assert_eq!(peripheral.service().unwrap().device_id(), "device-7");
}

#[tokio::test]
async fn test_sender_read_through_event_loop() {
    let (mut peripheral, handle) = create_peripheral(Role::Sender, false);
    let task = tokio::spawn(async move { peripheral.run().await });

    assert_eq!(
        handle.read(Service::DEVICE_ID_INDEX).await.unwrap(),
        b"node-17"
    );
    assert!(matches!(
        handle.write(Service::DEVICE_ID_INDEX, b"x").await,
        Err(GattError::Capability {
            operation: Operation::Write,
            ..
        })
    ));

    let result = task.await.unwrap();
    assert!(matches!(result, Err(PeripheralError::Gatt(_))));
}

#[tokio::test]
async fn test_unknown_characteristic_is_rejected() {
    let (mut peripheral, _handle) = create_peripheral(Role::Sender, false);
    start(&mut peripheral).await;

    let (reply, rx) = oneshot::channel();
    let err = peripheral
        .handle_event(PlatformEvent::ReadRequest {
            characteristic: 9,
            options: RequestOptions::default(),
            reply,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PeripheralError::Gatt(GattError::UnknownCharacteristic { index: 9 })
    ));
    assert!(rx.await.unwrap().is_err());
}

#[tokio::test]
async fn test_disconnect_callback_sees_service() {
    let (mut peripheral, _handle) = create_peripheral(Role::Sender, false);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    peripheral.set_on_remote_disconnected(move |service| {
        sink.lock().unwrap().push(service.device_id());
        service.set_device_id("node-18");
    });
    start(&mut peripheral).await;

    assert_ok!(peripheral.handle_event(connected("AA:BB:CC:DD:EE:01")).await);
    assert!(seen.lock().unwrap().is_empty());

    assert_ok!(peripheral.handle_event(disconnected("AA:BB:CC:DD:EE:01")).await);
    assert_eq!(*seen.lock().unwrap(), vec!["node-17".to_string()]);
    assert_eq!(peripheral.service().unwrap().device_id(), "node-18");
}
