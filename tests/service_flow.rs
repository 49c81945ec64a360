// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the device service against a scripted network.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use wemo_sync::cache::{BlobStore, MemoryStore};
use wemo_sync::event::{DeviceEvent, ListSource};
use wemo_sync::protocol::DiscoverySink;
use wemo_sync::types::{BinaryState, Brightness, DeviceKind, Direction};
use wemo_sync::{
    CommandPhase, DeviceRecord, DeviceService, Endpoint, Error, InvalidCommand, PersistenceError,
    ProtocolError, RawDeviceInfo, ServiceConfig, Transport,
};

// ============================================================================
// Scripted network
// ============================================================================

/// Devices on a fake network, keyed by host.
#[derive(Default)]
struct Network {
    responses: Mutex<Vec<(Duration, RawDeviceInfo)>>,
    states: Mutex<HashMap<String, BinaryState>>,
    levels: Mutex<HashMap<String, Brightness>>,
    broadcast_fails: bool,
    broadcast_delay: Duration,
    write_delay: Duration,
    reject_writes: bool,
    broadcasts: AtomicUsize,
    control_calls: AtomicUsize,
}

impl Network {
    fn answer(&self, delay: Duration, info: RawDeviceInfo) {
        self.responses.lock().push((delay, info));
    }

    fn set_state(&self, host: &str, state: BinaryState) {
        self.states.lock().insert(host.to_string(), state);
    }

    fn set_level(&self, host: &str, level: u8) {
        self.levels
            .lock()
            .insert(host.to_string(), Brightness::new(level).unwrap());
    }

    fn state(&self, host: &str) -> Option<BinaryState> {
        self.states.lock().get(host).cloned()
    }

    fn unreachable(endpoint: &Endpoint) -> ProtocolError {
        ProtocolError::Unreachable(endpoint.to_string())
    }
}

struct Scripted(Arc<Network>);

impl Transport for Scripted {
    async fn broadcast_discover(&self, sink: DiscoverySink) -> Result<(), ProtocolError> {
        self.0.broadcasts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.0.broadcast_delay).await;
        if self.0.broadcast_fails {
            return Err(ProtocolError::Io(std::io::Error::other("network is down")));
        }

        let responses = self.0.responses.lock().clone();
        tokio::spawn(async move {
            let started = Instant::now();
            for (at, info) in responses {
                tokio::time::sleep_until(started + at).await;
                let _ = sink.send(info);
            }
            sink.closed().await;
        });
        Ok(())
    }

    async fn binary_state(&self, endpoint: &Endpoint) -> Result<BinaryState, ProtocolError> {
        self.0.control_calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .state(&endpoint.host)
            .ok_or_else(|| Network::unreachable(endpoint))
    }

    async fn set_binary_state(
        &self,
        endpoint: &Endpoint,
        state: &BinaryState,
    ) -> Result<(), ProtocolError> {
        self.0.control_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.0.write_delay).await;
        if self.0.reject_writes {
            return Err(ProtocolError::Fault("Invalid Action".to_string()));
        }
        if self.0.state(&endpoint.host).is_none() {
            return Err(Network::unreachable(endpoint));
        }
        self.0.set_state(&endpoint.host, state.clone());
        Ok(())
    }

    async fn brightness(&self, endpoint: &Endpoint) -> Result<Brightness, ProtocolError> {
        self.0.control_calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .levels
            .lock()
            .get(&endpoint.host)
            .copied()
            .ok_or_else(|| Network::unreachable(endpoint))
    }

    async fn set_brightness(
        &self,
        endpoint: &Endpoint,
        brightness: Brightness,
    ) -> Result<(), ProtocolError> {
        self.0.control_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.0.write_delay).await;
        self.0
            .levels
            .lock()
            .insert(endpoint.host.clone(), brightness);
        Ok(())
    }
}

/// Store that takes a while to answer reads.
struct SlowStore(MemoryStore, Duration);

impl BlobStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        tokio::time::sleep(self.1).await;
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.0.set(key, value).await
    }
}

/// Store that reads fine but refuses every write.
#[derive(Default)]
struct ReadOnlyStore(MemoryStore);

impl BlobStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.0.get(key).await
    }

    async fn set(&self, _: &str, _: String) -> Result<(), PersistenceError> {
        Err(PersistenceError::Backend("read-only volume".to_string()))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const SWITCH: &str = "urn:Belkin:device:controllee:1";
const DIMMER: &str = "urn:Belkin:device:dimmer:1";

fn raw(mac: &str, name: &str, device_type: &str, host: &str, state: &str) -> RawDeviceInfo {
    RawDeviceInfo {
        device_type: device_type.to_string(),
        mac_address: Some(mac.to_string()),
        friendly_name: Some(name.to_string()),
        binary_state: Some(state.to_string()),
        brightness: None,
        host: host.to_string(),
        port: 49153,
    }
}

fn raw_dimmer(mac: &str, name: &str, host: &str, state: &str, level: &str) -> RawDeviceInfo {
    RawDeviceInfo {
        brightness: Some(level.to_string()),
        ..raw(mac, name, DIMMER, host, state)
    }
}

fn cached_lamp() -> DeviceRecord {
    DeviceRecord::new("A", "Lamp", DeviceKind::Switch, "10.0.0.1", 49153)
        .with_binary_state(BinaryState::Off)
}

fn cache_of(devices: &[DeviceRecord]) -> MemoryStore {
    MemoryStore::with_value("devices", serde_json::to_string(devices).unwrap())
}

/// Lamp (switch) at 10.0.0.1 and Fan (dimmer) at 10.0.0.2, both answering
/// discovery well within the deadline.
fn home() -> Network {
    let network = Network::default();
    network.answer(
        Duration::from_millis(200),
        raw("A", "Lamp", SWITCH, "10.0.0.1", "1"),
    );
    network.answer(
        Duration::from_millis(400),
        raw_dimmer("B", "Fan", "10.0.0.2", "0", "40"),
    );
    network.set_state("10.0.0.1", BinaryState::On);
    network.set_state("10.0.0.2", BinaryState::Off);
    network.set_level("10.0.0.2", 40);
    network
}

fn service<S: BlobStore>(network: &Arc<Network>, store: S) -> DeviceService<Scripted, S> {
    DeviceService::new(Scripted(Arc::clone(network)), store)
}

fn names(devices: &[DeviceRecord]) -> Vec<&str> {
    devices.iter().map(|d| d.friendly_name.as_str()).collect()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

// ============================================================================
// Loading and discovery
// ============================================================================

mod loading {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cached_list_replaced_by_discovery() {
        let network = Arc::new(home());
        let service = service(&network, cache_of(&[cached_lamp()]));
        let mut events = service.subscribe();

        let report = service.load().await.unwrap();

        assert!(!report.is_joined());
        assert!(report.cache_warning().is_none());
        assert_eq!(names(report.devices()), vec!["Fan", "Lamp"]);
        assert_eq!(service.device("A").unwrap().binary_state, Some(BinaryState::On));
        assert_eq!(
            service.device("B").unwrap().brightness,
            Some(Brightness::new(40).unwrap())
        );

        // Cache now holds the discovered list
        assert_eq!(service.cache().load().await, service.devices());

        let events = drain(&mut events);
        assert_eq!(
            events,
            vec![
                DeviceEvent::LoadingChanged { loading: true },
                DeviceEvent::replaced(vec![cached_lamp()], ListSource::Cache),
                DeviceEvent::replaced(service.devices(), ListSource::Discovery),
                DeviceEvent::LoadingChanged { loading: false },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn loading_flag_up_while_cache_is_read() {
        let network = Arc::new(home());
        let store = SlowStore(cache_of(&[cached_lamp()]), Duration::from_secs(1));
        let service = Arc::new(service(&network, store));

        let load = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.load().await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(service.is_loading());
        assert!(service.devices().is_empty());
        assert_eq!(network.broadcasts.load(Ordering::SeqCst), 0);

        load.await.unwrap().unwrap();
        assert!(!service.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_cache_loads_empty_then_discovers() {
        let network = Arc::new(home());
        let service = service(&network, MemoryStore::with_value("devices", "{\"devices\": [1, 2"));

        assert!(service.load_cached().await.is_empty());
        assert!(service.devices().is_empty());

        let report = service.refresh().await.unwrap();
        assert_eq!(report.devices().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_list_visible_during_sweep() {
        let network = Arc::new(home());
        let service = Arc::new(service(&network, cache_of(&[cached_lamp()])));
        service.load_cached().await;

        let sweep = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        });

        // Both responses are in, the deadline is not
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(service.is_loading());
        assert_eq!(service.devices(), vec![cached_lamp()]);

        sweep.await.unwrap().unwrap();
        assert!(!service.is_loading());
        assert_eq!(names(&service.devices()), vec!["Fan", "Lamp"]);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_flag_observed_through_watch() {
        let network = Arc::new(home());
        let service = Arc::new(service(&network, MemoryStore::new()));
        let mut loading = service.watch_loading();
        assert!(!*loading.borrow());

        let sweep = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        });

        loading.changed().await.unwrap();
        assert!(*loading.borrow_and_update());
        loading.changed().await.unwrap();
        assert!(!*loading.borrow_and_update());

        sweep.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn late_responses_are_dropped() {
        let network = Arc::new(home());
        network.answer(
            Duration::from_secs(3),
            raw("C", "Porch", SWITCH, "10.0.0.3", "0"),
        );
        let service = service(&network, MemoryStore::new());

        let report = service.refresh().await.unwrap();
        assert!(report.devices().iter().all(|d| d.identifier() != "C"));
    }

    #[tokio::test(start_paused = true)]
    async fn exposed_list_is_sorted_unique_and_admitted() {
        let network = Network::default();
        for (at, info) in [
            (10, raw("C", "lamp", SWITCH, "10.0.0.3", "0")),
            (20, raw("A", "Zebra", SWITCH, "10.0.0.1", "0")),
            (30, raw("X", "Meter", "urn:Belkin:device:insight:1", "10.0.0.9", "1")),
            (40, raw("B", "Apple", "urn:Belkin:device:lightswitch:1", "10.0.0.2", "1")),
            (50, raw("A", "Zebra", SWITCH, "10.0.0.7", "1")),
        ] {
            network.answer(Duration::from_millis(at), info);
        }
        let network = Arc::new(network);
        let service = service(&network, MemoryStore::new());

        let devices = service.refresh().await.unwrap().into_devices();

        assert_eq!(names(&devices), vec!["Apple", "Zebra", "lamp"]);
        let ids: HashSet<_> = devices.iter().map(DeviceRecord::identifier).collect();
        assert_eq!(ids.len(), devices.len());
        assert!(devices.iter().all(|d| DeviceKind::ALL.contains(&d.kind)));
        // Last response for A wins
        assert_eq!(service.device("A").unwrap().host, "10.0.0.7");
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_devices_are_removed() {
        let network = Arc::new(Network::default());
        network.answer(Duration::from_millis(100), raw("B", "Fan", SWITCH, "10.0.0.2", "0"));
        let service = service(&network, cache_of(&[cached_lamp()]));

        service.load().await.unwrap();
        assert_eq!(names(&service.devices()), vec!["Fan"]);
    }
}

// ============================================================================
// Single-flight sweeps
// ============================================================================

mod single_flight {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_refresh_joins_in_flight_sweep() {
        let network = Arc::new(home());
        let service = service(&network, MemoryStore::new());

        let (first, second) = tokio::join!(service.refresh(), service.refresh());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(network.broadcasts.load(Ordering::SeqCst), 1);
        assert!(!first.is_joined());
        assert!(second.is_joined());
        assert_eq!(first.devices(), second.devices());
    }

    #[tokio::test(start_paused = true)]
    async fn joined_sweep_shares_its_failure() {
        let network = Arc::new(Network {
            broadcast_fails: true,
            broadcast_delay: Duration::from_millis(500),
            ..home()
        });
        let service = service(&network, cache_of(&[cached_lamp()]));
        service.load_cached().await;

        let (first, second) = tokio::join!(service.refresh(), service.refresh());

        assert_eq!(network.broadcasts.load(Ordering::SeqCst), 1);
        let (Err(first), Err(second)) = (first, second) else {
            panic!("both callers should see the failure");
        };
        assert!(matches!(first, Error::DiscoveryUnavailable(_)));
        assert!(matches!(
            second,
            Error::DiscoveryUnavailable(ProtocolError::Joined(_))
        ));
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(service.devices(), vec![cached_lamp()]);
        assert!(!service.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_refreshes_each_broadcast() {
        let network = Arc::new(home());
        let service = service(&network, MemoryStore::new());

        service.refresh().await.unwrap();
        service.refresh().await.unwrap();
        assert_eq!(network.broadcasts.load(Ordering::SeqCst), 2);
    }
}

// ============================================================================
// Failures during a sweep
// ============================================================================

mod sweep_failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn discovery_unavailable_keeps_cached_list() {
        let network = Arc::new(Network {
            broadcast_fails: true,
            ..home()
        });
        let service = service(&network, cache_of(&[cached_lamp()]));
        let mut events = service.subscribe();

        let result = service.load().await;

        assert!(matches!(result, Err(Error::DiscoveryUnavailable(_))));
        assert_eq!(service.devices(), vec![cached_lamp()]);
        assert!(!service.is_loading());
        assert!(drain(&mut events).iter().any(DeviceEvent::is_failure));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_write_failure_is_a_warning() {
        let network = Arc::new(home());
        let service = service(&network, ReadOnlyStore::default());

        let report = service.refresh().await.unwrap();

        assert!(matches!(
            report.cache_warning(),
            Some(PersistenceError::Backend(_))
        ));
        assert_eq!(names(&service.devices()), vec!["Fan", "Lamp"]);
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    async fn discovered(network: &Arc<Network>) -> DeviceService<Scripted, MemoryStore> {
        let service = service(network, MemoryStore::new());
        service.refresh().await.unwrap();
        network.control_calls.store(0, Ordering::SeqCst);
        service
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_device_rejected() {
        let network = Arc::new(home());
        let service = discovered(&network).await;
        let before = service.devices();

        let result = service.toggle("Z").await;

        assert!(matches!(
            result,
            Err(Error::InvalidCommand(InvalidCommand::UnknownDevice(ref id))) if id == "Z"
        ));
        assert_eq!(service.devices(), before);
        assert_eq!(network.control_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn brightness_on_switch_rejected_without_io() {
        let network = Arc::new(home());
        let service = discovered(&network).await;

        let result = service.step_brightness("A", Direction::Up).await;

        assert!(matches!(
            result,
            Err(Error::InvalidCommand(InvalidCommand::UnsupportedKind {
                kind: DeviceKind::Switch,
                ..
            }))
        ));
        assert_eq!(network.control_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_twice_restores_state() {
        let network = Arc::new(home());
        let service = discovered(&network).await;
        let mut events = service.subscribe();

        let once = service.toggle("A").await.unwrap();
        assert_eq!(once.binary_state, Some(BinaryState::Off));
        assert_eq!(service.device("A").unwrap(), once);
        assert_eq!(network.state("10.0.0.1"), Some(BinaryState::Off));

        let twice = service.toggle("A").await.unwrap();
        assert_eq!(twice.binary_state, Some(BinaryState::On));
        assert_eq!(network.state("10.0.0.1"), Some(BinaryState::On));

        assert_eq!(
            drain(&mut events),
            vec![DeviceEvent::updated(once), DeviceEvent::updated(twice)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_uses_live_state_not_cached() {
        let network = Arc::new(home());
        let service = discovered(&network).await;
        // Someone switched the lamp off by hand
        network.set_state("10.0.0.1", BinaryState::Off);

        let lamp = service.toggle("A").await.unwrap();
        assert!(lamp.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_only_patches_target() {
        let network = Arc::new(home());
        let service = discovered(&network).await;
        let fan_before = service.device("B").unwrap();

        let lamp = service.toggle("A").await.unwrap();

        assert_eq!(service.device("B").unwrap(), fan_before);
        assert_eq!(lamp.friendly_name, "Lamp");
        assert_eq!(lamp.host, "10.0.0.1");
    }

    #[tokio::test(start_paused = true)]
    async fn brightness_steps_clamp() {
        let network = Arc::new(home());
        let service = discovered(&network).await;

        network.set_level("10.0.0.2", 95);
        let fan = service.step_brightness("B", Direction::Up).await.unwrap();
        assert_eq!(fan.brightness, Some(Brightness::MAX));

        network.set_level("10.0.0.2", 5);
        let fan = service.step_brightness("B", Direction::Down).await.unwrap();
        assert_eq!(fan.brightness, Some(Brightness::MIN));
    }

    #[tokio::test(start_paused = true)]
    async fn read_failure_leaves_list_untouched() {
        let network = Arc::new(home());
        let service = discovered(&network).await;
        network.states.lock().remove("10.0.0.1");
        let before = service.devices();

        let result = service.toggle("A").await;

        match result {
            Err(Error::DeviceCommand {
                identifier, phase, ..
            }) => {
                assert_eq!(identifier, "A");
                assert_eq!(phase, CommandPhase::Read);
            }
            other => panic!("expected a read failure, got {other:?}"),
        }
        assert_eq!(service.devices(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_leaves_list_untouched() {
        let network = Arc::new(Network {
            reject_writes: true,
            ..home()
        });
        let service = discovered(&network).await;
        let before = service.devices();
        let mut events = service.subscribe();

        let result = service.toggle("A").await;

        match result {
            Err(Error::DeviceCommand {
                identifier,
                phase,
                source,
            }) => {
                assert_eq!(identifier, "A");
                assert_eq!(phase, CommandPhase::Write);
                assert!(matches!(source, ProtocolError::Fault(_)));
            }
            other => panic!("expected a write failure, got {other:?}"),
        }
        assert_eq!(service.devices(), before);
        assert!(drain(&mut events).is_empty());
        assert_eq!(network.state("10.0.0.1"), Some(BinaryState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_command_rejected_once_device_is_gone() {
        let network = Arc::new(Network {
            write_delay: Duration::from_secs(3),
            ..home()
        });
        let service = discovered(&network).await;
        // The lamp stops answering discovery
        network.responses.lock().retain(|(_, info)| info.host != "10.0.0.1");

        let (first, second, sweep) = tokio::join!(
            service.toggle("A"),
            service.toggle("A"),
            service.refresh()
        );

        sweep.unwrap();
        // Already past the lock when the sweep removed the lamp
        assert_eq!(first.unwrap().binary_state, Some(BinaryState::Off));
        assert!(matches!(
            second,
            Err(Error::InvalidCommand(InvalidCommand::UnknownDevice(ref id))) if id == "A"
        ));
        assert!(service.device("A").is_none());
        // One read and one write, both from the first toggle
        assert_eq!(network.control_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_device_commands_are_serialized() {
        let network = Arc::new(Network {
            write_delay: Duration::from_millis(100),
            ..home()
        });
        let service = discovered(&network).await;

        let (first, second) = tokio::join!(service.toggle("A"), service.toggle("A"));

        // Each toggle saw the other's write: on -> off -> on
        let states: HashSet<_> = [first.unwrap(), second.unwrap()]
            .into_iter()
            .map(|d| d.binary_state)
            .collect();
        assert_eq!(states.len(), 2);
        assert_eq!(network.state("10.0.0.1"), Some(BinaryState::On));
        assert_eq!(service.device("A").unwrap().binary_state, Some(BinaryState::On));
    }

    #[tokio::test(start_paused = true)]
    async fn different_devices_run_concurrently() {
        let network = Arc::new(Network {
            write_delay: Duration::from_millis(100),
            ..home()
        });
        let service = discovered(&network).await;

        let started = Instant::now();
        let (lamp, fan) = tokio::join!(
            service.toggle("A"),
            service.step_brightness("B", Direction::Up)
        );
        lamp.unwrap();
        fan.unwrap();

        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_discovery_timeout() {
        let network = Arc::new(home());
        let config = ServiceConfig::new().with_discovery_timeout(Duration::from_millis(300));
        let service = DeviceService::with_config(
            Scripted(Arc::clone(&network)),
            MemoryStore::new(),
            config,
        );

        // Fan answers at 400 ms
        let report = service.refresh().await.unwrap();
        assert_eq!(names(report.devices()), vec!["Lamp"]);
    }
}
