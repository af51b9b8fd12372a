//! Capability traits the command executor and the answer path depend on.
//!
//! Each trait covers one slice of the outside world: host telemetry,
//! desktop applications, a scoped file area, and weather lookup. Production
//! implementations live in `telemetry`, `desktop`, and `weather`; the fakes
//! here record their calls so tests can assert what the engine asked for.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Point-in-time host utilization, all in percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

/// Read-only view of host resource usage.
#[async_trait]
pub trait SystemTelemetry: Send + Sync {
    async fn query(&self) -> anyhow::Result<TelemetrySnapshot>;
}

/// Launch and close desktop applications by friendly name.
#[async_trait]
pub trait ApplicationControl: Send + Sync {
    async fn launch(&self, name: &str) -> anyhow::Result<String>;
    async fn close(&self, name: &str) -> anyhow::Result<String>;
}

/// File operations inside a sandboxed root directory.
#[async_trait]
pub trait FileOps: Send + Sync {
    async fn create(&self, path: &str, contents: &str) -> anyhow::Result<String>;
    async fn delete(&self, path: &str) -> anyhow::Result<String>;
    async fn read(&self, path: &str) -> anyhow::Result<String>;
}

/// Current conditions for one city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature_c: f64,
    pub description: String,
    pub humidity: u8,
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn get(&self, city: &str) -> anyhow::Result<WeatherReport>;
}

// ==== Test fakes ====

/// Telemetry fake returning fixed readings, optionally failing.
pub struct FakeTelemetry {
    snapshot: TelemetrySnapshot,
    fail: bool,
    calls: Arc<Mutex<u64>>,
}

impl FakeTelemetry {
    pub fn new() -> Self {
        Self {
            snapshot: TelemetrySnapshot {
                cpu_percent: 12.5,
                memory_percent: 48.2,
                disk_percent: 63.0,
            },
            fail: false,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_snapshot(snapshot: TelemetrySnapshot) -> Self {
        let mut fake = Self::new();
        fake.snapshot = snapshot;
        fake
    }

    pub fn failing() -> Self {
        let mut fake = Self::new();
        fake.fail = true;
        fake
    }

    pub fn call_count(&self) -> u64 {
        *self.calls.lock().unwrap()
    }
}

impl Default for FakeTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemTelemetry for FakeTelemetry {
    async fn query(&self) -> anyhow::Result<TelemetrySnapshot> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            anyhow::bail!("telemetry unavailable");
        }
        Ok(self.snapshot)
    }
}

/// Application control fake recording `launch:<name>` / `close:<name>`.
#[derive(Default)]
pub struct FakeAppControl {
    calls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl FakeAppControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ApplicationControl for FakeAppControl {
    async fn launch(&self, name: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(format!("launch:{name}"));
        if self.fail {
            anyhow::bail!("could not launch {name}");
        }
        Ok(format!("Launched {name}"))
    }

    async fn close(&self, name: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(format!("close:{name}"));
        if self.fail {
            anyhow::bail!("could not close {name}");
        }
        Ok(format!("Closed {name}"))
    }
}

/// File operations fake backed by an in-memory map.
#[derive(Default)]
pub struct FakeFileOps {
    files: Arc<Mutex<std::collections::HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeFileOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl FileOps for FakeFileOps {
    async fn create(&self, path: &str, contents: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(format!("create:{path}"));
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), contents.to_string());
        Ok(format!("Created {path}"))
    }

    async fn delete(&self, path: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(format!("delete:{path}"));
        if self.files.lock().unwrap().remove(path).is_none() {
            anyhow::bail!("no such file: {path}");
        }
        Ok(format!("Deleted {path}"))
    }

    async fn read(&self, path: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(format!("read:{path}"));
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file: {path}"))
    }
}

/// Weather fake returning a fixed report for any city.
pub struct FakeWeather {
    fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeWeather {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        let mut fake = Self::new();
        fake.fail = true;
        fake
    }

    pub fn queried_cities(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeWeather {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherLookup for FakeWeather {
    async fn get(&self, city: &str) -> anyhow::Result<WeatherReport> {
        self.calls.lock().unwrap().push(city.to_string());
        if self.fail {
            anyhow::bail!("weather service unavailable");
        }
        Ok(WeatherReport {
            city: city.to_string(),
            temperature_c: 18.5,
            description: "scattered clouds".to_string(),
            humidity: 60,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_telemetry_counts_queries() {
        let telemetry = FakeTelemetry::new();
        telemetry.query().await.unwrap();
        telemetry.query().await.unwrap();
        assert_eq!(telemetry.call_count(), 2);
    }

    #[tokio::test]
    async fn fake_file_ops_round_trip() {
        let files = FakeFileOps::new();
        files.create("notes.txt", "hello").await.unwrap();
        assert_eq!(files.read("notes.txt").await.unwrap(), "hello");
        files.delete("notes.txt").await.unwrap();
        assert!(files.read("notes.txt").await.is_err());
        assert_eq!(
            files.calls(),
            vec!["create:notes.txt", "read:notes.txt", "delete:notes.txt", "read:notes.txt"]
        );
    }

    #[tokio::test]
    async fn fake_app_control_records_verbs() {
        let apps = FakeAppControl::new();
        apps.launch("firefox").await.unwrap();
        apps.close("firefox").await.unwrap();
        assert_eq!(apps.calls(), vec!["launch:firefox", "close:firefox"]);
    }
}
