//! Fallback stack for platforms without BLE peripheral support

use iotsc_core::{Advertisement, PlatformEvent, PlatformStack, Result as PeripheralResult, Service};
use tracing::warn;

use crate::error::BleError;

// ----------------------------------------------------------------------------
// Fallback Implementation
// ----------------------------------------------------------------------------

/// Platform stack that refuses to start
pub struct UnsupportedStack {
    adapter_name: String,
}

impl UnsupportedStack {
    pub async fn connect(adapter: Option<&str>) -> Result<Self, BleError> {
        warn!(
            "BLE peripheral mode not supported on this platform (adapter {}). \
            Use Linux with BlueZ.",
            adapter.unwrap_or("default")
        );
        Err(BleError::Unsupported)
    }
}

#[async_trait::async_trait]
impl PlatformStack for UnsupportedStack {
    fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    async fn set_alias(&mut self, _alias: &str) -> PeripheralResult<()> {
        Err(BleError::Unsupported.into())
    }

    async fn register_service(&mut self, _service: &Service) -> PeripheralResult<()> {
        Err(BleError::Unsupported.into())
    }

    async fn start_advertising(&mut self, _advertisement: &Advertisement) -> PeripheralResult<()> {
        Err(BleError::Unsupported.into())
    }

    async fn stop_advertising(&mut self) -> PeripheralResult<()> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<PlatformEvent> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_is_refused() {
        assert!(matches!(
            UnsupportedStack::connect(Some("hci0")).await,
            Err(BleError::Unsupported)
        ));
    }
}
