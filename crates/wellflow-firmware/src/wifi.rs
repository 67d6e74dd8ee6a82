//! Wi-Fi station link over esp-radio and embassy-net

use alloc::string::String;
use core::net::Ipv4Addr;

use embassy_net::{Runner, Stack};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::warn;
use wellflow_core::config::NetworkConfig;
use wellflow_core::network::{Link, LinkError, LinkStatus};

/// Drives the embassy-net stack. Must be spawned before any link activity.
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Association {
    Idle,
    Associated,
    Failed,
}

pub struct WifiLink<'a> {
    controller: WifiController<'a>,
    stack: Stack<'a>,
    association: Association,
}

impl<'a> WifiLink<'a> {
    pub fn new(controller: WifiController<'a>, stack: Stack<'a>) -> Self {
        Self {
            controller,
            stack,
            association: Association::Idle,
        }
    }
}

impl Link for WifiLink<'_> {
    async fn begin(&mut self, config: &NetworkConfig<'_>) -> Result<(), LinkError> {
        let mode = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(String::from(config.ssid))
                .with_password(String::from(config.password)),
        );
        self.controller.set_config(&mode).map_err(|err| {
            warn!("Wi-Fi set_config error: {:?}", err);
            LinkError::Driver
        })?;

        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await.map_err(|err| {
                warn!("Wi-Fi start_async error: {:?}", err);
                LinkError::Driver
            })?;
        }

        // Association failures surface through `status`
        self.association = match self.controller.connect_async().await {
            Ok(()) => Association::Associated,
            Err(err) => {
                warn!("Wi-Fi connect_async error: {:?}", err);
                Association::Failed
            }
        };
        Ok(())
    }

    fn status(&mut self) -> LinkStatus {
        match self.association {
            Association::Idle => LinkStatus::Idle,
            Association::Failed => LinkStatus::Failed,
            Association::Associated if self.stack.config_v4().is_some() => LinkStatus::GotIp,
            Association::Associated if matches!(self.controller.is_connected(), Ok(true)) => {
                LinkStatus::Associated
            }
            Association::Associated => LinkStatus::Connecting,
        }
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.controller.disconnect_async().await {
            warn!("Wi-Fi disconnect_async error: {:?}", err);
        }
        self.association = Association::Idle;
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }
}
