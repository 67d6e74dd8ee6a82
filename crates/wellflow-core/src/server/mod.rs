//! Minimal HTTP/1.0 stats server
//!
//! One connection is handled at a time: read the request head, route it,
//! write a `200 OK` with the body and close. Every route answers 200, and
//! unknown paths get the stats page.

pub mod page;
pub mod request;

use alloc::borrow::Cow;
use alloc::format;
use core::fmt::Debug;

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};
use log::{info, warn};
use thiserror_no_std::Error;

use crate::app_state::AppState;
use crate::config::ConfigError;
use crate::runtime::sleep;
use crate::sensors::TemperatureSensor;
use crate::time_base::WallClock;

use request::{CALIBRATION_PARAM, RequestHead, Route};

/// Pause before accepting again after a failed accept.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(200);

pub const HTML_CONTENT_TYPE: &str = "text/html";
pub const CSS_CONTENT_TYPE: &str = "text/css";

#[derive(Error, Debug)]
pub enum ServerError<E: Debug> {
    #[error("transport error: {0:?}")]
    Io(E),
    #[error("connection closed before end of request head")]
    ConnectionClosed,
}

/// An accepted client stream.
pub trait Connection: Read + Write {
    /// End the stream after the response and wait until it has gone out.
    ///
    /// A connection dropped without closing may be reset instead.
    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

impl<T: Connection + ?Sized> Connection for &mut T {
    async fn close(&mut self) -> Result<(), T::Error> {
        (**self).close().await
    }
}

/// Source of client connections.
pub trait Listener {
    type Connection<'a>: Connection
    where
        Self: 'a;
    type Error: Debug;

    /// Wait for the next client.
    fn accept(&mut self) -> impl Future<Output = Result<Self::Connection<'_>, Self::Error>>;
}

/// A routed response, ready to be written.
#[derive(Debug, PartialEq)]
pub struct Response {
    pub content_type: &'static str,
    pub body: Cow<'static, str>,
}

impl Response {
    fn html(body: alloc::string::String) -> Self {
        Self {
            content_type: HTML_CONTENT_TYPE,
            body: Cow::Owned(body),
        }
    }
}

/// Build the response for a request target.
pub async fn respond<C, T>(target: &str, state: &AppState<'_, C>, sensor: &mut T) -> Response
where
    C: WallClock,
    T: TemperatureSensor,
{
    match Route::classify(target) {
        Route::Stylesheet => Response {
            content_type: CSS_CONTENT_TYPE,
            body: Cow::Borrowed(page::STYLESHEET),
        },
        Route::ChangeCalibration(params) => {
            let result = match params.get(CALIBRATION_PARAM) {
                Some(raw) if !raw.is_empty() => state.set_calibration(raw),
                _ => Err(ConfigError::MissingParameter(CALIBRATION_PARAM)),
            };
            match result {
                Ok(()) => stats_page(state, sensor, None).await,
                Err(err) => {
                    warn!("Rejected calibration change: {}", err);
                    let message = format!("Could not update ticks per gallon: {}", err);
                    stats_page(state, sensor, Some(&message)).await
                }
            }
        }
        Route::Stats => stats_page(state, sensor, None).await,
    }
}

async fn stats_page<C: WallClock, T: TemperatureSensor>(
    state: &AppState<'_, C>,
    sensor: &mut T,
    error: Option<&str>,
) -> Response {
    let temperature = match sensor.read().await {
        Ok(celsius) => Some(celsius),
        Err(err) => {
            warn!("Temperature read failed: {:?}", err);
            None
        }
    };
    Response::html(page::render_stats(&state.snapshot(temperature), error))
}

/// Serve a single request on `conn`.
pub async fn handle_connection<R, C, T>(
    conn: &mut R,
    state: &AppState<'_, C>,
    sensor: &mut T,
) -> Result<(), ServerError<R::Error>>
where
    R: Read + Write,
    C: WallClock,
    T: TemperatureSensor,
{
    let head = RequestHead::read(conn).await?;
    info!("Request: {}", head.line());

    let response = respond(head.target(), state, sensor).await;

    let status = format!(
        "HTTP/1.0 200 OK\r\nContent-type: {}\r\n\r\n",
        response.content_type
    );
    conn.write_all(status.as_bytes())
        .await
        .map_err(ServerError::Io)?;
    conn.write_all(response.body.as_bytes())
        .await
        .map_err(ServerError::Io)?;
    conn.flush().await.map_err(ServerError::Io)?;
    Ok(())
}

/// Accept and serve clients one after another. Never returns.
///
/// A served connection is closed gracefully. A failed one is logged and
/// dropped; the loop carries on.
pub async fn serve_loop<N, C, T, D>(
    listener: &mut N,
    state: &AppState<'_, C>,
    sensor: &mut T,
    mut delay: D,
) where
    N: Listener,
    C: WallClock,
    T: TemperatureSensor,
    D: DelayNs,
{
    loop {
        let mut conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!("Accept failed: {:?}", err);
                sleep(&mut delay, ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };

        info!("Client connected");
        match handle_connection(&mut conn, state, sensor).await {
            Ok(()) => {
                if let Err(err) = conn.close().await {
                    warn!("Close failed: {:?}", err);
                }
            }
            Err(err) => warn!("Connection error: {}", err),
        }
        drop(conn);
        info!("Client disconnected");
    }
}
