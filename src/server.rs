//! Sequential HTTP serve loop
//!
//! One connection at a time: accept, read, dispatch, write, close. Whatever
//! happens inside a connection ends with that connection being closed; the
//! loop itself only ever logs and moves on.

use core::fmt::Debug;

use embedded_hal::digital::OutputPin;
use embedded_io_async::{Read, Write};
use log::*;

use crate::request::read_request;
use crate::response::{ResponseSpec, Status, WriteError, write_response};
use crate::router::{DeviceState, Router};

/// An accepted stream that can be shut down gracefully
#[allow(async_fn_in_trait)]
pub trait Connection: Read + Write {
    /// Flush pending data and close the stream
    async fn close(&mut self);
}

/// Source of accepted connections
#[allow(async_fn_in_trait)]
pub trait Listener {
    type Error: Debug;
    type Conn<'a>: Connection
    where
        Self: 'a;

    async fn accept(&mut self) -> Result<Self::Conn<'_>, Self::Error>;
}

/// What became of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A routed response went out
    Served(Status),
    /// Nothing usable was received; 400 went out
    BadRequest,
    /// Handling failed; a 500 was attempted and `delivered` says if it went out
    Failed { delivered: bool },
    /// The peer went away while we were writing
    WriteFailed(WriteError),
}

pub struct Server<P> {
    router: Router<P>,
}

impl<P: OutputPin> Server<P> {
    pub fn new(router: Router<P>) -> Self {
        Self { router }
    }

    pub fn state(&self) -> DeviceState {
        self.router.state()
    }

    /// Serve connections forever; never returns
    pub async fn run<L: Listener>(&mut self, listener: &mut L) {
        info!("HTTP server running");
        loop {
            if let Err(e) = self.serve_next(listener).await {
                warn!("HTTP accept error: {:?}", e);
            }
        }
    }

    /// Accept and handle a single connection
    pub async fn serve_next<L: Listener>(&mut self, listener: &mut L) -> Result<Outcome, L::Error> {
        let mut conn = listener.accept().await?;
        Ok(self.handle(&mut conn).await)
    }

    /// Answer one request on `conn`, then close it
    pub async fn handle<C: Connection>(&mut self, conn: &mut C) -> Outcome {
        let outcome = self.respond(conn).await;
        conn.close().await;

        match outcome {
            Outcome::Served(status) => debug!("HTTP {}", status),
            Outcome::BadRequest => debug!("HTTP 400, no usable request"),
            Outcome::Failed { delivered: true } => warn!("HTTP 500 sent"),
            Outcome::Failed { delivered: false } => warn!("HTTP 500 not delivered"),
            Outcome::WriteFailed(e) => warn!("HTTP write failed: {}", e),
        }
        outcome
    }

    async fn respond<C: Connection>(&mut self, conn: &mut C) -> Outcome {
        let Some(req) = read_request(conn).await else {
            return match write_response(conn, &ResponseSpec::bad_request()).await {
                Ok(()) => Outcome::BadRequest,
                Err(e) => Outcome::WriteFailed(e),
            };
        };
        debug!("HTTP {} {}", req.method, req.path);

        let resp = match self.router.dispatch(&req) {
            Ok(resp) => resp,
            Err(e) => {
                error!("HTTP {} {} failed: {}", req.method, req.path, e);
                return send_internal_error(conn).await;
            }
        };

        match write_response(conn, &resp).await {
            Ok(()) => Outcome::Served(resp.status),
            // Nothing was sent yet, so a 500 still fits on the wire
            Err(WriteError::HeadTooLarge) => {
                error!("HTTP {} {}: response head too large", req.method, req.path);
                send_internal_error(conn).await
            }
            Err(e) => Outcome::WriteFailed(e),
        }
    }
}

async fn send_internal_error<C: Write>(conn: &mut C) -> Outcome {
    match write_response(conn, &ResponseSpec::internal_error()).await {
        Ok(()) => Outcome::Failed { delivered: true },
        Err(e) => {
            debug!("HTTP 500 write error: {}", e);
            Outcome::Failed { delivered: false }
        }
    }
}
