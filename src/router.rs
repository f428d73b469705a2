//! Request dispatch
//!
//! Maps a parsed request to one of the fixed actions and owns the LED state.
//!
//! | Path           | POST                              | other methods      |
//! |----------------|-----------------------------------|--------------------|
//! | `/favicon.ico` | 204                               | 204                |
//! | `/on`          | LED on, `{"ok":true,"on":true}`   | LED on, 302 → `/`  |
//! | `/off`         | LED off, `{"ok":true,"on":false}` | LED off, 302 → `/` |
//! | `/state`       | `{"on":<bool>}`                   | `{"on":<bool>}`    |
//! | anything else  | static page                       | static page        |
//!
//! GET on `/on` and `/off` switches the LED too, so a plain link or bookmark
//! works from a browser.

use core::fmt;

use embedded_hal::digital::{Error as _, ErrorKind, OutputPin};
use log::*;

use crate::page::StaticPage;
use crate::request::ParsedRequest;
use crate::response::{Body, CONTENT_TYPE_HTML, Header, ResponseSpec, StateReply, Status, ToggleReply};

/// Where a path leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Favicon,
    On,
    Off,
    State,
    Page,
}

impl Route {
    pub fn resolve(path: &str) -> Self {
        match path {
            "/favicon.ico" => Route::Favicon,
            "/on" => Route::On,
            "/off" => Route::Off,
            "/state" => Route::State,
            _ => Route::Page,
        }
    }
}

/// Logical value of the LED output
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The output pin refused the new level
    Output(ErrorKind),
    /// A reply did not fit its buffer
    Format,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Output(kind) => write!(f, "output pin error: {:?}", kind),
            DispatchError::Format => write!(f, "reply formatting failed"),
        }
    }
}

impl From<fmt::Error> for DispatchError {
    fn from(_: fmt::Error) -> Self {
        DispatchError::Format
    }
}

pub struct Router<P> {
    led: P,
    state: DeviceState,
    page: StaticPage,
}

impl<P: OutputPin> Router<P> {
    /// Create a router driving `led`
    ///
    /// The state starts off; the pin is expected to be configured low.
    pub fn new(led: P, page: StaticPage) -> Self {
        Self {
            led,
            state: DeviceState::default(),
            page,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Produce the response for `req`, applying its side effect first
    pub fn dispatch(&mut self, req: &ParsedRequest) -> Result<ResponseSpec, DispatchError> {
        match Route::resolve(&req.path) {
            Route::Favicon => Ok(ResponseSpec::no_content()),
            Route::On => self.toggle(true, req.is_post()),
            Route::Off => self.toggle(false, req.is_post()),
            Route::State => {
                Ok(ResponseSpec::json(&StateReply { on: self.state.on })?.with_header(Header::no_cache()))
            }
            Route::Page => Ok(ResponseSpec::new(
                Status::Ok,
                CONTENT_TYPE_HTML,
                Body::Static(self.page.bytes()),
            )
            .with_header(Header::no_cache())),
        }
    }

    fn toggle(&mut self, on: bool, json: bool) -> Result<ResponseSpec, DispatchError> {
        self.set_output(on)?;
        if json {
            Ok(ResponseSpec::json(&ToggleReply { on })?)
        } else {
            Ok(ResponseSpec::redirect("/"))
        }
    }

    fn set_output(&mut self, on: bool) -> Result<(), DispatchError> {
        let result = if on { self.led.set_high() } else { self.led.set_low() };
        result.map_err(|e| DispatchError::Output(e.kind()))?;

        if self.state.on != on {
            info!("LED {}", if on { "on" } else { "off" });
        }
        self.state.on = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::parse_request;

    /// Records the last level; fails when `broken`
    struct Pin {
        high: bool,
        broken: bool,
    }

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = ErrorKind;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.broken {
                return Err(ErrorKind::Other);
            }
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            if self.broken {
                return Err(ErrorKind::Other);
            }
            self.high = true;
            Ok(())
        }
    }

    const PAGE: &[u8] = b"<html>ctl</html>";

    fn router() -> Router<Pin> {
        Router::new(
            Pin {
                high: false,
                broken: false,
            },
            StaticPage::from_bundle(Some(PAGE)),
        )
    }

    fn request(raw: &str) -> ParsedRequest {
        parse_request(raw.as_bytes()).expect("request")
    }

    #[test]
    fn test_route_resolution() {
        assert_eq!(Route::resolve("/favicon.ico"), Route::Favicon);
        assert_eq!(Route::resolve("/on"), Route::On);
        assert_eq!(Route::resolve("/off"), Route::Off);
        assert_eq!(Route::resolve("/state"), Route::State);
        assert_eq!(Route::resolve("/"), Route::Page);
        assert_eq!(Route::resolve("/on/"), Route::Page);
        assert_eq!(Route::resolve("/ON"), Route::Page);
    }

    #[test]
    fn test_post_on_sets_pin_and_replies_json() {
        let mut r = router();
        let resp = r.dispatch(&request("POST /on HTTP/1.1\r\n\r\n")).expect("dispatch");
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.body.as_bytes(), br#"{"ok":true,"on":true}"#);
        assert!(resp.headers.is_empty());
        assert!(r.led.high);
        assert!(r.state().on);
    }

    #[test]
    fn test_get_off_redirects_and_still_switches() {
        let mut r = router();
        r.dispatch(&request("POST /on HTTP/1.1\r\n\r\n")).expect("dispatch");
        let resp = r.dispatch(&request("GET /off HTTP/1.1\r\n\r\n")).expect("dispatch");
        assert_eq!(resp.status, Status::Found);
        assert_eq!(resp.headers, [Header::new("Location", "/")]);
        assert!(!r.led.high);
        assert!(!r.state().on);
    }

    #[test]
    fn test_other_methods_redirect_like_get() {
        let mut r = router();
        let resp = r.dispatch(&request("PUT /on HTTP/1.1\r\n\r\n")).expect("dispatch");
        assert_eq!(resp.status, Status::Found);
        assert!(r.state().on);
    }

    #[test]
    fn test_state_reflects_last_toggle() {
        let mut r = router();
        let resp = r.dispatch(&request("GET /state HTTP/1.1\r\n\r\n")).expect("dispatch");
        assert_eq!(resp.body.as_bytes(), br#"{"on":false}"#);
        assert_eq!(resp.headers, [Header::no_cache()]);

        r.dispatch(&request("POST /on HTTP/1.1\r\n\r\n")).expect("dispatch");
        let resp = r.dispatch(&request("POST /state HTTP/1.1\r\n\r\n")).expect("dispatch");
        assert_eq!(resp.body.as_bytes(), br#"{"on":true}"#);
    }

    #[test]
    fn test_query_does_not_change_route() {
        let mut r = router();
        let resp = r
            .dispatch(&request("POST /on?value=0 HTTP/1.1\r\n\r\n"))
            .expect("dispatch");
        assert_eq!(resp.body.as_bytes(), br#"{"ok":true,"on":true}"#);
    }

    #[test]
    fn test_favicon_for_any_method() {
        let mut r = router();
        for raw in ["GET /favicon.ico HTTP/1.1\r\n\r\n", "POST /favicon.ico HTTP/1.1\r\n\r\n"] {
            let resp = r.dispatch(&request(raw)).expect("dispatch");
            assert_eq!(resp.status, Status::NoContent);
            assert!(resp.body.as_bytes().is_empty());
        }
        assert!(!r.state().on);
    }

    #[test]
    fn test_unknown_path_serves_page() {
        let mut r = router();
        let resp = r.dispatch(&request("DELETE /nope HTTP/1.1\r\n\r\n")).expect("dispatch");
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.content_type, CONTENT_TYPE_HTML);
        assert_eq!(resp.body.as_bytes(), PAGE);
        assert_eq!(resp.headers, [Header::no_cache()]);
    }

    #[test]
    fn test_repeated_on_converges() {
        let mut r = router();
        for _ in 0..5 {
            let resp = r.dispatch(&request("POST /on HTTP/1.1\r\n\r\n")).expect("dispatch");
            assert_eq!(resp.body.as_bytes(), br#"{"ok":true,"on":true}"#);
        }
        assert!(r.state().on);
    }

    #[test]
    fn test_pin_failure_keeps_state() {
        let mut r = router();
        r.led.broken = true;
        let err = r.dispatch(&request("POST /on HTTP/1.1\r\n\r\n")).unwrap_err();
        assert_eq!(err, DispatchError::Output(ErrorKind::Other));
        assert!(!r.state().on);
    }
}
