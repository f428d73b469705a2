//! Static control page
//!
//! `build.rs` embeds `html/index.html` (or the file named by
//! `LEDCTL_INDEX_HTML`) when it exists. Without it the device still serves a
//! short page asking for one.

use log::*;

#[cfg(bundled_page)]
const BUNDLED: Option<&[u8]> = Some(include_bytes!(concat!(env!("OUT_DIR"), "/index.html")));

#[cfg(not(bundled_page))]
const BUNDLED: Option<&[u8]> = None;

const FALLBACK_PAGE: &[u8] = br#"<!doctype html>
<html><head><meta charset="utf-8"><title>index.html no encontrado</title></head>
<body><h3>Sube <code>index.html</code> a la raiz del dispositivo.</h3></body></html>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Bundled,
    Fallback,
}

/// Page bytes served for every non-API path, loaded once at startup
#[derive(Debug, Clone, Copy)]
pub struct StaticPage {
    bytes: &'static [u8],
    source: PageSource,
}

impl StaticPage {
    /// Page built into this firmware image
    pub fn load() -> Self {
        Self::from_bundle(BUNDLED)
    }

    /// Use `bundle` if there is one, the fallback page otherwise
    pub fn from_bundle(bundle: Option<&'static [u8]>) -> Self {
        match bundle {
            Some(bytes) => {
                info!("Static page: bundled index.html ({} bytes)", bytes.len());
                Self {
                    bytes,
                    source: PageSource::Bundled,
                }
            }
            None => {
                warn!("Static page: no index.html bundled, serving fallback");
                Self {
                    bytes: FALLBACK_PAGE,
                    source: PageSource::Fallback,
                }
            }
        }
    }

    pub fn bytes(&self) -> &'static [u8] {
        self.bytes
    }

    pub fn source(&self) -> PageSource {
        self.source
    }
}
