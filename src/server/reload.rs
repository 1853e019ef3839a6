// src/server/reload.rs

//! Live-reload notifications pushed to connected browsers.

use std::fmt;

use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the broadcast buffer; slow clients skip older events.
const CHANNEL_CAPACITY: usize = 16;

/// Path of the server-sent events stream.
pub const EVENTS_PATH: &str = "/__sitepipe/events";
/// Path of the client script injected into HTML pages.
pub const SCRIPT_PATH: &str = "/__sitepipe/reload.js";

/// Client side of the reload protocol.
pub const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource("/__sitepipe/events");
  source.addEventListener("reload", function () {
    window.location.reload();
  });
  source.addEventListener("css", function () {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    Array.prototype.forEach.call(links, function (link) {
      var url = new URL(link.href);
      url.searchParams.set("sitepipe", Date.now().toString());
      link.href = url.toString();
    });
  });
})();
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadEvent {
    /// Reload the whole page.
    Full,
    /// Re-fetch stylesheets without reloading.
    Css,
}

impl ReloadEvent {
    /// SSE event name.
    pub fn as_str(self) -> &'static str {
        match self {
            ReloadEvent::Full => "reload",
            ReloadEvent::Css => "css",
        }
    }
}

impl fmt::Display for ReloadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cheap, cloneable publisher of [`ReloadEvent`]s.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHandle {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Publish `event`; returns how many subscribers received it.
    pub fn publish(&self, event: ReloadEvent) -> usize {
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(event = %event, delivered, "published reload event");
        delivered
    }

    pub fn reload(&self) -> usize {
        self.publish(ReloadEvent::Full)
    }

    pub fn inject_css(&self) -> usize {
        self.publish(ReloadEvent::Css)
    }
}

/// Insert the client script tag before the closing `</body>` (or at the end
/// when there is none).
pub fn inject_reload_script(html: &str) -> String {
    let tag = format!("<script src=\"{SCRIPT_PATH}\"></script>");
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], tag, &html[idx..]),
        None => format!("{html}{tag}"),
    }
}
