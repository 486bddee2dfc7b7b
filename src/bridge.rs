//! Rendering bridge: owns the isolated surface and the runtime handshake.
//!
//! DESIGN
//! ======
//! The bridge decides how content loads by comparing the runtime URL's host
//! with the editor's: same-origin runtimes are navigated directly, while
//! cross-origin runtimes are fetched as text by the host and injected as an
//! isolated srcdoc-style document with a rewritten `<base>` so relative URLs
//! keep resolving against the runtime origin (direct cross-origin navigation
//! would leave the hit-testing queries blind). Readiness is a one-shot
//! handshake: callers that need the runtime before it announces itself are
//! buffered and drained, in order, exactly once. There is no timeout: an
//! unready runtime pends forever, and `destroy` drops the buffer without
//! running it.

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;

use tracing::{debug, warn};

use crate::dom::ContentDoc;
use crate::error::StageError;
use crate::event::StageEvent;
use crate::geom::Rect;
use crate::runtime::Runtime;

/// How the surface obtains its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadMode {
    /// Same-origin runtime: navigate the surface at the URL directly.
    Navigate { url: String },
    /// Cross-origin runtime: host-fetched markup is injected as a srcdoc
    /// document; `origin` is what the rewritten base resolves against.
    Srcdoc { origin: String },
    /// No runtime URL: the host renders the content tree itself.
    Custom,
}

/// Readiness of the hosted runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// Surface created or loading; no handshake yet.
    #[default]
    Loading,
    /// The runtime announced itself and handed over its capabilities.
    Ready,
}

/// The isolated document the runtime renders into.
#[derive(Default)]
pub struct Surface {
    doc: ContentDoc,
    markup: Option<String>,
}

type RuntimeJob = Box<dyn FnOnce(&mut dyn Runtime, &mut ContentDoc)>;

/// Owns the rendering surface, the load policy, and the runtime handshake.
pub struct RenderBridge {
    load_mode: LoadMode,
    surface: Option<Surface>,
    mounted: bool,
    status: RuntimeStatus,
    runtime: Option<Box<dyn Runtime>>,
    pending: Vec<RuntimeJob>,
    root_rect: Option<Rect>,
    instance_id: String,
}

impl RenderBridge {
    /// Create the bridge and its surface. The load mode is fixed here from
    /// the configured runtime URL and the editor's own origin.
    #[must_use]
    pub fn new(runtime_url: Option<&str>, editor_origin: &str) -> Self {
        let load_mode = match runtime_url {
            None => LoadMode::Custom,
            Some(url) if is_same_origin(url, editor_origin) => {
                LoadMode::Navigate { url: url.to_owned() }
            }
            Some(url) => LoadMode::Srcdoc { origin: origin_of(url).to_owned() },
        };
        Self {
            load_mode,
            surface: Some(Surface::default()),
            mounted: false,
            status: RuntimeStatus::default(),
            runtime: None,
            pending: Vec::new(),
            root_rect: None,
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// The decided load policy.
    #[must_use]
    pub fn load_mode(&self) -> &LoadMode {
        &self.load_mode
    }

    /// Token namespacing this mount's broadcast messages.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Inject host-fetched markup for a cross-origin runtime. The base is
    /// rewritten so relative URLs resolve against the runtime origin.
    pub fn set_markup(&mut self, markup: &str) {
        let LoadMode::Srcdoc { origin } = &self.load_mode else {
            warn!("markup injected outside srcdoc mode; ignored");
            return;
        };
        let rewritten = rewrite_base(markup, origin);
        if let Some(surface) = self.surface.as_mut() {
            surface.markup = Some(rewritten);
        }
    }

    /// The srcdoc markup the host should load, once injected.
    #[must_use]
    pub fn markup(&self) -> Option<&str> {
        self.surface.as_ref().and_then(|s| s.markup.as_deref())
    }

    /// Attach the surface.
    ///
    /// # Errors
    ///
    /// [`StageError::Mount`] when the surface was already torn down or the
    /// bridge is already mounted; fatal to this mount attempt.
    pub fn mount(&mut self) -> Result<(), StageError> {
        if self.surface.is_none() {
            return Err(StageError::Mount("rendering surface is gone".to_owned()));
        }
        if self.mounted {
            return Err(StageError::Mount("bridge is already mounted".to_owned()));
        }
        self.mounted = true;
        debug!(mode = ?self.load_mode, "render bridge mounted");
        Ok(())
    }

    /// Whether `mount` succeeded and the surface is still alive.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted && self.surface.is_some()
    }

    /// Whether the readiness handshake completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == RuntimeStatus::Ready
    }

    /// The broadcast payload announced into the hosted window so runtimes
    /// that cannot receive the bridge object directly can still react.
    #[must_use]
    pub fn ready_announcement(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "lowcode:ready",
            "instance": self.instance_id,
        })
    }

    /// One-shot readiness handshake: the hosted runtime hands back its
    /// capability handle. Buffered callers drain in order. Duplicate calls
    /// are ignored.
    pub fn runtime_ready(&mut self, handle: Box<dyn Runtime>) -> Vec<StageEvent> {
        if self.surface.is_none() {
            warn!("runtime announced readiness after teardown; dropped");
            return Vec::new();
        }
        if self.status == RuntimeStatus::Ready {
            warn!("duplicate runtime readiness signal ignored");
            return Vec::new();
        }
        self.status = RuntimeStatus::Ready;
        self.runtime = Some(handle);
        debug!(pending = self.pending.len(), "runtime ready");
        let jobs = std::mem::take(&mut self.pending);
        for job in jobs {
            if let (Some(rt), Some(surface)) = (self.runtime.as_mut(), self.surface.as_mut()) {
                job(rt.as_mut(), &mut surface.doc);
            }
        }
        vec![StageEvent::RuntimeReady]
    }

    /// Run `job` against the runtime now if the handshake completed,
    /// otherwise buffer it until readiness.
    pub fn with_runtime(&mut self, job: impl FnOnce(&mut dyn Runtime, &mut ContentDoc) + 'static) {
        if self.status == RuntimeStatus::Ready {
            if let (Some(rt), Some(surface)) = (self.runtime.as_mut(), self.surface.as_mut()) {
                job(rt.as_mut(), &mut surface.doc);
            }
        } else {
            self.pending.push(Box::new(job));
        }
    }

    /// Run `f` against the runtime only when it is already ready; `None`
    /// otherwise. Used where a synchronous answer (e.g. a select gate) is
    /// required.
    pub fn with_runtime_now<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Runtime, &mut ContentDoc) -> R,
    ) -> Option<R> {
        if self.status != RuntimeStatus::Ready {
            return None;
        }
        let rt = self.runtime.as_mut()?;
        let surface = self.surface.as_mut()?;
        Some(f(rt.as_mut(), &mut surface.doc))
    }

    /// Read access to the content document, while the surface is alive.
    #[must_use]
    pub fn doc(&self) -> Option<&ContentDoc> {
        self.surface.as_ref().map(|s| &s.doc)
    }

    /// Mutable access to the content document.
    pub fn doc_mut(&mut self) -> Option<&mut ContentDoc> {
        self.surface.as_mut().map(|s| &mut s.doc)
    }

    /// Root-box-changed callback from the runtime; the overlay uses this to
    /// stay congruent with the rendered root.
    pub fn on_root_resize(&mut self, rect: Rect) {
        self.root_rect = Some(rect);
    }

    /// Last reported rendered-root box.
    #[must_use]
    pub fn root_rect(&self) -> Option<Rect> {
        self.root_rect
    }

    /// Detach and release everything. Buffered continuations are dropped
    /// without running; later readiness signals become no-ops.
    pub fn destroy(&mut self) {
        self.surface = None;
        self.runtime = None;
        self.pending.clear();
        self.mounted = false;
        self.status = RuntimeStatus::Loading;
        debug!("render bridge destroyed");
    }
}

/// Extract the `host[:port]` authority of a URL, if it has one. Relative
/// URLs have none and resolve against the editor itself.
#[must_use]
pub fn host_of(url: &str) -> Option<&str> {
    let rest = if let Some(idx) = url.find("://") {
        &url[idx + 3..]
    } else if let Some(stripped) = url.strip_prefix("//") {
        stripped
    } else {
        return None;
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit('@').next().unwrap_or(authority);
    if host.is_empty() { None } else { Some(host) }
}

/// Whether `runtime_url` shares the editor's origin. Relative runtime URLs
/// are always same-origin.
#[must_use]
pub fn is_same_origin(runtime_url: &str, editor_origin: &str) -> bool {
    let Some(runtime_host) = host_of(runtime_url) else {
        return true;
    };
    let editor_host = host_of(editor_origin).unwrap_or(editor_origin);
    runtime_host.eq_ignore_ascii_case(editor_host)
}

/// Scheme + authority prefix of a URL, used as the rewritten base origin.
#[must_use]
pub fn origin_of(url: &str) -> &str {
    let Some(idx) = url.find("://") else {
        return url;
    };
    let rest = &url[idx + 3..];
    let end = rest.find(['/', '?', '#']).map_or(url.len(), |e| idx + 3 + e);
    &url[..end]
}

/// Inject a `<base>` tag so relative URLs in cross-origin markup resolve
/// against the runtime origin. Inserted directly after `<head>` when
/// present, otherwise prepended.
#[must_use]
pub fn rewrite_base(markup: &str, origin: &str) -> String {
    let base = format!("<base href=\"{origin}/\">");
    let lower = markup.to_ascii_lowercase();
    if let Some(head_start) = lower.find("<head") {
        if let Some(close) = lower[head_start..].find('>') {
            let insert_at = head_start + close + 1;
            let mut out = String::with_capacity(markup.len() + base.len());
            out.push_str(&markup[..insert_at]);
            out.push_str(&base);
            out.push_str(&markup[insert_at..]);
            return out;
        }
    }
    format!("{base}{markup}")
}
