//! Interactive stage engine for a visual page builder.
//!
//! This crate is the editing surface of the builder: it lets a host
//! application point at, select, drag, resize, rotate and snap-align
//! components rendered inside an isolated rendering surface, while keeping
//! an authoritative, serializable description of each component's geometry
//! in sync with what is drawn. The host owns the real windowing/IO layer and
//! forwards pointer, keyboard and lifecycle events into
//! [`stage::StageCore`]; every operation returns typed [`event::StageEvent`]s
//! for the host to apply.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`stage`] | Selection and hit-testing orchestrator ([`stage::StageCore`]) |
//! | [`moveable`] | Drag/resize/rotate/scale gesture state machine |
//! | [`bridge`] | Rendering surface lifecycle and runtime handshake |
//! | [`mask`] | Overlay layer state: scroll, ruler, guide lines |
//! | [`calibrate`] | Proxy-handle calibration across offset parents |
//! | [`snap`] | Snapping against guides and sibling boxes |
//! | [`dom`] | Content-document element tree and hit lists |
//! | [`runtime`] | Capability protocol implemented by hosted runtimes |
//! | [`keyboard`] | Shared modifier-key watcher service |
//! | [`geom`] | Points, rects, zoom viewport, unit conversion |
//! | [`event`] | Typed outbound events and committed-patch shapes |
//! | [`error`] | Error taxonomy |
//! | [`consts`] | Shared constants (prefixes, thresholds, class names) |

pub mod bridge;
pub mod calibrate;
pub mod consts;
pub mod dom;
pub mod error;
pub mod event;
pub mod geom;
pub mod keyboard;
pub mod mask;
pub mod moveable;
pub mod runtime;
pub mod snap;
pub mod stage;

pub use error::StageError;
pub use event::StageEvent;
pub use stage::{StageConfig, StageCore};
