//! Request handling: routing, payloads, the visit pipeline and telemetry.

pub mod audit;
pub mod client_server;
pub mod coerce;
pub mod extract;
pub mod global;
pub mod handler;
pub mod launch;
pub mod monitor;
pub mod payload;
pub mod router;
pub mod upload;

pub use audit::Audit;
pub use client_server::{ClientServer, StartError, VisitError};
pub use extract::{FromParam, Json, ParamKind, ParamValue, State};
pub use global::{default_server, route, take_default_server};
pub use handler::{Handler, IntoPayload, RouteOutput};
pub use launch::{Bridge, LaunchError, NavigationEvent, Navigator, Runtime, launch_in_browser};
pub use monitor::{Monitor, MonitorSnapshot, VisitRecord};
pub use payload::{Download, ErrorPage, Fragment, Page, Payload, Progress, Redirect, Update};
pub use router::{ArgumentError, RouteError, Router};
pub use upload::{UploadedFile, UploadedImage};

pub use drafter_core as core;
pub use drafter_render as render;
