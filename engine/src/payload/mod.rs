//! Response shapes a route can produce.
//!
//! Every variant answers the same four questions: what HTML it renders,
//! whether it is internally consistent, which state it leaves behind and
//! which side-channel messages travel with it.

use drafter_core::{
    Message, PayloadKind, RouteTable, ServerConfig, StateSnapshot, message::ResponseMetadata,
};
use drafter_render::{RenderContext, VerifyError};
use serde::Serialize;

mod error_page;
mod page;
mod simple;

pub use error_page::{ErrorPage, simple_error_page};
pub use page::Page;
pub use simple::{Download, Fragment, Progress, Redirect, Update};

/// A state value as carried by a payload. Snapshotted when the update is
/// collected.
pub trait StateValue: Send {
    fn type_name(&self) -> &'static str;

    fn snapshot(&self) -> Result<StateSnapshot, serde_json::Error>;
}

impl<T: Serialize + Send + 'static> StateValue for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn snapshot(&self) -> Result<StateSnapshot, serde_json::Error> {
        StateSnapshot::capture(self)
    }
}

fn format_state(state: &dyn StateValue) -> Result<String, serde_json::Error> {
    let snapshot = state.snapshot()?;
    Ok(format!(
        "{} {}",
        snapshot.short_type_name(),
        serde_json::to_string_pretty(&snapshot.value)?
    ))
}

#[derive(Debug)]
pub enum Payload {
    Page(Page),
    Fragment(Fragment),
    Update(Update),
    Redirect(Redirect),
    Progress(Progress),
    Download(Download),
    ErrorPage(ErrorPage),
}

macro_rules! payload_from {
    ($($name:ident),+) => {
        $(impl From<$name> for Payload {
            fn from(payload: $name) -> Self {
                Payload::$name(payload)
            }
        })+
    };
}

payload_from!(Page, Fragment, Update, Redirect, Progress, Download, ErrorPage);

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Page(_) => PayloadKind::Page,
            Payload::Fragment(_) => PayloadKind::Fragment,
            Payload::Update(_) => PayloadKind::Update,
            Payload::Redirect(_) => PayloadKind::Redirect,
            Payload::Progress(_) => PayloadKind::Progress,
            Payload::Download(_) => PayloadKind::Download,
            Payload::ErrorPage(_) => PayloadKind::ErrorPage,
        }
    }

    /// HTML for the response body, `None` for body-less payloads.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Option<String> {
        match self {
            Payload::Page(page) => Some(page.render(ctx)),
            Payload::Fragment(fragment) => Some(fragment.render(ctx)),
            Payload::Update(_) | Payload::Download(_) => None,
            Payload::Redirect(redirect) => redirect.next().and_then(|next| next.render(ctx)),
            Payload::Progress(progress) => Some(progress.render()),
            Payload::ErrorPage(error_page) => Some(error_page.render(ctx.config)),
        }
    }

    pub fn verify(&self, routes: &dyn RouteTable) -> Result<(), VerifyError> {
        match self {
            Payload::Page(page) => page.verify(routes),
            Payload::Fragment(fragment) => fragment.verify(routes),
            Payload::Redirect(redirect) => redirect.verify(routes),
            Payload::Progress(progress) => progress.verify(),
            Payload::Download(download) => download.verify(),
            Payload::Update(_) | Payload::ErrorPage(_) => Ok(()),
        }
    }

    /// The state this payload leaves behind, if it changes it.
    pub fn get_state_updates(&self) -> Result<Option<StateSnapshot>, serde_json::Error> {
        match self {
            Payload::Page(page) => page.state().snapshot().map(Some),
            Payload::Update(update) => update.state().snapshot().map(Some),
            Payload::Redirect(redirect) => match redirect.next() {
                Some(next) => next.get_state_updates(),
                None => Ok(None),
            },
            Payload::Fragment(_)
            | Payload::Progress(_)
            | Payload::Download(_)
            | Payload::ErrorPage(_) => Ok(None),
        }
    }

    pub fn get_messages(&self, config: &ServerConfig) -> Result<Vec<Message>, serde_json::Error> {
        match self {
            Payload::Page(page) => Ok(page.messages()),
            Payload::Download(download) => download.messages().map(|message| vec![message]),
            Payload::Redirect(redirect) => match redirect.next() {
                Some(next) => next.get_messages(config),
                None => Ok(Vec::new()),
            },
            Payload::Fragment(_)
            | Payload::Update(_)
            | Payload::Progress(_)
            | Payload::ErrorPage(_) => Ok(Vec::new()),
        }
    }

    /// History representation shown in the visit log.
    pub fn format(&self) -> Result<String, serde_json::Error> {
        Ok(match self {
            Payload::Page(page) => format!(
                "Page(state={}, content={} items)",
                format_state(page.state())?,
                page.content.len()
            ),
            Payload::Update(update) => format!("Update(state={})", format_state(update.state())?),
            Payload::Fragment(fragment) => format!("Fragment(target={})", fragment.target_id),
            Payload::Redirect(redirect) => match redirect.next() {
                Some(next) => format!("Redirect({}, {})", redirect.target(), next.format()?),
                None => format!("Redirect({})", redirect.target()),
            },
            Payload::Progress(progress) => format!("Progress({})", progress.message),
            Payload::Download(download) => format!(
                "Download({}, {} bytes)",
                download.file_name,
                download.content.len()
            ),
            Payload::ErrorPage(error_page) => format!("ErrorPage({})", error_page.error.message),
        })
    }

    /// Fill the response metadata this payload is responsible for.
    pub fn apply_metadata(&self, metadata: &mut ResponseMetadata) {
        match self {
            Payload::Fragment(fragment) => metadata.target_id = Some(fragment.target_id.clone()),
            Payload::Progress(progress) => metadata.target_id = Some(progress.target_id.clone()),
            Payload::Download(download) => metadata.download = Some(download.info()),
            Payload::Redirect(redirect) => {
                metadata.redirect = Some(redirect.target());
                if let Some(next) = redirect.next() {
                    next.apply_metadata(metadata);
                }
            }
            Payload::Page(_) | Payload::Update(_) | Payload::ErrorPage(_) => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use drafter_core::{RouteTable, RouteUrl};

    pub struct Routes(pub BTreeSet<RouteUrl>);

    impl Routes {
        pub fn of(urls: &[&str]) -> Self {
            Self(urls.iter().map(|url| RouteUrl::new(url)).collect())
        }
    }

    impl RouteTable for Routes {
        fn has_route(&self, url: &RouteUrl) -> bool {
            self.0.contains(url)
        }

        fn route_urls(&self) -> Vec<RouteUrl> {
            self.0.iter().cloned().collect()
        }
    }
}
