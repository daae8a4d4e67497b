use std::time::Duration;

use pagefix_core::TimerId;
use pagefix_logging::{pagefix_debug, pagefix_info};

use crate::{PageEvent, PageHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorOutcome {
    Matched,
    Expired,
}

/// One-shot listener for a failed load of the analytics script.
///
/// Released on the first matching error or when its timeout fires,
/// whichever comes first.
#[derive(Debug)]
pub struct LoadErrorListener {
    marker: String,
    timer: Option<TimerId>,
    active: bool,
}

impl LoadErrorListener {
    pub fn arm<H: PageHost>(page: &mut H, marker: &str, timeout: Duration) -> Self {
        let timer = page.set_timer(timeout);
        pagefix_debug!(
            "Listening for load errors of {marker:?} for {}ms",
            timeout.as_millis()
        );
        Self {
            marker: marker.to_string(),
            timer: Some(timer),
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn handle_event<H: PageHost>(
        &mut self,
        page: &mut H,
        event: &PageEvent<H::Node>,
    ) -> Option<LoadErrorOutcome> {
        if !self.active {
            return None;
        }
        match event {
            PageEvent::ResourceError { source } if source.contains(&self.marker) => {
                pagefix_info!(
                    "Analytics script blocked or failed to load ({source}); expected with content blockers"
                );
                self.cancel(page);
                Some(LoadErrorOutcome::Matched)
            }
            PageEvent::Timer(id) if self.timer == Some(*id) => {
                self.timer = None;
                self.active = false;
                pagefix_debug!("Load error listener expired");
                Some(LoadErrorOutcome::Expired)
            }
            _ => None,
        }
    }

    pub fn cancel<H: PageHost>(&mut self, page: &mut H) {
        self.active = false;
        if let Some(id) = self.timer.take() {
            page.clear_timer(id);
        }
    }
}
