use pagefix_logging::{pagefix_info, pagefix_warn};

use crate::{Capability, HostError, PageHost};

/// `id` of the fallback `<style>` element.
pub const STYLE_ELEMENT_ID: &str = "pagefix-styles";

/// Channel that accepted the stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPath<N> {
    Privileged,
    /// Style element appended to the page; holds the new node.
    Fallback(N),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    #[error("no document root to attach a style element to")]
    NoDocumentRoot,
    #[error("fallback style element failed: {0}")]
    Fallback(#[source] HostError),
}

/// Delivers `css` to the page through exactly one channel.
///
/// The privileged channel is tried first. When it is missing or rejects the
/// text, a `<style>` element is appended to `<head>` (or `<html>` while the
/// head does not exist yet). Neither channel is retried.
pub fn inject_styles<H: PageHost>(
    page: &mut H,
    css: &str,
) -> Result<InjectionPath<H::Node>, InjectError> {
    let reason = match page.probe_style_channel() {
        Capability::Available(channel) => match channel.add_style(css) {
            Ok(()) => {
                pagefix_info!("Styles applied through the privileged channel");
                return Ok(InjectionPath::Privileged);
            }
            Err(err) => err.to_string(),
        },
        Capability::Unavailable(api) => format!("{api} is not available"),
    };
    pagefix_warn!("Privileged style injection failed ({reason}); using a style element");

    let parent = page
        .head()
        .or_else(|| page.document_element())
        .ok_or(InjectError::NoDocumentRoot)?;
    let node = page
        .append_style_element(parent, STYLE_ELEMENT_ID, css)
        .map_err(InjectError::Fallback)?;
    pagefix_info!("Styles applied through a fallback style element");
    Ok(InjectionPath::Fallback(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedPage;

    #[test]
    fn loading_document_falls_back_to_root_element() {
        let mut page = SimulatedPage::loading().without_style_channel();
        let root = page.document_element().unwrap();
        let path = inject_styles(&mut page, "p { margin: 0; }").unwrap();
        let InjectionPath::Fallback(node) = path else {
            panic!("expected fallback, got {path:?}");
        };
        assert_eq!(page.head(), None);
        assert_eq!(page.attribute(node, "id").as_deref(), Some(STYLE_ELEMENT_ID));
        assert_eq!(page.count("html > style").unwrap(), 1);
        assert!(page.is_attached(root));
    }

    #[test]
    fn style_text_that_breaks_out_is_reported() {
        let mut page = SimulatedPage::from_html("<head></head>").without_style_channel();
        let err = inject_styles(&mut page, "</style>").unwrap_err();
        assert!(matches!(err, InjectError::Fallback(HostError::Rejected(_))));
        assert_eq!(page.stylesheet_count(), 0);
    }
}
