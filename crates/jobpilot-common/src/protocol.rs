use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted with a job name when a selector template is bound.
pub const JOB_PLACEHOLDER: &str = "{job}";

/// Opaque reference to an element registered by the page-side locator.
///
/// Handles are only valid until the next navigation; the locator reports a
/// stale handle as `ELEMENT_STALE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u32);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a query is evaluated: the whole document or the subtree of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Page,
    Element(ElementHandle),
}

impl Scope {
    pub fn element(&self) -> Option<ElementHandle> {
        match self {
            Scope::Page => None,
            Scope::Element(handle) => Some(*handle),
        }
    }
}

impl From<ElementHandle> for Scope {
    fn from(handle: ElementHandle) -> Self {
        Scope::Element(handle)
    }
}

/// Selector expressions understood by the page-side locator.
///
/// Text matching is case-insensitive and whitespace-normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Plain CSS selector.
    Css(String),
    /// Deepest element whose text contains the needle.
    Text(String),
    /// CSS matches whose text contains the needle.
    CssWithText { css: String, text: String },
    /// `target` evaluated inside every element matching `container`.
    Inside {
        container: Box<Selector>,
        target: Box<Selector>,
    },
    /// The element immediately following an `anchor` match, if it matches `css`.
    NextSibling { anchor: Box<Selector>, css: String },
    /// CSS matches laid out within `max_distance` pixels of a text match, nearest first.
    Near {
        css: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_distance: Option<f32>,
    },
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text(text.into())
    }

    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    pub fn inside(container: Selector, target: Selector) -> Self {
        Selector::Inside {
            container: Box::new(container),
            target: Box::new(target),
        }
    }

    pub fn next_sibling(anchor: Selector, css: impl Into<String>) -> Self {
        Selector::NextSibling {
            anchor: Box::new(anchor),
            css: css.into(),
        }
    }

    pub fn near(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::Near {
            css: css.into(),
            text: text.into(),
            max_distance: None,
        }
    }

    /// True if any part of the selector carries the job placeholder.
    pub fn is_template(&self) -> bool {
        match self {
            Selector::Css(css) => css.contains(JOB_PLACEHOLDER),
            Selector::Text(text) => text.contains(JOB_PLACEHOLDER),
            Selector::CssWithText { css, text } | Selector::Near { css, text, .. } => {
                css.contains(JOB_PLACEHOLDER) || text.contains(JOB_PLACEHOLDER)
            }
            Selector::Inside { container, target } => {
                container.is_template() || target.is_template()
            }
            Selector::NextSibling { anchor, css } => {
                anchor.is_template() || css.contains(JOB_PLACEHOLDER)
            }
        }
    }

    /// Substitute the job placeholder. Text needles take the value verbatim,
    /// CSS fragments get it escaped for use inside a quoted attribute value.
    pub fn bind(&self, value: &str) -> Selector {
        let css_value = escape_css_string(value);
        let css = |s: &str| s.replace(JOB_PLACEHOLDER, &css_value);
        let text = |s: &str| s.replace(JOB_PLACEHOLDER, value);
        match self {
            Selector::Css(c) => Selector::Css(css(c)),
            Selector::Text(t) => Selector::Text(text(t)),
            Selector::CssWithText { css: c, text: t } => Selector::CssWithText {
                css: css(c),
                text: text(t),
            },
            Selector::Inside { container, target } => Selector::Inside {
                container: Box::new(container.bind(value)),
                target: Box::new(target.bind(value)),
            },
            Selector::NextSibling { anchor, css: c } => Selector::NextSibling {
                anchor: Box::new(anchor.bind(value)),
                css: css(c),
            },
            Selector::Near {
                css: c,
                text: t,
                max_distance,
            } => Selector::Near {
                css: css(c),
                text: text(t),
                max_distance: *max_distance,
            },
        }
    }
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "{}", css),
            Selector::Text(text) => write!(f, "text={:?}", text),
            Selector::CssWithText { css, text } => write!(f, "{}:has-text({:?})", css, text),
            Selector::Inside { container, target } => write!(f, "{} >> {}", container, target),
            Selector::NextSibling { anchor, css } => write!(f, "{} + {}", anchor, css),
            Selector::Near {
                css,
                text,
                max_distance,
            } => match max_distance {
                Some(d) => write!(f, "{}:near(text={:?}, {})", css, text, d),
                None => write!(f, "{}:near(text={:?})", css, text),
            },
        }
    }
}

/// Requests evaluated by the page-side locator script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LocatorRequest {
    /// First visible match, registered as a handle.
    Probe {
        selector: Selector,
        scope: Option<ElementHandle>,
    },
    /// All matches in document order, at most `max`.
    QueryAll {
        selector: Selector,
        scope: Option<ElementHandle>,
        max: usize,
    },
    Text {
        element: ElementHandle,
    },
    Fill {
        element: ElementHandle,
        text: String,
    },
    Click {
        element: ElementHandle,
    },
}

impl LocatorRequest {
    /// Operation name, safe to log (never includes typed text).
    pub fn op(&self) -> &'static str {
        match self {
            LocatorRequest::Probe { .. } => "probe",
            LocatorRequest::QueryAll { .. } => "query_all",
            LocatorRequest::Text { .. } => "text",
            LocatorRequest::Fill { .. } => "fill",
            LocatorRequest::Click { .. } => "click",
        }
    }
}

/// Responses received from the locator script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocatorResponse {
    Ok {
        #[serde(default)]
        data: LocatorData,
    },
    Error {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocatorData {
    #[default]
    Done,
    Element {
        id: Option<ElementHandle>,
    },
    Elements {
        ids: Vec<ElementHandle>,
    },
    Text {
        text: String,
    },
}

impl LocatorResponse {
    pub fn into_result(self) -> Result<LocatorData, BackendError> {
        match self {
            LocatorResponse::Ok { data } => Ok(data),
            LocatorResponse::Error { code, message } => {
                Err(BackendError::from_locator_code(&code, message))
            }
        }
    }
}
