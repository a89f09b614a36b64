/// Page-side locator. Injected into the browser context by backends; exposes
/// `window.JobPilot.process(request)` and keeps the element-handle map.
pub const LOCATOR_JS: &str = include_str!("locator.js");
