//! One-shot AR fallbacks for devices without WebXR.

use super::error::ArError;
use crate::platform::ArCapabilities;
use url::Url;

const SCENE_VIEWER_HOST: &str = "arvr.google.com";
const SCENE_VIEWER_PATH: &str = "/scene-viewer/1.0";
const ARCORE_PACKAGE: &str = "com.google.ar.core";

/// Derive capabilities from the browser user agent and WebXR support.
pub fn detect_capabilities(user_agent: &str, webxr_supported: bool) -> ArCapabilities {
    let ua = user_agent.to_ascii_lowercase();
    let ios = ["iphone", "ipad", "ipod"].iter().any(|d| ua.contains(d));
    ArCapabilities {
        webxr: webxr_supported,
        android_intent: ua.contains("android") && !ios,
        ios_quick_look: ios,
    }
}

/// Resolve a derivative URI against the page it was loaded from. Without a
/// base the URI must already be absolute.
pub fn resolve_asset(base: Option<&Url>, uri: &str) -> Result<Url, ArError> {
    let resolved = match base {
        Some(base) => base.join(uri),
        None => Url::parse(uri),
    };
    resolved.map_err(|e| ArError::Bridge(format!("invalid asset uri '{}': {}", uri, e)))
}

/// Android Scene Viewer intent for a glTF binary. Without ARCore the browser
/// falls back to the page (or the asset itself when there is no page).
pub fn scene_viewer_intent(base: Option<&Url>, uri: &str, title: &str) -> Result<String, ArError> {
    let asset = resolve_asset(base, uri)?;
    let fallback = base.unwrap_or(&asset).as_str();

    let mut target = Url::parse(&format!("https://{}{}", SCENE_VIEWER_HOST, SCENE_VIEWER_PATH))
        .map_err(|e| ArError::Bridge(e.to_string()))?;
    target
        .query_pairs_mut()
        .append_pair("file", asset.as_str())
        .append_pair("mode", "ar_preferred")
        .append_pair("title", title);

    let query = target.query().unwrap_or_default();
    Ok(format!(
        "intent://{}{}?{}#Intent;scheme=https;package={};action=android.intent.action.VIEW;S.browser_fallback_url={};end;",
        SCENE_VIEWER_HOST,
        SCENE_VIEWER_PATH,
        query,
        ARCORE_PACKAGE,
        encode_component(fallback),
    ))
}

/// Absolute USDZ location for an AR Quick Look anchor.
pub fn quick_look_url(base: Option<&Url>, uri: &str) -> Result<String, ArError> {
    let mut asset = resolve_asset(base, uri)?;
    // Quick Look opens straight into AR with the object anchored.
    asset.set_fragment(Some("allowsContentScaling=1"));
    Ok(asset.into())
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
