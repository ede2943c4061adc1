use chronicle_shared::config::ViewportConfig;
use chronicle_shared::pin_store::Viewer;

pub const API_URL_KEY: &str = "chronicle.api_url";
pub const ROLE_KEY: &str = "chronicle.role";
pub const VIEWPORT_KEY: &str = "chronicle.viewport";

/// Client settings, read once at startup from `localStorage`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_url: String,
    pub viewer: Viewer,
    pub viewport: ViewportConfig,
}

impl AppConfig {
    pub fn load() -> Self {
        let window = web_sys::window();
        let origin = window.as_ref().and_then(|w| w.location().origin().ok());
        let storage = window.and_then(|w| w.local_storage().ok().flatten());
        let item = |key: &str| storage.as_ref().and_then(|s| s.get_item(key).ok().flatten());

        AppConfig::from_parts(
            origin.as_deref(),
            item(API_URL_KEY).as_deref(),
            item(ROLE_KEY).as_deref(),
            item(VIEWPORT_KEY).as_deref(),
        )
    }

    /// Build from raw stored values; anything missing or malformed falls
    /// back to its default.
    pub fn from_parts(
        origin: Option<&str>,
        api_url: Option<&str>,
        role: Option<&str>,
        viewport_json: Option<&str>,
    ) -> Self {
        let api_url = match api_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => url.to_string(),
            // Same origin in production.
            None => format!("{}/graphql", origin.unwrap_or_default()),
        };

        let viewer = match role.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("gm") => Viewer::Gm,
            _ => Viewer::Player,
        };

        let viewport = match viewport_json {
            Some(json) => ViewportConfig::from_json(json).unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring malformed viewport settings");
                ViewportConfig::default()
            }),
            None => ViewportConfig::default(),
        };

        AppConfig {
            api_url,
            viewer,
            viewport,
        }
    }

    pub fn is_gm(&self) -> bool {
        self.viewer == Viewer::Gm
    }
}
