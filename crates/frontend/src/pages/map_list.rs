use dioxus::prelude::*;

use crate::api::{self, MapData};
use crate::config::AppConfig;
use crate::Route;

#[component]
pub fn MapList() -> Element {
    let config = use_hook(AppConfig::load);
    let maps_resource = use_resource(move || {
        let api_url = config.api_url.clone();
        async move { api::fetch_maps(&api_url).await }
    });

    let maps: Vec<MapData> = match &*maps_resource.read() {
        Some(Ok(m)) => m.clone(),
        Some(Err(err)) => {
            return rsx! {
                div { class: "app error", "Maps could not be loaded: {err}" }
            }
        }
        None => vec![],
    };

    rsx! {
        div { class: "app map-list",
            div { class: "header",
                h1 { "Maps" }
            }
            if maps.is_empty() {
                p { class: "hint", "No maps yet." }
            }
            ul {
                for m in maps {
                    li { key: "{m.id}",
                        Link { to: Route::OpenMap { id: m.id.clone() }, "{m.name}" }
                    }
                }
            }
        }
    }
}
