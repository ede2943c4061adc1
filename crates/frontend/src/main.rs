mod api;
mod components;
mod config;
mod coords;
mod pages;

use dioxus::prelude::*;

#[derive(Routable, Clone, PartialEq)]
enum Route {
    #[route("/")]
    Home {},
    #[route("/maps/:id")]
    OpenMap { id: String },
}

#[component]
fn Home() -> Element {
    rsx! {
        pages::map_list::MapList {}
    }
}

#[component]
fn OpenMap(id: String) -> Element {
    rsx! {
        // Keyed so switching maps starts from a fresh viewport and pin store.
        pages::map_page::MapPage { key: "{id}", map_id: id.clone() }
    }
}

const CSS: Asset = asset!("/assets/main.css");
const FAVICON: Asset = asset!("/assets/favicon.svg");

#[allow(non_snake_case)]
fn App() -> Element {
    rsx! {
        document::Link { rel: "icon", r#type: "image/svg+xml", href: FAVICON }
        document::Stylesheet { href: CSS }
        Router::<Route> {}
    }
}

fn main() {
    launch(App);
}
