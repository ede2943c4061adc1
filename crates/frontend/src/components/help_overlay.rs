use dioxus::prelude::*;

#[component]
pub fn HelpOverlay(show: Signal<bool>) -> Element {
    if !*show.read() {
        return rsx! {};
    }

    rsx! {
        div {
            class: "help-overlay-backdrop",
            onclick: move |_| show.set(false),

            div {
                class: "help-overlay",
                onclick: move |evt: Event<MouseData>| evt.stop_propagation(),

                h2 { "Help" }

                div { class: "shortcut-section",
                    h3 { "View" }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "+" } " / " kbd { "-" } }
                        span { "Zoom in / out" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "R" } }
                        span { "Reset zoom & pan" }
                    }
                }

                div { class: "shortcut-section",
                    h3 { "Pins" }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "P" } }
                        span { "Place a new pin (next click)" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "Del" } " / " kbd { "Backspace" } }
                        span { "Delete selected pin (asks first)" }
                    }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "Esc" } }
                        span { "Cancel placement / deselect / close help" }
                    }
                }

                div { class: "shortcut-section",
                    h3 { "Help" }
                    div { class: "shortcut-row",
                        span { class: "shortcut-keys", kbd { "H" } " / " kbd { "?" } }
                        span { "Toggle this help" }
                    }
                }

                div { class: "help-divider" }

                div { class: "help-info-section",
                    h3 { "Map Interactions" }
                    p { "Scroll or pinch to zoom, drag the map to pan, double-click to reset the view. Click a pin to select it, drag a pin to move it. Dropping a pin outside the map puts it back." }
                }

                div { class: "help-info-section",
                    h3 { "Chronology" }
                    p { "Dated pins are joined in date order by a curved path; the number above a pin is its place in that order. Undated pins stand alone." }
                }

                button {
                    class: "close-help",
                    onclick: move |_| show.set(false),
                    "Close"
                }
            }
        }
    }
}
