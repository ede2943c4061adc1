use chronicle_shared::calendar::DsaCalendar;
use chronicle_shared::gesture::GestureOutcome;
use chronicle_shared::models::{MapId, PendingPlacement, PinId, PinPatch};
use chronicle_shared::path::build_path;
use chronicle_shared::pin_store::{PinFilter, PinSync};
use chronicle_shared::viewport::MapViewport;
use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;
use tracing::debug;

use crate::api::{self, GraphqlPinRepository};
use crate::components::help_overlay::HelpOverlay;
use crate::components::map_view::MapView;
use crate::components::pin_panel::{PinDetails, PlacementForm};
use crate::config::AppConfig;
use crate::Route;

const NOTICE_MS: u32 = 4000;
const KEY_ZOOM_STEP: f64 = 1.25;

#[derive(Debug, Clone, PartialEq)]
struct Notice {
    id: u64,
    message: String,
}

/// Transient error notices. A newer notice replaces an older one and only
/// its own timer may hide it.
#[derive(Clone, Copy)]
struct Notices {
    current: Signal<Option<Notice>>,
    seq: Signal<u64>,
}

impl Notices {
    fn show(mut self, message: String) {
        let id = *self.seq.peek() + 1;
        self.seq.set(id);
        self.current.set(Some(Notice { id, message }));
        spawn(async move {
            TimeoutFuture::new(NOTICE_MS).await;
            if self.current.peek().as_ref().map(|n| n.id) == Some(id) {
                self.current.set(None);
            }
        });
    }
}

fn bump(mut revision: Signal<u64>) {
    *revision.write() += 1;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shortcut {
    Escape,
    DeleteSelected,
    ResetView,
    ZoomIn,
    ZoomOut,
    ArmPlacement,
    ToggleHelp,
}

fn shortcut(key: &Key) -> Option<Shortcut> {
    match key {
        Key::Escape => Some(Shortcut::Escape),
        Key::Delete | Key::Backspace => Some(Shortcut::DeleteSelected),
        Key::Character(c) => match c.as_str() {
            "r" | "R" => Some(Shortcut::ResetView),
            "+" | "=" => Some(Shortcut::ZoomIn),
            "-" => Some(Shortcut::ZoomOut),
            "p" | "P" => Some(Shortcut::ArmPlacement),
            "h" | "H" | "?" => Some(Shortcut::ToggleHelp),
            _ => None,
        },
        _ => None,
    }
}

fn delete_prompt(title: &str) -> String {
    format!("Delete pin \"{title}\"?")
}

/// Blocking browser confirmation. No window means no consent.
fn ask_browser(message: &str) -> bool {
    web_sys::window()
        .and_then(|window| window.confirm_with_message(message).ok())
        .unwrap_or(false)
}

#[component]
pub fn MapPage(map_id: String) -> Element {
    let config = use_hook(AppConfig::load);
    let sync = use_hook({
        let map_id = map_id.clone();
        let api_url = config.api_url.clone();
        move || PinSync::new(MapId::new(map_id), GraphqlPinRepository::new(api_url))
    });

    let viewport_config = config.viewport;
    let mut viewport = use_signal(move || MapViewport::new(viewport_config));
    // Bumped whenever the pin store changes; the store itself is not reactive.
    let revision = use_signal(|| 0u64);
    let mut show_gm_pins = use_signal(|| true);
    let mut show_help = use_signal(|| false);
    let mut saving = use_signal(|| false);
    let notices = Notices {
        current: use_signal(|| None::<Notice>),
        seq: use_signal(|| 0u64),
    };

    let map_resource = use_resource({
        let api_url = config.api_url.clone();
        let map_id = map_id.clone();
        move || {
            let api_url = api_url.clone();
            let map_id = map_id.clone();
            async move { api::fetch_map(&api_url, &map_id).await }
        }
    });

    let _pins_loader = use_resource({
        let sync = sync.clone();
        move || {
            let sync = sync.clone();
            async move {
                if let Err(err) = sync.load().await {
                    notices.show(err.to_string());
                }
                bump(revision);
            }
        }
    });

    let viewer = config.viewer;
    let visible = use_memo({
        let sync = sync.clone();
        move || {
            let _ = revision.read();
            let filter = PinFilter {
                viewer,
                show_gm_pins: *show_gm_pins.read(),
            };
            sync.visible(&filter)
        }
    });
    let curvature = viewport.peek().config().path_curvature;
    let path = use_memo(move || build_path(&visible.read(), curvature));

    // A pin that is no longer visible cannot stay selected.
    use_effect(move || {
        let pins = visible.read();
        let stale = viewport
            .peek()
            .gestures()
            .selected()
            .filter(|id| pins.get(id).is_none())
            .cloned();
        if let Some(id) = stale {
            viewport.write().gestures_mut().forget_pin(&id);
        }
    });

    let sync_move = sync.clone();
    let on_outcome = use_callback(move |outcome: GestureOutcome| match outcome {
        GestureOutcome::MovePin { pin, to } => {
            let persist = sync_move.move_pin(&pin, to);
            bump(revision);
            spawn(async move {
                if let Err(err) = persist.await {
                    notices.show(err.to_string());
                }
                bump(revision);
            });
        }
        other => debug!(?other, "gesture"),
    });

    let sync_place = sync.clone();
    let submit_placement = use_callback(move |()| {
        let Some(pending) = viewport.peek().gestures().pending().cloned() else {
            return;
        };
        let sync = sync_place.clone();
        saving.set(true);
        spawn(async move {
            match sync.place_pin(&pending, &DsaCalendar).await {
                Ok(pin) => {
                    let mut vp = viewport.write();
                    vp.gestures_mut().clear_pending();
                    vp.gestures_mut().select(Some(pin.id));
                }
                // The placement stays open so the user can fix it or retry.
                Err(err) => notices.show(err.to_string()),
            }
            saving.set(false);
            bump(revision);
        });
    });

    let sync_edit = sync.clone();
    let edit_pin = use_callback(move |(id, patch): (PinId, PinPatch)| {
        let persist = sync_edit.edit_pin(&id, patch);
        bump(revision);
        spawn(async move {
            if let Err(err) = persist.await {
                notices.show(err.to_string());
            }
            bump(revision);
        });
    });

    let sync_delete = sync.clone();
    let delete_pin = use_callback(move |id: PinId| {
        let persist = sync_delete.delete_pin(&id);
        viewport.write().gestures_mut().forget_pin(&id);
        bump(revision);
        spawn(async move {
            if let Err(err) = persist.await {
                notices.show(err.to_string());
            }
            bump(revision);
        });
    });

    // Every delete from the page asks first.
    let request_delete = use_callback(move |id: PinId| {
        let title = visible.peek().get(&id).map(|pin| pin.title.clone());
        if let Some(title) = title {
            if ask_browser(&delete_prompt(&title)) {
                delete_pin.call(id);
            }
        }
    });

    let map = match &*map_resource.read() {
        None => return rsx! { div { class: "app loading", "Loading map…" } },
        Some(Err(err)) => return rsx! { div { class: "app error", "Map could not be loaded: {err}" } },
        Some(Ok(None)) => return rsx! { div { class: "app error", "No map with id {map_id}" } },
        Some(Ok(Some(map))) => map.clone(),
    };

    let is_gm = config.is_gm();
    let (placing, pending, selected) = {
        let vp = viewport.read();
        let gestures = vp.gestures();
        (
            gestures.is_placing_armed(),
            gestures.pending().cloned(),
            gestures.selected().cloned(),
        )
    };
    let pins = visible.read().clone();
    let chrono = path.read().clone();
    let selected_pin = selected.and_then(|id| pins.get(&id).cloned());
    let selected_order = selected_pin.as_ref().and_then(|pin| chrono.order_of(&pin.id));
    let notice = notices.current.read().clone();

    rsx! {
        div { class: "app",
            div { class: "header",
                Link { class: "back-link", to: Route::Home {}, "← Maps" }
                h1 { "{map.name}" }
                div { class: "toolbar",
                    button {
                        class: if placing { "active" } else { "" },
                        onclick: move |_| {
                            let mut vp = viewport.write();
                            if vp.gestures().is_placing_armed() {
                                vp.gestures_mut().cancel_placement();
                            } else {
                                vp.gestures_mut().arm_placement();
                            }
                        },
                        "Place pin"
                    }
                    button {
                        onclick: move |_| {
                            viewport.write().zoom_about_center(KEY_ZOOM_STEP);
                        },
                        "+"
                    }
                    button {
                        onclick: move |_| {
                            viewport.write().zoom_about_center(1.0 / KEY_ZOOM_STEP);
                        },
                        "−"
                    }
                    button { onclick: move |_| viewport.write().reset_view(), "Reset view" }
                    if is_gm {
                        button {
                            class: if *show_gm_pins.read() { "active" } else { "" },
                            onclick: move |_| show_gm_pins.toggle(),
                            "GM pins"
                        }
                    }
                    button { onclick: move |_| show_help.toggle(), "?" }
                }
            }

            div { class: "sidebar",
                if let Some(pending) = pending {
                    PlacementForm {
                        pending: pending,
                        saving: *saving.read(),
                        is_gm: is_gm,
                        on_change: move |updated: PendingPlacement| {
                            if let Some(slot) = viewport.write().gestures_mut().pending_mut() {
                                *slot = updated;
                            }
                        },
                        on_submit: move |_| submit_placement.call(()),
                        on_cancel: move |_| viewport.write().gestures_mut().cancel_placement(),
                    }
                } else if let Some(pin) = selected_pin {
                    PinDetails {
                        key: "{pin.id}",
                        pin: pin.clone(),
                        order: selected_order,
                        is_gm: is_gm,
                        saving: *saving.read(),
                        on_edit: move |edit: (PinId, PinPatch)| edit_pin.call(edit),
                        on_delete: move |id: PinId| request_delete.call(id),
                        on_close: move |_| viewport.write().gestures_mut().select(None),
                    }
                } else {
                    div { class: "panel hint",
                        p { "Select a pin to see its details, or press " kbd { "P" } " to place a new one." }
                    }
                }
            }

            div {
                class: "map-area",
                tabindex: "0",
                onkeydown: move |evt: Event<KeyboardData>| match shortcut(&evt.key()) {
                    Some(Shortcut::Escape) => {
                        if *show_help.peek() {
                            show_help.set(false);
                            return;
                        }
                        let mut vp = viewport.write();
                        let gestures = vp.gestures_mut();
                        if gestures.is_placing_armed() || gestures.pending().is_some() {
                            gestures.cancel_placement();
                        } else {
                            gestures.select(None);
                        }
                    }
                    Some(Shortcut::DeleteSelected) => {
                        let selected = viewport.peek().gestures().selected().cloned();
                        if let Some(id) = selected {
                            request_delete.call(id);
                        }
                    }
                    Some(Shortcut::ResetView) => viewport.write().reset_view(),
                    Some(Shortcut::ZoomIn) => {
                        viewport.write().zoom_about_center(KEY_ZOOM_STEP);
                    }
                    Some(Shortcut::ZoomOut) => {
                        viewport.write().zoom_about_center(1.0 / KEY_ZOOM_STEP);
                    }
                    Some(Shortcut::ArmPlacement) => viewport.write().gestures_mut().arm_placement(),
                    Some(Shortcut::ToggleHelp) => show_help.toggle(),
                    None => {}
                },

                MapView {
                    image_url: map.image_url.clone(),
                    viewport: viewport,
                    pins: pins,
                    path: chrono,
                    on_outcome: move |outcome: GestureOutcome| on_outcome.call(outcome),
                }
            }

            if let Some(notice) = notice {
                div { class: "notice", role: "alert", "{notice.message}" }
            }

            HelpOverlay { show: show_help }
        }
    }
}
