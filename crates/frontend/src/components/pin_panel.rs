use chronicle_shared::calendar::{DateSystem, DsaCalendar};
use chronicle_shared::error::MapError;
use chronicle_shared::models::{PendingPlacement, Pin, PinId, PinPatch, Visibility};
use dioxus::prelude::*;

fn visibility_from_value(value: &str) -> Visibility {
    match value {
        "gm" => Visibility::Gm,
        _ => Visibility::Players,
    }
}

fn optional(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Form for a pin that has been placed but not created yet.
#[component]
pub fn PlacementForm(
    pending: PendingPlacement,
    saving: bool,
    is_gm: bool,
    on_change: EventHandler<PendingPlacement>,
    on_submit: EventHandler<()>,
    on_cancel: EventHandler<()>,
) -> Element {
    let (p_title, p_notes, p_article, p_date, p_vis) = (
        pending.clone(),
        pending.clone(),
        pending.clone(),
        pending.clone(),
        pending.clone(),
    );
    let visibility = pending.visibility.to_string();

    rsx! {
        form {
            class: "pin-panel placement-form",
            onsubmit: move |evt: Event<FormData>| {
                evt.prevent_default();
                on_submit.call(());
            },

            h3 { "New pin" }
            p { class: "pin-position", "{pending.position.x:.1}% / {pending.position.y:.1}%" }

            label { "Title" }
            input {
                r#type: "text",
                value: "{pending.title}",
                oninput: move |evt: Event<FormData>| {
                    let mut p = p_title.clone();
                    p.title = evt.value();
                    on_change.call(p);
                },
            }

            label { "Date" }
            input {
                r#type: "text",
                placeholder: "15. Praios 1049 BF",
                value: "{pending.date_input}",
                oninput: move |evt: Event<FormData>| {
                    let mut p = p_date.clone();
                    p.date_input = evt.value();
                    on_change.call(p);
                },
            }

            label { "Notes" }
            textarea {
                value: "{pending.notes}",
                oninput: move |evt: Event<FormData>| {
                    let mut p = p_notes.clone();
                    p.notes = evt.value();
                    on_change.call(p);
                },
            }

            label { "Article" }
            input {
                r#type: "text",
                value: "{pending.related_article_id}",
                oninput: move |evt: Event<FormData>| {
                    let mut p = p_article.clone();
                    p.related_article_id = evt.value();
                    on_change.call(p);
                },
            }

            if is_gm {
                label { "Visible to" }
                select {
                    value: "{visibility}",
                    onchange: move |evt: Event<FormData>| {
                        let mut p = p_vis.clone();
                        p.visibility = visibility_from_value(&evt.value());
                        on_change.call(p);
                    },
                    option { value: "players", "Players" }
                    option { value: "gm", "GM only" }
                }
            }

            div { class: "pin-panel-actions",
                button { r#type: "submit", disabled: saving, if saving { "Saving…" } else { "Create" } }
                button {
                    r#type: "button",
                    onclick: move |_| on_cancel.call(()),
                    "Cancel"
                }
            }
        }
    }
}

/// Editable copy of a pin's text fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub title: String,
    pub notes: String,
    pub related_article_id: String,
    pub visibility: Visibility,
    pub date_input: String,
}

impl EditForm {
    pub fn from_pin(pin: &Pin) -> Self {
        EditForm {
            title: pin.title.clone(),
            notes: pin.notes.clone().unwrap_or_default(),
            related_article_id: pin.related_article_id.clone().unwrap_or_default(),
            visibility: pin.visibility,
            date_input: pin.date.as_ref().map(|d| d.label.clone()).unwrap_or_default(),
        }
    }

    /// Patch with the fields that differ from `pin`.
    pub fn to_patch<D: DateSystem>(&self, pin: &Pin, dates: &D) -> Result<PinPatch, MapError> {
        let mut patch = PinPatch::default();

        let title = self.title.trim();
        if title != pin.title {
            patch.title = Some(title.to_string());
        }
        let notes = optional(&self.notes);
        if notes != pin.notes {
            patch.notes = Some(notes);
        }
        let article = optional(&self.related_article_id);
        if article != pin.related_article_id {
            patch.related_article_id = Some(article);
        }
        if self.visibility != pin.visibility {
            patch.visibility = Some(self.visibility);
        }
        let date = dates.pin_date(&self.date_input)?;
        if date != pin.date {
            patch.date = Some(date);
        }
        Ok(patch)
    }
}

/// Details of the selected pin, with inline editing for authors.
#[component]
pub fn PinDetails(
    pin: Pin,
    order: Option<usize>,
    is_gm: bool,
    saving: bool,
    on_edit: EventHandler<(PinId, PinPatch)>,
    on_delete: EventHandler<PinId>,
    on_close: EventHandler<()>,
) -> Element {
    let mut editing = use_signal(|| false);
    let mut form = use_signal(|| EditForm::from_pin(&pin));
    let mut form_error = use_signal(|| None::<String>);

    let weekday = pin
        .date
        .as_ref()
        .and_then(|d| DsaCalendar.parse(&d.label))
        .map(|d| d.weekday());
    let pin_for_edit = pin.clone();
    let pin_for_reset = pin.clone();
    let delete_id = pin.id.clone();

    if *editing.read() {
        let current = form.read().clone();
        let visibility = current.visibility.to_string();
        return rsx! {
            form {
                class: "pin-panel pin-edit",
                onsubmit: move |evt: Event<FormData>| {
                    evt.prevent_default();
                    match form.read().to_patch(&pin_for_edit, &DsaCalendar) {
                        Ok(patch) if patch.is_empty() => editing.set(false),
                        Ok(patch) => {
                            form_error.set(None);
                            editing.set(false);
                            on_edit.call((pin_for_edit.id.clone(), patch));
                        }
                        Err(err) => form_error.set(Some(err.to_string())),
                    }
                },

                label { "Title" }
                input {
                    r#type: "text",
                    value: "{current.title}",
                    oninput: move |evt: Event<FormData>| form.write().title = evt.value(),
                }
                label { "Date" }
                input {
                    r#type: "text",
                    value: "{current.date_input}",
                    oninput: move |evt: Event<FormData>| form.write().date_input = evt.value(),
                }
                label { "Notes" }
                textarea {
                    value: "{current.notes}",
                    oninput: move |evt: Event<FormData>| form.write().notes = evt.value(),
                }
                label { "Article" }
                input {
                    r#type: "text",
                    value: "{current.related_article_id}",
                    oninput: move |evt: Event<FormData>| form.write().related_article_id = evt.value(),
                }
                if is_gm {
                    label { "Visible to" }
                    select {
                        value: "{visibility}",
                        onchange: move |evt: Event<FormData>| {
                            form.write().visibility = visibility_from_value(&evt.value());
                        },
                        option { value: "players", "Players" }
                        option { value: "gm", "GM only" }
                    }
                }
                if let Some(err) = form_error.read().as_ref() {
                    p { class: "form-error", "{err}" }
                }
                div { class: "pin-panel-actions",
                    button { r#type: "submit", disabled: saving, "Save" }
                    button {
                        r#type: "button",
                        onclick: move |_| {
                            form.set(EditForm::from_pin(&pin_for_reset));
                            form_error.set(None);
                            editing.set(false);
                        },
                        "Cancel"
                    }
                }
            }
        };
    }

    let pin_for_open = pin.clone();
    rsx! {
        div { class: "pin-panel pin-details",
            div { class: "pin-panel-header",
                if let Some(order) = order {
                    span { class: "order-badge", "{order + 1}" }
                }
                h3 { "{pin.title}" }
                if pin.visibility == Visibility::Gm {
                    span { class: "gm-tag", "GM" }
                }
            }
            if let Some(date) = pin.date.as_ref() {
                p { class: "pin-date",
                    "{date.label}"
                    if let Some(weekday) = weekday {
                        span { class: "pin-weekday", " ({weekday})" }
                    }
                }
            }
            if let Some(notes) = pin.notes.as_ref() {
                p { class: "pin-notes", "{notes}" }
            }
            if let Some(article) = pin.related_article_id.as_ref() {
                a { class: "pin-article", href: "/wiki/{article}", "Open article" }
            }
            div { class: "pin-panel-actions",
                button {
                    onclick: move |_| {
                        form.set(EditForm::from_pin(&pin_for_open));
                        editing.set(true);
                    },
                    "Edit"
                }
                button {
                    class: "danger",
                    disabled: saving,
                    onclick: move |_| on_delete.call(delete_id.clone()),
                    "Delete"
                }
                button { onclick: move |_| on_close.call(()), "Close" }
            }
        }
    }
}
