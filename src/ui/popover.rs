/// Floating panel opened over a text selection

use crate::activity::ActivityAction;
use crate::content::dom;
use crate::notice::Notice;
use crate::selection::{self, Anchor, PANEL_WIDTH};
use crate::settings::{SharedConfig, keys};
use crate::storage;
use crate::ui::components::{Button, ButtonVariant, RunGeneration, Spinner, after, show_notice};
use crate::workflow::{ExtractionResult, Extractor, Payload};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlElement, HtmlSelectElement, KeyboardEvent, Node};
use yew::prelude::*;

const COPIED_FEEDBACK_MS: i32 = 1000;
const DATASET_FILE_NAME: &str = "dataset.csv";

#[derive(Clone, PartialEq)]
struct OpenSelection {
    text: String,
    anchor: Anchor,
    rtl: bool,
}

#[derive(Clone, PartialEq)]
enum PanelState {
    Idle,
    Loading,
    Done(ExtractionResult),
}

#[derive(Properties, PartialEq)]
pub struct PopoverProps {
    pub extractor: Extractor,
    pub config: SharedConfig,
}

/// Remove the anchor marker, if any
fn release_marker(marker: &RefCell<Option<HtmlElement>>) {
    if let Some(marker) = marker.borrow_mut().take() {
        marker.remove();
    }
}

fn event_inside(panel: &NodeRef, event: &Event) -> bool {
    let Some(panel) = panel.cast::<Node>() else {
        return false;
    };
    event
        .target()
        .and_then(|target| target.dyn_into::<Node>().ok())
        .is_some_and(|target| panel.contains(Some(&target)))
}

#[function_component(SelectionApp)]
pub fn selection_app(props: &PopoverProps) -> Html {
    let selection = use_state(|| None::<OpenSelection>);
    let panel_state = use_state(|| PanelState::Idle);
    let copied = use_state(|| false);
    let default_style = use_state(|| props.config.borrow().settings.default_style.clone());
    let marker = use_mut_ref(|| None::<HtmlElement>);
    let panel_ref = use_node_ref();
    let generation = use_memo((), |_| RunGeneration::default());

    let close = {
        let selection = selection.clone();
        let panel_state = panel_state.clone();
        let marker = marker.clone();
        let generation = generation.clone();
        Rc::new(move || {
            generation.advance();
            release_marker(&marker);
            selection.set(None);
            panel_state.set(PanelState::Idle);
        })
    };

    // Document listeners live as long as the app
    {
        let selection = selection.clone();
        let panel_state = panel_state.clone();
        let default_style = default_style.clone();
        let marker = marker.clone();
        let panel_ref = panel_ref.clone();
        let config = props.config.clone();
        let close = close.clone();
        let generation = generation.clone();

        use_effect_with((), move |_| {
            let window = web_sys::window();
            let document = window.as_ref().and_then(|w| w.document());

            let on_mouse_up = {
                let panel_ref = panel_ref.clone();
                Closure::<dyn Fn(web_sys::MouseEvent)>::new(move |event: web_sys::MouseEvent| {
                    let Some(window) = web_sys::window() else {
                        return;
                    };
                    let inside = event_inside(&panel_ref, &event);
                    let Some((text, rect)) = dom::current_selection(&window) else {
                        return;
                    };
                    let config = config.borrow();
                    if !selection::should_open(inside, &text, &config.settings) {
                        return;
                    }

                    let (_, scroll_y) = dom::scroll_offsets(&window);
                    let anchor = Anchor::below(&rect, scroll_y);

                    release_marker(&marker);
                    if let Some(document) = window.document() {
                        match dom::place_marker(&document, &anchor) {
                            Ok(element) => *marker.borrow_mut() = Some(element),
                            Err(e) => log::warn!("Failed to place selection marker: {:?}", e),
                        }
                    }

                    generation.advance();
                    default_style.set(config.settings.default_style.clone());
                    panel_state.set(PanelState::Idle);
                    selection.set(Some(OpenSelection {
                        rtl: selection::is_rtl(&text),
                        text: text.trim().to_string(),
                        anchor,
                    }));
                })
            };

            let on_mouse_down = {
                let close = close.clone();
                Closure::<dyn Fn(web_sys::MouseEvent)>::new(move |event: web_sys::MouseEvent| {
                    if !event_inside(&panel_ref, &event) {
                        close();
                    }
                })
            };

            let on_key_down = Closure::<dyn Fn(KeyboardEvent)>::new(move |event: KeyboardEvent| {
                if event.key() == "Escape" {
                    close();
                }
            });

            if let Some(document) = &document {
                let listeners: [(&str, &Closure<dyn Fn(web_sys::MouseEvent)>); 2] =
                    [("mouseup", &on_mouse_up), ("mousedown", &on_mouse_down)];
                for (name, listener) in listeners {
                    if let Err(e) =
                        document.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
                    {
                        log::error!("Failed to add {} listener: {:?}", name, e);
                    }
                }
                if let Err(e) = document
                    .add_event_listener_with_callback("keydown", on_key_down.as_ref().unchecked_ref())
                {
                    log::error!("Failed to add keydown listener: {:?}", e);
                }
            }

            move || {
                if let Some(document) = document {
                    let _ = document.remove_event_listener_with_callback(
                        "mouseup",
                        on_mouse_up.as_ref().unchecked_ref(),
                    );
                    let _ = document.remove_event_listener_with_callback(
                        "mousedown",
                        on_mouse_down.as_ref().unchecked_ref(),
                    );
                    let _ = document.remove_event_listener_with_callback(
                        "keydown",
                        on_key_down.as_ref().unchecked_ref(),
                    );
                }
            }
        });
    }

    let Some(open) = (*selection).clone() else {
        return html! {};
    };

    let on_close = {
        let close = close.clone();
        Callback::from(move |_: MouseEvent| close())
    };

    let on_extract = {
        let panel_state = panel_state.clone();
        let extractor = props.extractor.clone();
        let generation = generation.clone();
        let text = open.text.clone();
        Callback::from(move |_: MouseEvent| {
            let panel_state = panel_state.clone();
            let extractor = extractor.clone();
            let generation = generation.clone();
            let text = text.clone();

            let run = generation.current();
            panel_state.set(PanelState::Loading);
            spawn_local(async move {
                let action = ActivityAction::Text;
                let outcome = extractor
                    .extract(action, Payload::Text(text), js_sys::Date::now())
                    .await;
                match &outcome {
                    Ok(_) => show_notice(Notice::completed(action.label())),
                    Err(e) => show_notice(Notice::from_error(e)),
                }

                // The panel was closed or reopened on another selection
                if !generation.is_current(run) {
                    log::debug!("Dropping result of a dismissed extraction");
                    return;
                }
                match outcome {
                    Ok(result) => panel_state.set(PanelState::Done(result)),
                    Err(_) => panel_state.set(PanelState::Idle),
                }
            });
        })
    };

    let on_copy = {
        let copied = copied.clone();
        let text = match &*panel_state {
            PanelState::Done(result) => result.preview_link.clone(),
            _ => open.text.clone(),
        };
        Callback::from(move |_: MouseEvent| {
            dom::copy_to_clipboard(text.clone());
            copied.set(true);
            let copied = copied.clone();
            after(COPIED_FEEDBACK_MS, move || copied.set(false));
        })
    };

    let on_style_change = {
        let default_style = default_style.clone();
        let extractor = props.extractor.clone();
        Callback::from(move |event: Event| {
            let select: HtmlSelectElement = event.target_unchecked_into();
            let style = select.value();
            default_style.set(style.clone());

            let extractor = extractor.clone();
            spawn_local(async move {
                storage::set_value(extractor.store(), keys::DEFAULT_STYLE, &style).await;
            });
        })
    };

    let viewport_width = web_sys::window()
        .map(|w| dom::viewport_size(&w).0)
        .unwrap_or(PANEL_WIDTH);
    let (left, top) = open.anchor.panel_position(viewport_width);
    let panel_style = format!(
        "position: absolute; left: {}px; top: {}px; width: {}px; z-index: 2147483646; background: #0f172a; color: white; border-radius: 12px; box-shadow: 0 10px 30px rgba(0, 0, 0, 0.3); padding: 12px; font-family: Inter, sans-serif; display: flex; flex-direction: column; gap: 10px;",
        left, top, PANEL_WIDTH
    );

    let labels = props.config.borrow().styles.labels();
    let selected_index = props.config.borrow().styles.label_index(&default_style);

    html! {
        <div ref={panel_ref} class="plotset-snap-popover" style={panel_style}>
            <div style="display: flex; justify-content: space-between; align-items: center;">
                <span style="font-weight: 600; font-size: 14px;">{"PlotSet"}</span>
                <Button onclick={on_close} variant={ButtonVariant::Icon}>{"×"}</Button>
            </div>

            <div
                dir={if open.rtl { "rtl" } else { "ltr" }}
                style="max-height: 120px; overflow-y: auto; font-size: 12px; line-height: 1.5; color: rgba(255, 255, 255, 0.8);"
            >
                {&open.text}
            </div>

            <select
                onchange={on_style_change}
                style="padding: 6px; border-radius: 6px; font-size: 12px; background: #1e293b; color: white; border: 1px solid #334155;"
            >
                {for labels.iter().enumerate().map(|(index, label)| html! {
                    <option value={label.clone()} selected={index == selected_index}>{label}</option>
                })}
            </select>

            {match &*panel_state {
                PanelState::Idle => html! {
                    <Button onclick={on_extract}>{"Extract data"}</Button>
                },
                PanelState::Loading => html! {
                    <Spinner message={"Extracting data...".to_string()} />
                },
                PanelState::Done(result) => html! {
                    <ResultActions result={result.clone()} />
                },
            }}

            <Button onclick={on_copy} variant={ButtonVariant::Secondary}>
                {if *copied { "✓ Copied" } else { "Copy" }}
            </Button>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ResultActionsProps {
    pub result: ExtractionResult,
}

/// Download, share and preview links for a finished extraction
#[function_component(ResultActions)]
pub fn result_actions(props: &ResultActionsProps) -> Html {
    let on_download = {
        let url = props.result.dataset_download_url.clone();
        Callback::from(move |_: MouseEvent| {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            if let Err(e) = dom::download(&document, &url, DATASET_FILE_NAME) {
                log::error!("Download failed: {:?}", e);
            }
        })
    };

    let on_share = {
        let url = props.result.share_url.clone();
        Callback::from(move |_: MouseEvent| dom::open_in_new_tab(&url))
    };

    let on_preview = {
        let url = props.result.preview_link.clone();
        Callback::from(move |_: MouseEvent| dom::open_in_new_tab(&url))
    };

    html! {
        <div style="display: flex; flex-direction: column; gap: 8px;">
            if let Some(thumbnail) = &props.result.thumbnail_url {
                <img
                    src={thumbnail.clone()}
                    alt="Chart preview"
                    style="width: 100%; border-radius: 8px; cursor: pointer;"
                    onclick={on_preview.clone()}
                />
            }
            <div style="display: flex; gap: 8px;">
                <Button onclick={on_download}>{"Download"}</Button>
                <Button onclick={on_share}>{"Share"}</Button>
            </div>
            <Button onclick={on_preview} variant={ButtonVariant::Secondary}>{"Open in PlotSet"}</Button>
        </div>
    }
}
