/// Overlay button and action menu attached to a page image

use crate::activity::ActivityAction;
use crate::content::dom;
use crate::notice::Notice;
use crate::session::UserProfile;
use crate::ui::components::show_notice;
use crate::ui::popover::ResultActions;
use crate::workflow::{ExtractionResult, Extractor, Payload};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlElement, HtmlImageElement, Node};
use yew::prelude::*;

const MENU_ITEMS: [(&str, &str, &str); 3] = [
    ("extract", "📊", "Extract data"),
    ("chart", "📈", "Create chart"),
    ("analyze", "🔍", "Analyze image"),
];

#[derive(Properties, PartialEq)]
pub struct ImageOverlayProps {
    pub extractor: Extractor,
    pub image: HtmlImageElement,
}

/// Payload for the source `image` currently shows
pub fn image_payload(image: &HtmlImageElement) -> Payload {
    Payload::Image {
        src: image.current_src(),
    }
}

#[function_component(ImageOverlay)]
pub fn image_overlay(props: &ImageOverlayProps) -> Html {
    let menu_open = use_state(|| false);
    let busy = use_state(|| None::<ActivityAction>);
    let profile = use_state(|| None::<UserProfile>);
    let result = use_state(|| None::<ExtractionResult>);
    let root_ref = use_node_ref();

    // Close the menu on any click outside the overlay
    {
        let menu_open = menu_open.clone();
        let root_ref = root_ref.clone();
        use_effect_with((), move |_| {
            let document = web_sys::window().and_then(|w| w.document());
            let listener = Closure::<dyn Fn(web_sys::MouseEvent)>::new(move |event: web_sys::MouseEvent| {
                let inside = root_ref.cast::<Node>().is_some_and(|root| {
                    event
                        .target()
                        .and_then(|t| t.dyn_into::<Node>().ok())
                        .is_some_and(|target| root.contains(Some(&target)))
                });
                if !inside {
                    menu_open.set(false);
                }
            });

            if let Some(document) = &document {
                if let Err(e) = document
                    .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
                {
                    log::error!("Failed to add click listener: {:?}", e);
                }
            }

            move || {
                if let Some(document) = document {
                    let _ = document.remove_event_listener_with_callback(
                        "click",
                        listener.as_ref().unchecked_ref(),
                    );
                }
            }
        });
    }

    let on_toggle = {
        let menu_open = menu_open.clone();
        let profile = profile.clone();
        let extractor = props.extractor.clone();
        Callback::from(move |event: MouseEvent| {
            event.stop_propagation();
            event.prevent_default();

            let opening = !*menu_open;
            menu_open.set(opening);
            if opening {
                let profile = profile.clone();
                let extractor = extractor.clone();
                spawn_local(async move {
                    profile.set(UserProfile::load(extractor.store()).await);
                });
            }
        })
    };

    let on_action = {
        let menu_open = menu_open.clone();
        let busy = busy.clone();
        let result = result.clone();
        let extractor = props.extractor.clone();
        let image = props.image.clone();
        Callback::from(move |event: MouseEvent| {
            event.stop_propagation();
            let Some(action) = event
                .current_target()
                .and_then(|t| t.dyn_into::<HtmlElement>().ok())
                .and_then(|item| item.dataset().get("action"))
                .and_then(|a| ActivityAction::from_menu(&a))
            else {
                return;
            };
            if busy.is_some() {
                return;
            }
            menu_open.set(false);

            let busy = busy.clone();
            let result = result.clone();
            let extractor = extractor.clone();
            let payload = image_payload(&image);

            busy.set(Some(action));
            show_notice(Notice::started(action.label()));
            spawn_local(async move {
                match extractor.extract(action, payload, js_sys::Date::now()).await {
                    Ok(extraction) => {
                        show_notice(Notice::completed(action.label()));
                        result.set(Some(extraction));
                    }
                    Err(e) => show_notice(Notice::from_error(&e)),
                }
                busy.set(None);
            });
        })
    };

    let on_dismiss_result = {
        let result = result.clone();
        Callback::from(move |event: MouseEvent| {
            event.stop_propagation();
            result.set(None);
        })
    };

    let button_label = if busy.is_some() { "⏳" } else { "📊" };

    html! {
        <div ref={root_ref} class="plotset-snap-overlay" style="position: relative; font-family: Inter, sans-serif;">
            <button
                class="plotset-snap-overlay-button"
                title="PlotSet"
                onclick={on_toggle}
                style="width: 32px; height: 32px; border-radius: 9999px; border: none; background: #193cb8; color: white; cursor: pointer; box-shadow: 0 2px 8px rgba(0, 0, 0, 0.25); font-size: 16px;"
            >
                {button_label}
            </button>

            if *menu_open {
                <div
                    class="plotset-snap-menu"
                    style="position: absolute; top: 38px; right: 0; width: 220px; background: white; color: #111827; border-radius: 10px; box-shadow: 0 8px 24px rgba(0, 0, 0, 0.2); overflow: hidden;"
                >
                    <ProfileHeader profile={(*profile).clone()} />
                    {for MENU_ITEMS.iter().map(|(action, icon, label)| html! {
                        <div
                            class="plotset-snap-menu-item"
                            data-action={*action}
                            onclick={on_action.clone()}
                            style="display: flex; gap: 8px; align-items: center; padding: 10px 12px; font-size: 13px; cursor: pointer;"
                        >
                            <span>{*icon}</span>
                            <span>{*label}</span>
                        </div>
                    })}
                </div>
            }

            if let Some(extraction) = &*result {
                <div
                    style="position: absolute; top: 38px; right: 0; width: 260px; background: #0f172a; color: white; border-radius: 10px; padding: 10px; box-shadow: 0 8px 24px rgba(0, 0, 0, 0.3);"
                >
                    <div style="display: flex; justify-content: flex-end;">
                        <button
                            onclick={on_dismiss_result}
                            style="background: none; border: none; color: rgba(255, 255, 255, 0.6); cursor: pointer;"
                        >
                            {"×"}
                        </button>
                    </div>
                    <ResultActions result={extraction.clone()} />
                </div>
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct ProfileHeaderProps {
    profile: Option<UserProfile>,
}

#[function_component(ProfileHeader)]
fn profile_header(props: &ProfileHeaderProps) -> Html {
    let Some(profile) = &props.profile else {
        return html! {
            <div style="padding: 10px 12px; font-size: 12px; color: #6b7280; border-bottom: 1px solid #e5e7eb;">
                {"Not logged in"}
            </div>
        };
    };

    html! {
        <div style="display: flex; gap: 10px; align-items: center; padding: 10px 12px; border-bottom: 1px solid #e5e7eb;">
            <div style="width: 32px; height: 32px; border-radius: 9999px; background: #193cb8; color: white; display: flex; align-items: center; justify-content: center; font-size: 12px; font-weight: 600;">
                {profile.initials()}
            </div>
            <div style="flex: 1; min-width: 0;">
                <div style="font-size: 13px; font-weight: 600;">{profile.display_name()}</div>
                <div style="font-size: 11px; color: #6b7280; overflow: hidden; text-overflow: ellipsis;">{&profile.email}</div>
            </div>
            if let Some(credits) = profile.credits {
                <span style="font-size: 11px; color: #193cb8;">{format!("{} credits", credits)}</span>
            }
        </div>
    }
}

/// Position the host element of an overlay over `image`
pub fn place_host(host: &HtmlElement, image: &HtmlImageElement) -> Result<(), JsValue> {
    let Some(window) = web_sys::window() else {
        return Ok(());
    };
    let (scroll_x, scroll_y) = dom::scroll_offsets(&window);
    let (top, left) = crate::images::overlay_position(&dom::image_rect(image), scroll_x, scroll_y);

    let style = host.style();
    style.set_property("position", "absolute")?;
    style.set_property("top", &format!("{}px", top))?;
    style.set_property("left", &format!("{}px", left))?;
    style.set_property("z-index", "2147483645")?;
    Ok(())
}
