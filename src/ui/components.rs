/// Reusable in-page components. These render on third-party pages, so they
/// carry their own inline styles.

use crate::notice::{Notice, NoticeKind};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use yew::AppHandle;
use yew::prelude::*;

const NOTICE_CONTAINER_ID: &str = "plotset-snap-notices";
const NOTICE_LIFETIME_MS: i32 = 5000;

/// Run `f` once after `ms` milliseconds
pub fn after(ms: i32, f: impl FnOnce() + 'static) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once_into_js(f);
    if let Err(e) = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), ms)
    {
        log::warn!("Failed to schedule timer: {:?}", e);
    }
}

/// Counts UI states so an async run can tell whether the state it
/// started from is still the one on screen
#[derive(Debug, Default)]
pub struct RunGeneration {
    current: Cell<u64>,
}

impl RunGeneration {
    pub fn current(&self) -> u64 {
        self.current.get()
    }

    /// Invalidate every run started before this call
    pub fn advance(&self) -> u64 {
        let next = self.current.get() + 1;
        self.current.set(next);
        next
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current.get() == generation
    }
}

#[derive(Properties, PartialEq)]
pub struct SpinnerProps {
    #[prop_or_default]
    pub message: Option<String>,
}

#[function_component(Spinner)]
pub fn spinner(props: &SpinnerProps) -> Html {
    html! {
        <div class="plotset-snap-loading">
            <div class="plotset-snap-spinner"></div>
            if let Some(msg) = &props.message {
                <p class="plotset-snap-loading-message">{msg}</p>
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ButtonProps {
    pub onclick: Callback<MouseEvent>,
    pub children: Children,
    #[prop_or(false)]
    pub disabled: bool,
    #[prop_or_default]
    pub variant: ButtonVariant,
}

#[derive(PartialEq, Clone, Default)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Secondary,
    Icon,
}

#[function_component(Button)]
pub fn button(props: &ButtonProps) -> Html {
    let base_style = "padding: 8px; border: none; border-radius: 9999px; font-size: 12px; display: flex; gap: 8px; justify-content: center; align-items: center; transition: background-color 0.2s;";

    let variant_style = match props.variant {
        ButtonVariant::Primary => "background-color: #193cb8; color: white; width: 100%;",
        ButtonVariant::Secondary => "background-color: #14b8a6; color: white; padding: 4px;",
        ButtonVariant::Icon => "background: transparent; color: rgba(255, 255, 255, 0.6); font-size: 20px; width: 24px; height: 24px; padding: 4px;",
    };

    let cursor_style = if props.disabled {
        "opacity: 0.6; cursor: not-allowed;"
    } else {
        "cursor: pointer;"
    };

    let style = format!("{} {} {}", base_style, variant_style, cursor_style);

    html! {
        <button
            onclick={props.onclick.clone()}
            disabled={props.disabled}
            style={style}
        >
            {props.children.clone()}
        </button>
    }
}

#[derive(Properties, PartialEq)]
pub struct ToastProps {
    pub notice: Notice,
    /// Fired once the notice should go away, by timeout or close button
    pub on_dismiss: Callback<()>,
}

#[function_component(Toast)]
pub fn toast(props: &ToastProps) -> Html {
    {
        let on_dismiss = props.on_dismiss.clone();
        use_effect_with((), move |_| {
            after(NOTICE_LIFETIME_MS, move || on_dismiss.emit(()));
            || ()
        });
    }

    let on_close = props.on_dismiss.reform(|_: MouseEvent| ());

    let notice = &props.notice;
    let accent = match notice.kind {
        NoticeKind::Info => "#3b82f6",
        NoticeKind::Success => "#10b981",
        NoticeKind::Warning => "#f59e0b",
        NoticeKind::Error => "#ef4444",
    };

    html! {
        <div
            class={format!("plotset-snap-notification plotset-snap-notification-{}", notice.kind.css_suffix())}
            style={format!("display: flex; align-items: flex-start; background: white; border-radius: 8px; box-shadow: 0 4px 12px rgba(0, 0, 0, 0.15); padding: 12px; margin-top: 10px; border-left: 4px solid {};", accent)}
        >
            <div style="flex: 1; min-width: 0;">
                <div style="font-weight: 600; font-size: 14px; color: #111827; margin-bottom: 2px;">{&notice.title}</div>
                <div style="font-size: 12px; color: #6b7280;">{&notice.message}</div>
            </div>
            <button
                onclick={on_close}
                style="background: none; border: none; color: #9ca3af; cursor: pointer; margin-left: 8px;"
            >
                {"×"}
            </button>
        </div>
    }
}

/// Show a notice in the bottom-right corner of the page
pub fn show_notice(notice: Notice) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    let container = match document.get_element_by_id(NOTICE_CONTAINER_ID) {
        Some(container) => container,
        None => {
            let Ok(container) = document.create_element("div") else {
                return;
            };
            container.set_id(NOTICE_CONTAINER_ID);
            let _ = container.set_attribute(
                "style",
                "position: fixed; bottom: 20px; right: 20px; z-index: 2147483647; display: flex; flex-direction: column; gap: 10px; max-width: 320px; font-family: Inter, sans-serif;",
            );
            let Some(body) = document.body() else {
                return;
            };
            if body.append_child(&container).is_err() {
                return;
            }
            container
        }
    };

    let Ok(slot) = document.create_element("div") else {
        return;
    };
    if container.append_child(&slot).is_err() {
        return;
    }

    let mounted: Rc<RefCell<Option<AppHandle<Toast>>>> = Rc::new(RefCell::new(None));
    let on_dismiss = {
        let mounted = mounted.clone();
        let slot = slot.clone();
        Callback::from(move |_: ()| {
            let mounted = mounted.clone();
            let slot = slot.clone();
            // Unmount outside the toast's own handlers
            after(0, move || {
                if let Some(app) = mounted.borrow_mut().take() {
                    app.destroy();
                    slot.remove();
                }
            });
        })
    };

    let app = yew::Renderer::<Toast>::with_root_and_props(slot, ToastProps { notice, on_dismiss }).render();
    *mounted.borrow_mut() = Some(app);
}
