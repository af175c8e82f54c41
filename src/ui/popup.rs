/// Extension popup: login form and account dashboard

use crate::activity::{Activity, ActivityLog, ActivityStatus};
use crate::api::ApiClient;
use crate::browser::ChromeStore;
use crate::session::{self, Session, UserProfile};
use crate::settings::{ApiConfig, Settings, keys};
use crate::storage;
use patternfly_yew::prelude::*;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

/// Number of activities listed on the dashboard
const RECENT_ACTIVITY_COUNT: usize = 5;

#[derive(Clone, PartialEq)]
enum View {
    Loading,
    Login,
    Dashboard,
}

#[function_component(App)]
pub fn app() -> Html {
    let view = use_state(|| View::Loading);
    let profile = use_state(UserProfile::default);
    let activities = use_state(ActivityLog::new);
    let settings = use_state(Settings::default);
    let api = use_memo((), |_| ApiClient::new(ApiConfig::default()));

    // Refresh everything shown on the dashboard from storage
    let refresh = {
        let view = view.clone();
        let profile = profile.clone();
        let activities = activities.clone();
        let settings = settings.clone();
        Callback::from(move |_: ()| {
            let view = view.clone();
            let profile = profile.clone();
            let activities = activities.clone();
            let settings = settings.clone();
            spawn_local(async move {
                let store = ChromeStore;
                let session = Session::load(&store).await;
                if session.authorized_token().is_none() {
                    view.set(View::Login);
                    return;
                }

                profile.set(UserProfile::load(&store).await.unwrap_or_default());
                activities.set(ActivityLog::load(&store).await);
                settings.set(Settings::load(&store).await);
                view.set(View::Dashboard);
            });
        })
    };

    {
        let refresh = refresh.clone();
        use_effect_with((), move |_| {
            refresh.emit(());
            || ()
        });
    }

    let on_logout = {
        let view = view.clone();
        Callback::from(move |_: MouseEvent| {
            let view = view.clone();
            spawn_local(async move {
                session::logout(&ChromeStore).await;
                log::info!("Logged out");
                view.set(View::Login);
            });
        })
    };

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"PlotSet Snap"}</h1>
            {match &*view {
                View::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                View::Login => html! {
                    <LoginForm api={api.clone()} on_login={refresh.clone()} />
                },
                View::Dashboard => html! {
                    <Dashboard
                        profile={(*profile).clone()}
                        activities={(*activities).clone()}
                        settings={(*settings).clone()}
                        on_logout={on_logout.clone()}
                    />
                },
            }}
        </div>
    }
}

#[derive(Properties)]
struct LoginFormProps {
    api: Rc<ApiClient>,
    on_login: Callback<()>,
}

impl PartialEq for LoginFormProps {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.api, &other.api) && self.on_login == other.on_login
    }
}

#[function_component(LoginForm)]
fn login_form(props: &LoginFormProps) -> Html {
    let email = use_state(String::new);
    let password = use_state(String::new);
    let error = use_state(|| None::<String>);
    let submitting = use_state(|| false);

    let on_email = {
        let email = email.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                email.set(input.value());
            }
        })
    };

    let on_password = {
        let password = password.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                password.set(input.value());
            }
        })
    };

    let on_submit = {
        let email = email.clone();
        let password = password.clone();
        let error = error.clone();
        let submitting = submitting.clone();
        let api = props.api.clone();
        let on_login = props.on_login.clone();
        Callback::from(move |_: MouseEvent| {
            if let Err(message) = session::validate_credentials(&email, &password) {
                error.set(Some(message.to_string()));
                return;
            }

            let email = (*email).clone();
            let password = (*password).clone();
            let error = error.clone();
            let submitting = submitting.clone();
            let api = api.clone();
            let on_login = on_login.clone();

            error.set(None);
            submitting.set(true);
            spawn_local(async move {
                match session::login(&ChromeStore, &api, &email, &password).await {
                    Ok(_) => on_login.emit(()),
                    Err(e) => {
                        log::error!("Login error: {}", e);
                        error.set(Some(e.to_string()));
                    }
                }
                submitting.set(false);
            });
        })
    };

    html! {
        <div class="flex-column-gap">
            if let Some(message) = &*error {
                <Alert r#type={AlertType::Danger} title={"Could not log in"} inline={true}>
                    {message.clone()}
                </Alert>
            }
            <label class="pf-v5-c-form__label" for="email">{"Email"}</label>
            <input
                id="email"
                type="email"
                class="pf-v5-c-form-control"
                placeholder="you@example.com"
                value={(*email).clone()}
                oninput={on_email}
            />
            <label class="pf-v5-c-form__label" for="password">{"Password"}</label>
            <input
                id="password"
                type="password"
                class="pf-v5-c-form-control"
                value={(*password).clone()}
                oninput={on_password}
            />
            <Button onclick={on_submit} disabled={*submitting} variant={ButtonVariant::Primary} block={true}>
                {if *submitting { "Logging in..." } else { "Log in" }}
            </Button>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct DashboardProps {
    profile: UserProfile,
    activities: ActivityLog,
    settings: Settings,
    on_logout: Callback<MouseEvent>,
}

#[function_component(Dashboard)]
fn dashboard(props: &DashboardProps) -> Html {
    let enabled = use_state(|| props.settings.enabled);
    let min_words = use_state(|| props.settings.min_words);

    let on_toggle = {
        let enabled = enabled.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let checked = input.checked();
            enabled.set(checked);
            spawn_local(async move {
                storage::set_value(&ChromeStore, keys::ENABLED, &checked).await;
            });
        })
    };

    let on_min_words = {
        let min_words = min_words.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let Ok(value) = input.value().trim().parse::<usize>() else {
                log::warn!("Ignoring invalid word threshold: {}", input.value());
                return;
            };
            min_words.set(value);
            spawn_local(async move {
                storage::set_value(&ChromeStore, keys::MIN_WORDS, &value).await;
            });
        })
    };

    let profile = &props.profile;
    let credits = profile
        .credits
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());

    html! {
        <div class="flex-column-gap">
            <div class="profile-row">
                <div class="avatar">{profile.initials()}</div>
                <div>
                    <div class="profile-name">{profile.display_name()}</div>
                    <div class="profile-email">{&profile.email}</div>
                </div>
            </div>

            if profile.out_of_credits() {
                <Alert r#type={AlertType::Warning} title={"No credits left"} inline={true}>
                    {"Please purchase more credits to keep extracting."}
                </Alert>
            }

            <div class="stats-box">
                <div class="stat-item">
                    <span class="stat-domain">{"Credits"}</span>
                    <span class="stat-count">{credits}</span>
                </div>
                <div class="stat-item">
                    <span class="stat-domain">{"Processed"}</span>
                    <span class="stat-count">{props.activities.completed_count()}</span>
                </div>
            </div>

            <div class="stats-container">
                <h2 class="stats-title">{"Recent activity"}</h2>
                if props.activities.is_empty() {
                    <p class="message-text">{"No activity yet"}</p>
                } else {
                    <div class="stats-box">
                        {for props.activities.activities.iter().take(RECENT_ACTIVITY_COUNT).map(activity_row)}
                    </div>
                }
            </div>

            <label class="settings-row">
                <input type="checkbox" checked={*enabled} onchange={on_toggle} />
                {" Show popover on text selection"}
            </label>
            <label class="settings-row">
                {"Minimum words "}
                <input
                    type="number"
                    min="0"
                    class="pf-v5-c-form-control"
                    value={min_words.to_string()}
                    onchange={on_min_words}
                />
            </label>

            <Button onclick={props.on_logout.clone()} variant={ButtonVariant::Secondary} block={true}>
                {"Log out"}
            </Button>
        </div>
    }
}

fn activity_row(activity: &Activity) -> Html {
    let status = match activity.status {
        ActivityStatus::Processing => "Processing",
        ActivityStatus::Completed => "Completed",
        ActivityStatus::Failed => "Failed",
    };
    let when: String = js_sys::Date::new(&JsValue::from_f64(activity.timestamp))
        .to_locale_string("en-US", &JsValue::UNDEFINED)
        .into();

    html! {
        <div class="stat-item" key={activity.id.clone()}>
            <span class="stat-domain">{activity.action.label()}</span>
            <span class="stat-count" title={when}>{status}</span>
        </div>
    }
}
