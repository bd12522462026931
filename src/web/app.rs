use std::collections::HashMap;

use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;
use tracing::{error, info};

use super::{Organizer, Page, Workspace};
use crate::error::AppError;
use crate::form::FormFields;
use crate::router::{NavOutcome, NavigateOptions};

fn to_route(route: &str) -> Redirect {
    Redirect::to(format!("/app/{route}"))
}

fn page_context(workspace: &Workspace) -> serde_json::Value {
    let ctx = workspace.shell.context();
    let settings = ctx.settings();
    let view = workspace.shell.current_view();
    json!({
        "username": ctx.user.username,
        "theme": settings.theme,
        "language": settings.language,
        "tabs": workspace.router.tabs(),
        "route": workspace.router.current_route(),
        "fragment": workspace.router.fragment(),
        "can_go_back": workspace.router.can_go_back(),
        "can_go_forward": workspace.router.can_go_forward(),
        "module": view.map(|v| v.template),
        "view": view.map(|v| &v.context),
        "toasts": workspace.take_toasts(),
    })
}

/// Navigates the session's router. A fallback becomes a redirect so the
/// address bar follows the module that actually loaded.
async fn navigate(
    workspace: &mut Workspace,
    route: &str,
    options: NavigateOptions,
) -> Result<Option<Redirect>, Status> {
    let Workspace { shell, router } = workspace;
    match router.navigate(shell, route, options).await {
        Ok(NavOutcome::FellBack { requested, to }) => {
            shell
                .context()
                .notify_error(format!("{requested} is unavailable right now"));
            Ok(Some(to_route(&to)))
        }
        Ok(_) => Ok(None),
        Err(err @ AppError::UnknownRoute(_)) => Err(err.status()),
        Err(err) => {
            error!(route, error = %err, "navigation failed");
            Err(err.status())
        }
    }
}

/// Sends the browser to the session's current route. Before the first
/// navigation `start` (a route name or `#fragment`) picks the landing module.
#[get("/?<start>")]
pub async fn index(start: Option<&str>, state: &State<Organizer>, cookies: &CookieJar<'_>) -> Page {
    let (token, user) = match state.require_user(cookies) {
        Ok(found) => found,
        Err(redirect) => return Page::Redirect(redirect),
    };
    let workspace = match state.workspace(&token, user).await {
        Ok(workspace) => workspace,
        Err(err) => return Page::Status(err.status()),
    };
    let workspace = workspace.lock().await;
    let route = match workspace.router.current_route() {
        Some(current) => current.to_string(),
        None => workspace.router.initial_route(start),
    };
    Page::Redirect(to_route(&route))
}

#[get("/app/<route>?<refresh>")]
pub async fn page(
    route: &str,
    refresh: Option<bool>,
    state: &State<Organizer>,
    cookies: &CookieJar<'_>,
) -> Page {
    let (token, user) = match state.require_user(cookies) {
        Ok(found) => found,
        Err(redirect) => return Page::Redirect(redirect),
    };
    let workspace = match state.workspace(&token, user).await {
        Ok(workspace) => workspace,
        Err(err) => return Page::Status(err.status()),
    };
    let mut workspace = workspace.lock().await;

    let options = if refresh.unwrap_or(false) {
        NavigateOptions::forced()
    } else {
        NavigateOptions::default()
    };
    match navigate(&mut workspace, route, options).await {
        Ok(Some(redirect)) => Page::Redirect(redirect),
        Ok(None) => Page::Html(Template::render("app", page_context(&workspace))),
        Err(status) => Page::Status(status),
    }
}

/// Just the module markup, for swapping the content area in place.
#[get("/app/<route>/fragment")]
pub async fn fragment(route: &str, state: &State<Organizer>, cookies: &CookieJar<'_>) -> Page {
    let (token, user) = match state.require_user(cookies) {
        Ok(found) => found,
        Err(redirect) => return Page::Redirect(redirect),
    };
    let workspace = match state.workspace(&token, user).await {
        Ok(workspace) => workspace,
        Err(err) => return Page::Status(err.status()),
    };
    let mut workspace = workspace.lock().await;

    match navigate(&mut workspace, route, NavigateOptions::default()).await {
        Ok(Some(redirect)) => return Page::Redirect(redirect),
        Ok(None) => {}
        Err(status) => return Page::Status(status),
    }
    let Some(template) = workspace.shell.current_view().map(|v| v.template) else {
        return Page::Status(Status::ServiceUnavailable);
    };
    Page::Html(Template::render(
        format!("modules/{template}"),
        page_context(&workspace),
    ))
}

#[post("/app/<route>/<action>", data = "<form>")]
pub async fn action(
    route: &str,
    action: &str,
    form: Form<HashMap<String, String>>,
    state: &State<Organizer>,
    cookies: &CookieJar<'_>,
) -> Page {
    let (token, user) = match state.require_user(cookies) {
        Ok(found) => found,
        Err(redirect) => return Page::Redirect(redirect),
    };
    let workspace = match state.workspace(&token, user).await {
        Ok(workspace) => workspace,
        Err(err) => return Page::Status(err.status()),
    };
    let mut workspace = workspace.lock().await;

    match navigate(&mut workspace, route, NavigateOptions::default()).await {
        Ok(Some(redirect)) => return Page::Redirect(redirect),
        Ok(None) => {}
        Err(status) => return Page::Status(status),
    }
    info!(route, action, user = workspace.shell.context().user_id(), "dispatching action");
    let fields = FormFields::new(form.into_inner());
    if let Err(err) = workspace.shell.dispatch(action, &fields).await {
        return Page::Status(err.status());
    }
    Page::Redirect(to_route(route))
}

async fn step_history(state: &State<Organizer>, cookies: &CookieJar<'_>, delta: isize) -> Page {
    let (token, user) = match state.require_user(cookies) {
        Ok(found) => found,
        Err(redirect) => return Page::Redirect(redirect),
    };
    let workspace = match state.workspace(&token, user).await {
        Ok(workspace) => workspace,
        Err(err) => return Page::Status(err.status()),
    };
    let mut workspace = workspace.lock().await;
    let Workspace { shell, router } = &mut *workspace;

    let outcome = if delta < 0 {
        router.back(shell).await
    } else {
        router.forward(shell).await
    };
    if let Err(err) = outcome {
        return Page::Status(err.status());
    }
    let route = router.current_route().unwrap_or(router.default_route());
    Page::Redirect(to_route(route))
}

#[get("/app/back")]
pub async fn back(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Page {
    step_history(state, cookies, -1).await
}

#[get("/app/forward")]
pub async fn forward(state: &State<Organizer>, cookies: &CookieJar<'_>) -> Page {
    step_history(state, cookies, 1).await
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};

    use crate::web::testing::signed_in;

    #[rocket::async_test]
    async fn renders_dashboard_and_active_tab() {
        let (_dir, client) = signed_in().await;
        let response = client.get("/").dispatch().await;
        assert_eq!(response.headers().get_one("Location"), Some("/app/dashboard"));

        let response = client.get("/app/dashboard").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("data-route=\"dashboard\""));
        assert!(body.contains("tab active"));
    }

    #[rocket::async_test]
    async fn actions_redirect_back_and_show_results() {
        let (_dir, client) = signed_in().await;
        let response = client
            .post("/app/expenses/add")
            .header(ContentType::Form)
            .body("amount=12.50&category=groceries")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/app/expenses"));

        let body = client
            .get("/app/expenses")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(body.contains("groceries"));
        assert!(body.contains("12.50"));
        assert!(body.contains("Expense added"));

        let fragment = client
            .get("/app/expenses/fragment")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(fragment.contains("groceries"));
        assert!(!fragment.contains("<html"));
    }

    #[rocket::async_test]
    async fn unknown_routes_and_unavailable_widgets() {
        let (_dir, client) = signed_in().await;
        let response = client.get("/app/inbox").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get("/app/weather").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/app/dashboard"));
        let body = client
            .get("/app/dashboard")
            .dispatch()
            .await
            .into_string()
            .await
            .unwrap();
        assert!(body.contains("weather is unavailable right now"));
    }

    #[rocket::async_test]
    async fn first_visit_honours_start_route() {
        let (_dir, client) = signed_in().await;
        let response = client.get("/?start=%23calendar").dispatch().await;
        assert_eq!(response.headers().get_one("Location"), Some("/app/calendar"));

        client.get("/app/calendar").dispatch().await;
        let response = client.get("/?start=news").dispatch().await;
        assert_eq!(response.headers().get_one("Location"), Some("/app/calendar"));
    }

    #[rocket::async_test]
    async fn back_and_forward_follow_history() {
        let (_dir, client) = signed_in().await;
        for route in ["/app/dashboard", "/app/tasks", "/app/calendar"] {
            client.get(route).dispatch().await;
        }
        let response = client.get("/app/back").dispatch().await;
        assert_eq!(response.headers().get_one("Location"), Some("/app/tasks"));
        let response = client.get("/app/forward").dispatch().await;
        assert_eq!(response.headers().get_one("Location"), Some("/app/calendar"));
    }
}
