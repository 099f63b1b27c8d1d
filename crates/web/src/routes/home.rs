//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use super::layout::HeaderView;
use crate::filters;
use crate::middleware::{RequireAuth, take_toasts};
use crate::models::Toast;
use crate::state::AppState;

/// Featured repository card.
#[derive(Clone)]
pub struct RepositoryCard {
    pub name: &'static str,
    pub description: &'static str,
    pub url: String,
}

/// A quick link tile.
#[derive(Clone)]
pub struct QuickLink {
    pub title: &'static str,
    pub href: &'static str,
}

/// Quick link tiles, in display order.
const QUICK_LINKS: [QuickLink; 3] = [
    QuickLink {
        title: "Dashboard",
        href: "/",
    },
    QuickLink {
        title: "Profile",
        href: "/profile",
    },
    QuickLink {
        title: "Settings",
        href: "/profile",
    },
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub header: Option<HeaderView>,
    pub toasts: Vec<Toast>,
    pub greeting_name: String,
    pub repository: RepositoryCard,
    pub quick_links: Vec<QuickLink>,
}

/// Display the home page.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    let header = HeaderView::load(&state, &user).await;

    HomeTemplate {
        header: Some(header),
        toasts: take_toasts(&session).await,
        greeting_name: user.greeting_name().to_string(),
        repository: RepositoryCard {
            name: "Techplement",
            description: "A modern authentication system. Features include user \
                          management, profile updates, and secure storage.",
            url: state.config().repository_url.clone(),
        },
        quick_links: QUICK_LINKS.to_vec(),
    }
}
