/// Landing page

use axum::response::Response;

use crate::{flash::IncomingFlash, session::MaybeUser, views};

/// `GET /`
pub async fn home(MaybeUser(user): MaybeUser, IncomingFlash(flash): IncomingFlash) -> Response {
    views::render(
        "Welcome to GatherEd",
        flash.as_ref(),
        user.as_ref(),
        &views::home(user.as_ref()),
    )
}
