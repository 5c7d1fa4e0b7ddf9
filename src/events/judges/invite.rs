//! Judge invitation endpoint.
//!
//! This renders the invitation email a judge would receive and returns it as
//! a preview; it does not deliver anything. The intended recipient is logged
//! so an operator can see what would have been sent.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hypertext::{Raw, prelude::*};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRequest {
    pub judge_name: String,
    pub judge_email: String,
    pub event_name: String,
    pub access_token: String,
    pub dashboard_url: String,
}

#[derive(Serialize)]
pub struct InvitationResponse {
    pub success: bool,
    pub message: String,
    pub preview: String,
}

#[derive(Serialize)]
pub struct InvitationError {
    pub success: bool,
    pub error: String,
}

fn invitation_error(error: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(InvitationError {
            success: false,
            error,
        }),
    )
        .into_response()
}

/// The email body. Judge and event names come from the caller; they are run
/// through ammonia (which strips scripts and other active content) and then
/// embedded as already-safe HTML.
pub fn render_invitation_email(req: &InvitationRequest) -> String {
    let judge_name = Raw::dangerously_create(ammonia::clean(&req.judge_name));
    let event_name = Raw::dangerously_create(ammonia::clean(&req.event_name));
    let access_token = ammonia::clean_text(&req.access_token);

    maud! {
        html {
            body style="font-family: sans-serif; max-width: 600px;" {
                h1 { "You have been invited to judge " (event_name) }
                p {
                    "Hello " (judge_name) ","
                }
                p {
                    "You have been registered as a judge for "
                    strong { (event_name) }
                    ". Your personal judging dashboard is available at the
                     link below. The link contains your access code, so do
                     not share it."
                }
                p {
                    a href=(format!("{}/{}", req.dashboard_url.trim_end_matches('/'), access_token)) {
                        "Open your judging dashboard"
                    }
                }
                p {
                    "Access code: " code { (access_token) }
                }
                p {
                    "Scores can only be submitted while a round is open, so
                     please check the schedule with the organizers."
                }
            }
        }
    }
    .render()
    .into_inner()
}

pub async fn send_judge_invitation(body: String) -> Response {
    // Parsing is done by hand so that a malformed body surfaces as the same
    // `{success: false, error}` shape as a rendering failure.
    let req: InvitationRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => {
            return invitation_error(format!("invalid request body: {e}"));
        }
    };

    if Url::parse(&req.dashboard_url).is_err() {
        return invitation_error(format!(
            "invalid dashboard url: {}",
            req.dashboard_url
        ));
    }

    let preview = render_invitation_email(&req);

    tracing::info!(
        judge = %req.judge_name,
        recipient = %req.judge_email,
        event = %req.event_name,
        "invitation rendered (delivery is disabled; preview returned)"
    );

    Json(InvitationResponse {
        success: true,
        message: format!(
            "Invitation for {} prepared (not delivered)",
            req.judge_email
        ),
        preview,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_contains_token_and_event() {
        let req = InvitationRequest {
            judge_name: "Ana".to_string(),
            judge_email: "a@x.com".to_string(),
            event_name: "HackX".to_string(),
            access_token: "tok123".to_string(),
            dashboard_url: "https://d.example/judge".to_string(),
        };

        let preview = render_invitation_email(&req);
        assert!(preview.contains("tok123"));
        assert!(preview.contains("HackX"));
        assert!(preview.contains("https://d.example/judge/tok123"));
    }

    #[test]
    fn markup_in_names_is_neutralized() {
        let req = InvitationRequest {
            judge_name: "<script>alert(1)</script>".to_string(),
            judge_email: "a@x.com".to_string(),
            event_name: "HackX".to_string(),
            access_token: "tok123".to_string(),
            dashboard_url: "https://d.example/judge".to_string(),
        };

        let preview = render_invitation_email(&req);
        assert!(!preview.contains("<script>"));
    }
}
