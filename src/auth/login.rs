use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Form, Query},
    response::Redirect,
};
use axum_extra::extract::PrivateCookieJar;
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::Deserialize;
use url::Url;

use crate::{
    auth::{User, set_login_cookie},
    schema::users,
    state::Conn,
    template::Page,
    util_resp::{
        FailureResponse, StandardResponse, SuccessResponse, bad_request,
        success,
    },
    widgets::alert::ErrorAlert,
};

pub async fn login_page(user: Option<User<true>>) -> StandardResponse {
    if user.is_some() {
        return bad_request(
            Page::new()
                .user_opt(user)
                .body(maud! {
                    ErrorAlert
                        msg = "You are already logged in, so cannot log in!";
                })
                .render(),
        );
    }

    success(Page::new().user_opt(user).body(maud! {
        form method="post" {
            div class="form-group" {
                label for="email" { "Email address" }
                input type="email" class="form-control" id="email" name="id" placeholder="Enter email";
            }
            div class="form-group" {
                label for="password" { "Password" }
                input type="password" class="form-control" id="password" name="password" placeholder="Password";
            }
            button type="submit" class="btn btn-primary" { "Submit" }
        }
    }).render())
}

#[derive(Deserialize)]
pub struct LoginForm {
    id: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

pub async fn do_login(
    user: Option<User<true>>,
    Query(query): Query<LoginQuery>,
    jar: PrivateCookieJar,
    mut conn: Conn<true>,
    Form(form): Form<LoginForm>,
) -> Result<(PrivateCookieJar, SuccessResponse), FailureResponse> {
    let user1 = match users::table
        .filter(users::email.eq(&form.id).or(users::username.eq(&form.id)))
        .first::<User<true>>(&mut *conn)
        .optional()
        .map_err(|_| FailureResponse::ServerError(()))?
    {
        Some(user) => user,
        None => {
            return Err(FailureResponse::BadRequest(
                Page::new()
                    .user_opt(user)
                    .body(maud! {
                        ErrorAlert
                            msg =  "No such user exists. Please return to the
                                    previous page and try again.";
                    })
                    .render(),
            ));
        }
    };

    let parsed_hash = PasswordHash::new(&user1.password_hash)
        .map_err(|_| FailureResponse::ServerError(()))?;
    if Argon2::default()
        .verify_password(form.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        // todo: password rate limiting
        return Err(FailureResponse::BadRequest(
            Page::new()
                .user_opt(user)
                .body(maud! {
                    ErrorAlert msg =
                        "Incorrect password. Please return to the previous page
                         and try again.";
                })
                .render(),
        ));
    }

    let jar = set_login_cookie(user1.id, jar);

    let redirect_to = if let Some(url) =
        query.next.and_then(|url| url.parse::<Url>().ok())
    {
        url.path().to_string()
    } else {
        "/".to_string()
    };

    Ok((
        jar,
        SuccessResponse::SeeOther(Box::new(Redirect::to(&redirect_to))),
    ))
}
