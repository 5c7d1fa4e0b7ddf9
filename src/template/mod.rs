//! Templating code.
//!
//! This defines the [`Page`] item, which is used in most of the other parts of
//! this crate.

use hypertext::prelude::*;

use crate::{auth::User, events::Event};

pub struct Page<R: Renderable, const TX: bool> {
    body: Option<R>,
    user: Option<User<TX>>,
    event: Option<Event>,
}

impl<R: Renderable, const TX: bool> Page<R, TX> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    pub fn body(mut self, body: R) -> Self {
        self.body = Some(body);
        self
    }

    pub fn user(mut self, user: User<TX>) -> Self {
        self.user = Some(user);
        self
    }

    pub fn user_opt(mut self, user: Option<User<TX>>) -> Self {
        self.user = user;
        self
    }
}

impl<R: Renderable, const TX: bool> Renderable for Page<R, TX> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            html {
                head {
                    title { "Podium" }
                    script src="https://cdn.jsdelivr.net/npm/htmx.org@2.0.7/dist/htmx.min.js" integrity="sha384-ZBXiYtYQ6hJ2Y0ZNoYuI+Nq5MqWBr+chMrS/RkXpNzQCApHEhOt2aY8EJgqwHLkJ" crossorigin="anonymous" {
                    }
                    link
                        href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css"
                        rel="stylesheet";
                    meta
                        name="viewport"
                        content="width=device-width, initial-scale=1";
                }
                body class="d-flex flex-column vh-100" {
                    nav class="navbar navbar-expand"
                        style="background-color: #284559; display: flex; justify-content: space-between; align-items: center;"
                        data-bs-theme="dark" {
                        div class="container-fluid" style="display: flex; justify-content: space-between; align-items: center;" {
                            @if let Some(event) = &self.event {
                                a class="navbar-brand text-white"
                                  href=(format!("/events/{}", event.id)) {
                                    (event.name)
                                }
                            } @else {
                                a class="navbar-brand text-white" href="/" {
                                    "Home"
                                }
                            }
                            @if let Some(event) = &self.event {
                                ul class="navbar-nav" style="display: flex; gap: 1rem;" data-bs-theme="dark" {
                                    li class="nav-item" {
                                        a class="nav-link text-white" href=(format!("/events/{}/teams", event.id)) {
                                            "Teams"
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href=(format!("/events/{}/categories", event.id)) {
                                            "Categories"
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href=(format!("/events/{}/judges", event.id)) {
                                            "Judges"
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href=(format!("/events/{}/rounds", event.id)) {
                                            "Rounds"
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href=(format!("/events/{}/results", event.id)) {
                                            "Results"
                                        }
                                    }
                                }
                            }
                            div {
                                ul class="navbar-nav" style="display: flex; gap: 1rem;" data-bs-theme="dark" {
                                    @if let Some(user) = &self.user {
                                        li class="nav-item" {
                                            span class="nav-link text-white" {
                                                (user.username)
                                            }
                                        }
                                    } @else {
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/login" {
                                                "Login"
                                            }
                                        }
                                        li class="nav-item" {
                                            a class="nav-link text-white" href="/register" {
                                                "Register"
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                    div class="flex-grow-1" {
                        @if let Some(body) = &self.body {
                            (body)
                        }
                    }
                }
            }
        }
        .render_to(buffer)
    }
}

impl<R: Renderable, const TX: bool> Default for Page<R, TX> {
    fn default() -> Self {
        Self {
            body: Default::default(),
            user: Default::default(),
            event: Default::default(),
        }
    }
}
