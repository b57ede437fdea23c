use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, html};

use crate::{
    config::Config,
    entities::{category, movie},
    models::{ActorDetail, MovieDetail, ReviewThread},
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// Blocks shown beside every public page.
pub struct Sidebar {
    pub categories: Vec<category::Model>,
    pub last_movies: Vec<movie::Model>,
}

pub fn movie_list_page(
    cfg: &Config,
    heading: &str,
    movies: &[movie::Model],
    sidebar: &Sidebar,
) -> String {
    page(
        &cfg.site_title,
        heading,
        layout(
            cfg,
            sidebar,
            html! {
                h1 class="text-3xl font-bold text-gray-900" { (heading) }
                @if movies.is_empty() {
                    p class="mt-6 text-gray-600" { "No movies yet." }
                } @else {
                    div class="mt-6 grid gap-6 sm:grid-cols-2 lg:grid-cols-3" {
                        @for movie in movies {
                            a class="block bg-white shadow rounded-lg overflow-hidden hover:shadow-md" href=(movie.get_absolute_url()) {
                                img class="w-full h-64 object-cover" src=(cfg.media(&movie.poster)) alt=(movie.title);
                                div class="p-4" {
                                    h2 class="font-semibold text-gray-900" { (movie.title) }
                                    p class="text-sm text-gray-500" { (movie.year) " · " (movie.country) }
                                    @if !movie.tagline.is_empty() {
                                        p class="mt-2 text-sm text-gray-600 italic" { (movie.tagline) }
                                    }
                                }
                            }
                        }
                    }
                }
            },
        ),
    )
}

pub fn movie_page(cfg: &Config, detail: &MovieDetail, sidebar: &Sidebar) -> String {
    let movie = &detail.movie;

    page(
        &cfg.site_title,
        &movie.title,
        layout(
            cfg,
            sidebar,
            html! {
                div class="bg-white shadow rounded-lg p-6 flex flex-col md:flex-row gap-6" {
                    img class="w-56 rounded" src=(cfg.media(&movie.poster)) alt=(movie.title);
                    div {
                        h1 class="text-3xl font-bold text-gray-900" { (movie.title) " (" (movie.year) ")" }
                        @if !movie.tagline.is_empty() {
                            p class="mt-1 text-gray-500 italic" { (movie.tagline) }
                        }
                        dl class="mt-4 grid grid-cols-[auto,1fr] gap-x-4 gap-y-1 text-sm" {
                            dt class="text-gray-500" { "Country" } dd { (movie.country) }
                            dt class="text-gray-500" { "Premiere" } dd { (movie.world_premiere) }
                            @if let Some(category) = &detail.category {
                                dt class="text-gray-500" { "Category" }
                                dd { a class="text-blue-600" href=(category.get_absolute_url()) { (category.name) } }
                            }
                            dt class="text-gray-500" { "Directors" }
                            dd { (people(&detail.directors)) }
                            dt class="text-gray-500" { "Cast" }
                            dd { (people(&detail.actors)) }
                            dt class="text-gray-500" { "Genres" }
                            dd {
                                @for (i, genre) in detail.genres.iter().enumerate() {
                                    @if i > 0 { ", " }
                                    a class="text-blue-600" href=(genre.get_absolute_url()) { (genre.name) }
                                }
                            }
                            dt class="text-gray-500" { "Budget" } dd { "$" (movie.budget) }
                            dt class="text-gray-500" { "Fees in USA" } dd { "$" (movie.fees_in_usa) }
                            dt class="text-gray-500" { "Fees in world" } dd { "$" (movie.fees_in_world) }
                        }

                        div class="mt-4" {
                            @match &detail.rating {
                                Some(rating) => {
                                    p class="text-sm text-gray-700" {
                                        "Rating " (format!("{:.1}", rating.average)) " · " (rating.votes) " votes"
                                    }
                                },
                                None => {
                                    p class="text-sm text-gray-500" { "No votes yet." }
                                },
                            }
                            @if !detail.stars.is_empty() {
                                form class="mt-2 flex gap-2 items-center" method="post" action="/add-rating/" {
                                    input type="hidden" name="movie" value=(movie.id);
                                    select class="rounded border border-gray-300 px-2 py-1" name="star" {
                                        @for star in &detail.stars {
                                            option value=(star.id) { (star.value) }
                                        }
                                    }
                                    button class="rounded bg-blue-600 px-3 py-1 text-white" type="submit" { "Rate" }
                                }
                            }
                        }
                    }
                }

                div class="mt-6 bg-white shadow rounded-lg p-6" {
                    p class="text-gray-700 whitespace-pre-line" { (movie.description) }
                }

                @if !detail.shots.is_empty() {
                    div class="mt-6 grid gap-4 sm:grid-cols-3" {
                        @for shot in &detail.shots {
                            figure {
                                img class="rounded" src=(cfg.media(&shot.image)) alt=(shot.title);
                                figcaption class="mt-1 text-xs text-gray-500" { (shot.title) }
                            }
                        }
                    }
                }

                div class="mt-6 bg-white shadow rounded-lg p-6" {
                    h2 class="text-xl font-semibold text-gray-900" { "Reviews" }
                    @for thread in &detail.reviews {
                        (review_thread(movie.id, thread))
                    }
                    h3 class="mt-6 font-semibold text-gray-900" { "Leave a review" }
                    (review_form(movie.id, None))
                }
            },
        ),
    )
}

pub fn actor_page(cfg: &Config, detail: &ActorDetail, sidebar: &Sidebar) -> String {
    let actor = &detail.actor;

    page(
        &cfg.site_title,
        &actor.name,
        layout(
            cfg,
            sidebar,
            html! {
                div class="bg-white shadow rounded-lg p-6 flex gap-6" {
                    img class="w-40 rounded" src=(cfg.media(&actor.image)) alt=(actor.name);
                    div {
                        h1 class="text-3xl font-bold text-gray-900" { (actor.name) }
                        p class="text-gray-500" { "Age " (actor.age) }
                        p class="mt-4 text-gray-700 whitespace-pre-line" { (actor.description) }
                    }
                }
                (film_links("Acted in", &detail.acted_in))
                (film_links("Directed", &detail.directed))
            },
        ),
    )
}

/// Sidebar block listing the result of `tags::get_last_movies`.
pub fn last_movies(cfg: &Config, movies: &[movie::Model]) -> Markup {
    html! {
        div class="bg-white shadow rounded-lg p-4" {
            h2 class="font-semibold text-gray-900" { "Recently added" }
            ul class="mt-3 space-y-3" {
                @for movie in movies {
                    li class="flex gap-3 items-center" {
                        img class="w-10 h-14 object-cover rounded" src=(cfg.media(&movie.poster)) alt=(movie.title);
                        a class="text-sm text-blue-600 hover:text-blue-800" href=(movie.get_absolute_url()) { (movie.title) }
                    }
                }
            }
        }
    }
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    page(
        "Error",
        status.canonical_reason().unwrap_or("Error"),
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

pub(crate) fn page(site: &str, title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | " (site) }
                script src=(TAILWIND_CDN) {}
            }
            body class="bg-gray-50" { (body) }
        }
    }
    .into_string()
}

fn layout(cfg: &Config, sidebar: &Sidebar, main: Markup) -> Markup {
    html! {
        header class="bg-white shadow" {
            div class="max-w-6xl mx-auto px-6 py-4" {
                a class="text-xl font-bold text-gray-900" href="/" { (cfg.site_title) }
            }
        }
        div class="max-w-6xl mx-auto px-6 py-8 grid gap-8 lg:grid-cols-[1fr,18rem]" {
            main { (main) }
            aside class="space-y-6" {
                div class="bg-white shadow rounded-lg p-4" {
                    h2 class="font-semibold text-gray-900" { "Categories" }
                    ul class="mt-3 space-y-1" {
                        @for category in &sidebar.categories {
                            li { a class="text-sm text-blue-600 hover:text-blue-800" href=(category.get_absolute_url()) { (category.name) } }
                        }
                    }
                }
                (last_movies(cfg, &sidebar.last_movies))
                div class="bg-white shadow rounded-lg p-4" {
                    h2 class="font-semibold text-gray-900" { "Contact us" }
                    form class="mt-3 space-y-2" method="post" action="/contact/" {
                        input class="w-full rounded border border-gray-300 px-2 py-1" type="email" name="email" placeholder="Your email" required;
                        button class="w-full rounded bg-blue-600 px-3 py-1 text-white" type="submit" { "Send" }
                    }
                }
            }
        }
    }
}

fn people(actors: &[crate::entities::actor::Model]) -> Markup {
    html! {
        @for (i, actor) in actors.iter().enumerate() {
            @if i > 0 { ", " }
            a class="text-blue-600" href=(actor.get_absolute_url()) { (actor.name) }
        }
    }
}

fn film_links(label: &str, movies: &[movie::Model]) -> Markup {
    html! {
        @if !movies.is_empty() {
            div class="mt-6 bg-white shadow rounded-lg p-6" {
                h2 class="text-xl font-semibold text-gray-900" { (label) }
                ul class="mt-3 space-y-1" {
                    @for movie in movies {
                        li { a class="text-blue-600" href=(movie.get_absolute_url()) { (movie.title) " (" (movie.year) ")" } }
                    }
                }
            }
        }
    }
}

fn review_thread(movie_id: i32, thread: &ReviewThread) -> Markup {
    let review = &thread.review;
    html! {
        div class="mt-4 border-l-4 border-gray-200 pl-4" {
            p class="text-sm font-semibold text-gray-900" { (review.name) }
            p class="mt-1 text-gray-700 whitespace-pre-line" { (review.text) }
            details class="mt-1" {
                summary class="text-xs text-blue-600 cursor-pointer" { "Reply" }
                (review_form(movie_id, Some(review.id)))
            }
            @for reply in &thread.replies {
                (review_thread(movie_id, reply))
            }
        }
    }
}

fn review_form(movie_id: i32, parent: Option<i32>) -> Markup {
    html! {
        form class="mt-2 space-y-2" method="post" action=(format!("/review/{movie_id}/")) {
            @if let Some(parent) = parent {
                input type="hidden" name="parent" value=(parent);
            }
            div class="grid gap-2 sm:grid-cols-2" {
                input class="rounded border border-gray-300 px-2 py-1" name="name" placeholder="Name" maxlength="100" required;
                input class="rounded border border-gray-300 px-2 py-1" type="email" name="email" placeholder="Email" required;
            }
            textarea class="w-full rounded border border-gray-300 px-2 py-1" name="text" rows="4" maxlength="5000" required {}
            button class="rounded bg-blue-600 px-3 py-1 text-white" type="submit" { "Send" }
        }
    }
}
