use maud::{Markup, html};

use super::{
    ModelAdmin, ModelKind, column_label,
    changelist::{Cell, FilterGroup, ListQuery, Row, render_cell},
    forms::{Field, Fieldset, Input},
};
use crate::{
    config::Config,
    entities::{movie, reviews},
    templates::page,
};

const BUTTON: &str = "rounded bg-blue-600 px-3 py-1 text-sm text-white hover:bg-blue-700";
const SECONDARY: &str =
    "rounded border border-gray-300 bg-white px-3 py-1 text-sm text-gray-700 hover:bg-gray-100";
const DANGER: &str = "rounded bg-red-600 px-3 py-1 text-sm text-white hover:bg-red-700";
const INPUT: &str = "w-full rounded border border-gray-300 px-2 py-1";

fn admin_title(cfg: &Config) -> String {
    format!("{} administration", cfg.site_title)
}

fn layout(cfg: &Config, crumbs: Markup, body: Markup) -> Markup {
    html! {
        header class="bg-gray-800 text-white" {
            div class="max-w-6xl mx-auto px-6 py-3 flex items-center justify-between" {
                a class="font-semibold" href="/admin/" { (admin_title(cfg)) }
                div class="flex items-center gap-4 text-sm" {
                    a class="hover:underline" href="/" { "View site" }
                    form method="post" action="/admin/logout/" {
                        button class="hover:underline" type="submit" { "Log out" }
                    }
                }
            }
        }
        nav class="max-w-6xl mx-auto px-6 pt-4 text-sm text-gray-500" {
            a class="text-blue-600" href="/admin/" { "Home" }
            (crumbs)
        }
        main class="max-w-6xl mx-auto px-6 py-6" { (body) }
    }
}

fn crumbs(kind: ModelKind, last: Option<&str>) -> Markup {
    html! {
        " › "
        a class="text-blue-600" href=(kind.list_url()) { (kind.verbose_name_plural()) }
        @if let Some(last) = last {
            " › " (last)
        }
    }
}

pub fn login(cfg: &Config, error: Option<&str>) -> String {
    page(
        &cfg.site_title,
        "Log in",
        html! {
            div class="max-w-sm mx-auto mt-24 bg-white shadow rounded-lg p-6" {
                h1 class="text-xl font-bold text-gray-900" { (admin_title(cfg)) }
                @if let Some(error) = error {
                    p class="mt-3 text-sm text-red-600" { (error) }
                }
                form class="mt-4 space-y-3" method="post" action="/admin/login/" {
                    label class="block text-sm text-gray-700" for="token" { "Admin token" }
                    input class=(INPUT) id="token" type="password" name="token" autofocus required;
                    button class=(BUTTON) type="submit" { "Log in" }
                }
            }
        },
    )
}

pub fn index(cfg: &Config) -> String {
    page(
        &cfg.site_title,
        "Site administration",
        layout(
            cfg,
            html! {},
            html! {
                h1 class="text-2xl font-bold text-gray-900" { "Site administration" }
                table class="mt-6 w-full max-w-xl bg-white shadow rounded-lg" {
                    @for kind in ModelKind::ALL {
                        tr class="border-b last:border-0" {
                            td class="px-4 py-2" {
                                a class="text-blue-600" href=(kind.list_url()) { (kind.verbose_name_plural()) }
                            }
                            td class="px-4 py-2 text-right" {
                                a class="text-sm text-green-700" href=(format!("/admin/{}/add/", kind.slug())) { "+ Add" }
                            }
                        }
                    }
                }
            },
        ),
    )
}

pub fn change_list(
    cfg: &Config,
    admin: &ModelAdmin,
    rows: &[Row],
    query: &ListQuery,
    filters: &[FilterGroup],
) -> String {
    let kind = admin.kind;
    let link = admin.link_column();

    page(
        &cfg.site_title,
        kind.verbose_name_plural(),
        layout(
            cfg,
            crumbs(kind, None),
            html! {
                div class="flex items-center justify-between" {
                    h1 class="text-2xl font-bold text-gray-900" { "Select " (kind.verbose_name().to_lowercase()) " to change" }
                    a class=(BUTTON) href=(format!("/admin/{}/add/", kind.slug())) { "Add " (kind.verbose_name().to_lowercase()) }
                }
                @if !admin.search_fields.is_empty() {
                    form class="mt-4 flex gap-2" method="get" {
                        input class="rounded border border-gray-300 px-2 py-1" type="search" name="q" value=(query.q);
                        @if let Some(category) = query.category {
                            input type="hidden" name="category" value=(category);
                        }
                        @if let Some(year) = query.year {
                            input type="hidden" name="year" value=(year);
                        }
                        button class=(SECONDARY) type="submit" { "Search" }
                    }
                }
                div class="mt-4 flex gap-6" {
                    div class="flex-1 overflow-x-auto" {
                        table class="w-full bg-white shadow rounded-lg text-sm" {
                            thead class="bg-gray-100 text-left" {
                                tr {
                                    @for field in admin.list_display {
                                        th class="px-3 py-2" { (column_label(kind, field)) }
                                    }
                                }
                            }
                            tbody {
                                @for row in rows {
                                    tr class="border-b last:border-0" {
                                        @for (i, (field, cell)) in admin.list_display.iter().zip(&row.cells).enumerate() {
                                            td class="px-3 py-2" {
                                                @if i == link {
                                                    a class="text-blue-600" href=(kind.change_url(row.id)) { (render_cell(cell)) }
                                                } @else if admin.list_editable.contains(field) {
                                                    (editable_cell(row.id, cell))
                                                } @else {
                                                    (render_cell(cell))
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        p class="mt-2 text-sm text-gray-500" { (rows.len()) " " (kind.verbose_name_plural().to_lowercase()) }
                    }
                    @if !filters.is_empty() {
                        aside class="w-56 bg-white shadow rounded-lg p-4 text-sm" {
                            h2 class="font-semibold text-gray-900" { "Filter" }
                            @for group in filters {
                                h3 class="mt-3 text-gray-700" { "By " (group.title.to_lowercase()) }
                                ul class="mt-1 space-y-1" {
                                    li { a class="text-blue-600" href=(filter_href(query, group.param, None)) { "All" } }
                                    @for (value, label) in &group.choices {
                                        li { a class="text-blue-600" href=(filter_href(query, group.param, Some(value.as_str()))) { (label) } }
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

/// The in-place draft toggle of the movie change list.
fn editable_cell(id: i32, cell: &Cell) -> Markup {
    html! {
        form method="post" action=(format!("/admin/movie/{id}/draft/")) {
            button class="underline" type="submit" title="Toggle" { (render_cell(cell)) }
        }
    }
}

fn filter_href(query: &ListQuery, param: &str, value: Option<&str>) -> String {
    let mut pairs = Vec::new();
    if !query.q.trim().is_empty() {
        pairs.push(format!("q={}", urlencoding::encode(query.q.trim())));
    }
    let kept = [("category", query.category), ("year", query.year)];
    for (name, current) in kept {
        let value = if name == param {
            value.map(str::to_string)
        } else {
            current.map(|v| v.to_string())
        };
        if let Some(value) = value {
            pairs.push(format!("{name}={}", urlencoding::encode(&value)));
        }
    }
    if pairs.is_empty() { "?".to_string() } else { format!("?{}", pairs.join("&")) }
}

pub fn change_form(
    cfg: &Config,
    admin: &ModelAdmin,
    id: Option<i32>,
    fieldsets: &[Fieldset],
    inline: Option<Markup>,
) -> String {
    let kind = admin.kind;
    let heading = match id {
        Some(_) => format!("Change {}", kind.verbose_name().to_lowercase()),
        None => format!("Add {}", kind.verbose_name().to_lowercase()),
    };
    let action = match id {
        Some(id) => kind.change_url(id),
        None => format!("/admin/{}/add/", kind.slug()),
    };

    page(
        &cfg.site_title,
        &heading,
        layout(
            cfg,
            crumbs(kind, Some(&heading)),
            html! {
                h1 class="text-2xl font-bold text-gray-900" { (heading) }
                form class="mt-4 space-y-4" method="post" action=(action) {
                    @if admin.save_on_top {
                        (save_row(admin, id))
                    }
                    @for set in fieldsets {
                        (fieldset(set))
                    }
                    (save_row(admin, id))
                }
                @if let Some(inline) = inline {
                    (inline)
                }
                @if let Some(id) = id {
                    form class="mt-6" method="post" action=(format!("/admin/{}/{id}/delete/", kind.slug())) {
                        button class=(DANGER) type="submit" onclick="return confirm('Delete this object?')" { "Delete" }
                    }
                }
            },
        ),
    )
}

fn save_row(admin: &ModelAdmin, id: Option<i32>) -> Markup {
    html! {
        div class="flex flex-wrap gap-2 bg-gray-100 rounded p-3" {
            button class=(BUTTON) type="submit" name="_save" { "Save" }
            @if id.is_some() && admin.save_as {
                button class=(SECONDARY) type="submit" name="_saveasnew" { "Save as new" }
            } @else {
                button class=(SECONDARY) type="submit" name="_addanother" { "Save and add another" }
            }
            button class=(SECONDARY) type="submit" name="_continue" { "Save and continue editing" }
        }
    }
}

fn fieldset(set: &Fieldset) -> Markup {
    let fields = html! {
        div class="space-y-3 p-4" {
            @for field in &set.fields {
                (field_row(field))
            }
        }
    };
    html! {
        @match (set.title, set.collapse) {
            (Some(title), true) => {
                details class="bg-white shadow rounded-lg" {
                    summary class="cursor-pointer px-4 py-2 font-semibold text-gray-900" { (title) }
                    (fields)
                }
            },
            (Some(title), false) => {
                fieldset class="bg-white shadow rounded-lg" {
                    legend class="px-4 pt-2 font-semibold text-gray-900" { (title) }
                    (fields)
                }
            },
            (None, _) => {
                fieldset class="bg-white shadow rounded-lg" { (fields) }
            },
        }
    }
}

fn field_row(field: &Field) -> Markup {
    html! {
        div class="grid gap-1 md:grid-cols-[12rem,1fr] md:items-start" {
            label class="text-sm font-medium text-gray-700" for=(field.name) { (field.label) }
            div {
                (input(field))
                @if let Some(help) = field.help {
                    p class="mt-1 text-xs text-gray-500" { (help) }
                }
            }
        }
    }
}

fn input(field: &Field) -> Markup {
    let name = field.name;
    html! {
        @match &field.input {
            Input::Text { max } => {
                input class=(INPUT) id=(name) name=(name) value=(field.value) maxlength=(max);
            },
            Input::TextArea => {
                textarea class=(INPUT) id=(name) name=(name) rows="6" { (field.value) }
            },
            Input::Email => {
                input class=(INPUT) id=(name) type="email" name=(name) value=(field.value);
            },
            Input::Number => {
                input class=(INPUT) id=(name) type="number" name=(name) value=(field.value);
            },
            Input::Date => {
                input class=(INPUT) id=(name) type="date" name=(name) value=(field.value);
            },
            Input::Checkbox => {
                input id=(name) type="checkbox" name=(name) checked[field.value == "true"];
            },
            Input::Select { choices, optional } => {
                select class=(INPUT) id=(name) name=(name) {
                    @if *optional || field.selected.is_empty() {
                        option value="" { "---------" }
                    }
                    @for (id, label) in choices {
                        option value=(id) selected[field.selected.contains(id)] { (label) }
                    }
                }
            },
            Input::SelectMultiple { choices } => {
                select class=(INPUT) id=(name) name=(name) multiple size="6" {
                    @for (id, label) in choices {
                        option value=(id) selected[field.selected.contains(id)] { (label) }
                    }
                }
            },
            Input::Readonly => {
                p class="text-gray-900" { (field.value) }
            },
            Input::Html(markup) => {
                (markup)
            },
        }
    }
}

/// Reviews of `movie` edited inline on its change page.
pub fn review_inline(movie: &movie::Model, reviews: &[reviews::Model], extra: usize) -> Markup {
    let change_url = ModelKind::Movie.change_url(movie.id);
    html! {
        section class="mt-6 bg-white shadow rounded-lg p-4" {
            h2 class="font-semibold text-gray-900" { "Reviews" }
            table class="mt-3 w-full text-sm" {
                thead class="text-left text-gray-500" {
                    tr { th { "Name" } th { "Email" } th { "Message" } th {} }
                }
                tbody {
                    @for review in reviews {
                        tr class="border-b" {
                            td class="py-2" {
                                a class="text-blue-600" href=(ModelKind::Reviews.change_url(review.id)) { (review.name) }
                            }
                            td { (review.email) }
                            td class="whitespace-pre-line" { (review.text) }
                            td class="text-right" {
                                form method="post" action=(format!("/admin/reviews/{}/delete/", review.id)) {
                                    input type="hidden" name="next" value=(change_url);
                                    button class="text-red-600" type="submit" { "Delete" }
                                }
                            }
                        }
                    }
                }
            }
            @for _ in 0..extra {
                form class="mt-4 grid gap-2 md:grid-cols-2" method="post" action=(format!("/admin/movie/{}/reviews/", movie.id)) {
                    input class=(INPUT) name="name" placeholder="Name" maxlength=(reviews::NAME_MAX_CHARS) required;
                    input class=(INPUT) type="email" name="email" placeholder="Email" required;
                    textarea class=(format!("{INPUT} md:col-span-2")) name="text" rows="3" maxlength=(reviews::TEXT_MAX_CHARS) required {}
                    div { button class=(BUTTON) type="submit" { "Add review" } }
                }
            }
        }
    }
}
