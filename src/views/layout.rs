use std::fmt::Write;

use crate::users::repo_types::User;

/// Escapes text for element content and quoted attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn header(user: Option<&User>) -> String {
    let mut nav = String::from(r#"<header class="header"><nav class="nav nav--tours"><a href="/">All tours</a></nav><nav class="nav nav--user">"#);
    match user {
        Some(u) => {
            let _ = write!(
                nav,
                r#"<a class="nav__el nav__el--logout" href="/api/v1/users/logout">Log out</a><a class="nav__el" href="/me"><img class="nav__user-img" src="/img/users/{photo}" alt="Photo of {name}"><span>{first}</span></a>"#,
                photo = escape(&u.photo),
                name = escape(&u.name),
                first = escape(u.name.split_whitespace().next().unwrap_or(&u.name)),
            );
        }
        None => nav.push_str(
            r#"<a class="nav__el" href="/login">Log in</a><a class="nav__el nav__el--cta" href="/signup">Sign up</a>"#,
        ),
    }
    nav.push_str("</nav></header>");
    nav
}

/// Submits the `data-api` forms to the JSON API.
pub const FORMS_SCRIPT: &str = "/js/forms.js";

/// Full document around already-escaped `body`.
pub fn page(title: &str, user: Option<&User>, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Natours | {title}</title>
<script src="{script}" defer></script>
</head>
<body>
{header}
<main class="main">
{body}
</main>
<footer class="footer"><p class="footer__copyright">&copy; Natours</p></footer>
</body>
</html>
"#,
        title = escape(title),
        header = header(user),
        script = FORMS_SCRIPT,
    )
}

pub fn error_page(message: &str) -> String {
    let body = format!(
        r#"<div class="error"><div class="error__title"><h2 class="heading-secondary heading-secondary--error">Uh oh! Something went wrong!</h2></div><div class="error__msg">{}</div></div>"#,
        escape(message)
    );
    page("Something went wrong!", None, &body)
}
