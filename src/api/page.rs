use crate::api::auth::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Error,
}

impl Tone {
    fn class(self) -> &'static str {
        match self {
            Tone::Success => "notice success",
            Tone::Warning => "notice warning",
            Tone::Error => "notice error",
        }
    }
}

/// A status banner. `text` is already HTML-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub tone: Tone,
    pub text: String,
}

impl Notice {
    fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

pub fn notice_for(outcome: &Outcome) -> Notice {
    match outcome {
        Outcome::Registered => Notice::new(
            Tone::Success,
            "Registration successful! You can now log in.",
        ),
        Outcome::LoggedIn { username } => Notice::new(
            Tone::Success,
            format!("Login Successful! Welcome, {}.", escape_html(username)),
        ),
        Outcome::DuplicateUsername => Notice::new(
            Tone::Warning,
            "Username already exists. Please choose another.",
        ),
        Outcome::InvalidCredentials => Notice::new(
            Tone::Error,
            "Invalid credentials provided. Please try again.",
        ),
        Outcome::MissingFields => Notice::new(Tone::Error, "Please fill in all fields."),
        Outcome::StorageFailure => {
            Notice::new(Tone::Error, "An unexpected database error occurred.")
        }
    }
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = r#"
body { font-family: sans-serif; background: #f3f4f6; margin: 0; padding: 2rem; }
main { max-width: 56rem; margin: 0 auto; display: grid; grid-template-columns: 1fr 1fr; gap: 2rem; }
header { grid-column: 1 / -1; text-align: center; }
section { background: #fff; border: 1px solid #e5e7eb; border-radius: 0.75rem; padding: 2rem; }
label { display: block; margin-bottom: 0.25rem; }
input[type=email], input[type=password], input[type=text] { width: 100%; padding: 0.5rem; margin-bottom: 1rem; box-sizing: border-box; }
button { width: 100%; padding: 0.5rem; border: 0; border-radius: 0.5rem; color: #fff; background: #2563eb; }
.notice { border-left: 4px solid; padding: 1rem; border-radius: 0.375rem; text-align: left; }
.success { background: #dcfce7; border-color: #22c55e; color: #15803d; }
.warning { background: #fef9c3; border-color: #eab308; color: #a16207; }
.error { background: #fee2e2; border-color: #ef4444; color: #b91c1c; }
.current-user { grid-column: 1 / -1; text-align: center; background: #dbeafe; color: #1e40af; padding: 0.75rem; border-radius: 0.5rem; }
"#;

/// Renders the whole page, with an optional banner above the two forms and,
/// after a successful login, a badge naming the user.
pub fn render_page(notice: Option<&Notice>, current_user: Option<&str>) -> String {
    let banner = notice
        .map(|notice| {
            format!(
                r#"<div class="{}" role="alert"><p>{}</p></div>"#,
                notice.tone.class(),
                notice.text
            )
        })
        .unwrap_or_default();

    let badge = current_user
        .map(|username| {
            format!(
                r#"<div class="current-user">Currently logged in as: <strong>{}</strong></div>"#,
                escape_html(username)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>User Auth</title>
<style>{STYLE}</style>
</head>
<body>
<main>
<header>
<h1>Registration and Login</h1>
{banner}
</header>
<section>
<h2>New User Registration</h2>
<form method="POST" action="/">
<input type="hidden" name="register_submit" value="1">
<label for="reg_username">Username (Email)</label>
<input type="email" id="reg_username" name="reg_username" placeholder="testuser@example.com" required>
<label for="reg_password">Password</label>
<input type="password" id="reg_password" name="reg_password" required>
<button type="submit">Register Account</button>
</form>
</section>
<section>
<h2>Existing User Login</h2>
<form method="POST" action="/">
<input type="hidden" name="login_submit" value="1">
<label for="username">Username (Email)</label>
<input type="email" id="username" name="username" required>
<label for="password">Password</label>
<input type="password" id="password" name="password" required>
<button type="submit">Log In</button>
</form>
</section>
{badge}
</main>
</body>
</html>
"#
    )
}
