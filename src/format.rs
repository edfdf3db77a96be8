//! Message text helpers.

/// Escapes the characters the platform treats as control sequences.
///
/// `&` is replaced first so the entities produced for `<` and `>` survive.
/// Escaping an already escaped string escapes it again:
/// `escape("&lt;")` is `"&amp;lt;"`.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Mention syntax for a user id: `<@U123>`.
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}
