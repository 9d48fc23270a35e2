//! Minimal server-rendered pages for the editor and history views.
//!
//! Plain string templates with HTML escaping; the interesting behavior all
//! lives in the store and the hub, so the pages stay deliberately small.

/// Escape a string for safe interpolation into HTML text content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The editor page: a textarea wired to `/save/{path}` and the live
/// websocket feed by `/static/script.js`.
pub fn editor(path: &str, content: &str) -> String {
    let path = escape_html(path);
    let content = escape_html(content);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{path}</title>\n\
         <link rel=\"stylesheet\" href=\"/static/style.css\">\n\
         </head>\n<body data-path=\"{path}\">\n\
         <form action=\"/save/{path}\" method=\"post\">\n\
         <textarea id=\"content\" name=\"content\" autofocus>{content}</textarea>\n\
         <button type=\"submit\">Save</button>\n\
         </form>\n\
         <script src=\"/static/script.js\"></script>\n\
         </body>\n</html>\n"
    )
}

/// A read-only view of one prior version with prev/next navigation.
/// `prev` and `next` are 0 when there is no neighbor in that direction.
pub fn history(
    path: &str,
    content: &str,
    version: i64,
    prev: i64,
    next: i64,
    total: usize,
) -> String {
    let path = escape_html(path);
    let content = escape_html(content);
    let prev_link = if prev > 0 {
        format!("<a href=\"/{path}/{prev}\">newer</a>")
    } else {
        "<span>newer</span>".to_string()
    };
    let next_link = if next > 0 {
        format!("<a href=\"/{path}/{next}\">older</a>")
    } else {
        "<span>older</span>".to_string()
    };
    format!(
        "<!DOCTYPE html>\n\
         <html>\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{path} (version {version})</title>\n\
         <link rel=\"stylesheet\" href=\"/static/style.css\">\n\
         </head>\n<body>\n\
         <p>{path}: version {version} of {total} | {prev_link} | {next_link} | \
         <a href=\"/{path}\">current</a></p>\n\
         <pre>{content}</pre>\n\
         </body>\n</html>\n"
    )
}
