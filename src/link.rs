use reqwest::Url;

use crate::format::FormatKind;

/// Rewrites `youtu.be` share links into regular watch URLs without the `si`
/// tracking parameter. Other links pass through untouched.
pub fn clean_url(link: &str) -> String {
    if !link.contains("youtu.be") {
        return link.to_string();
    }
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };

    let video_id = parsed.path().trim_start_matches('/');
    let mut params: Vec<(String, String)> = vec![];
    for (key, value) in parsed.query_pairs() {
        if key == "si" || value.is_empty() || params.iter().any(|(k, _)| *k == key) {
            continue;
        }
        params.push((key.into_owned(), value.into_owned()));
    }

    let mut cleaned = format!("https://www.youtube.com/watch?v={video_id}");
    if !params.is_empty() {
        cleaned.push('&');
        cleaned.push_str(&serde_urlencoded::to_string(&params).unwrap_or_default());
    }
    cleaned
}

pub fn download_filename(title: &str, kind: FormatKind) -> String {
    let stem: String = title
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | '"' => '_',
            c => c,
        })
        .collect();
    format!("{stem}.{}", kind.extension())
}

/// `Content-Disposition` value with an ASCII `filename` for old clients and
/// the exact name in `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
