//! YouTube video URL validation
//!
//! Accepts watch URLs (`?v=<id>`) on the known query hosts and path-style
//! URLs (`youtu.be/<id>`, `/embed/<id>`, `/v/<id>`, `/shorts/<id>`,
//! `/live/<id>`). A `v` parameter on a host that does not take one (such as
//! `youtu.be`) makes the URL invalid. Only the first 11 characters of the id
//! are considered.

use std::sync::OnceLock;

macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: OnceLock<regex::Regex> = OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("static regex"))
    }};
}

const QUERY_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "gaming.youtube.com",
];

const PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live"];

struct ParsedUrl<'a> {
    host: String,
    path: &'a str,
    query: Option<&'a str>,
}

fn parse(url: &str) -> Option<ParsedUrl<'_>> {
    let caps = regex!(r"^(?i:https?)://([^/?#]+)([^?#]*)(?:\?([^#]*))?").captures(url)?;
    let authority = caps.get(1)?.as_str();
    // user:pass@host:port
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?.to_ascii_lowercase();
    Some(ParsedUrl {
        host,
        path: caps.get(2).map_or("", |m| m.as_str()),
        query: caps.get(3).map(|m| m.as_str()),
    })
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

fn path_id(parsed: &ParsedUrl<'_>) -> Option<String> {
    let mut segments = parsed.path.split('/').skip(1);
    match parsed.host.as_str() {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "www.youtube.com" => {
            let prefix = segments.next()?;
            if PATH_PREFIXES.contains(&prefix) {
                segments.next().map(str::to_string)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Extract the 11 character video id from a YouTube URL
pub fn video_id(url: &str) -> Option<String> {
    let parsed = parse(url.trim())?;

    let id = match parsed.query.and_then(|q| query_param(q, "v")) {
        Some(id) if QUERY_HOSTS.contains(&parsed.host.as_str()) => id.to_string(),
        Some(_) => return None,
        None => path_id(&parsed)?,
    };

    let id: String = id.chars().take(11).collect();
    regex!(r"^[A-Za-z0-9_-]{11}$")
        .is_match(&id)
        .then_some(id)
}

/// Whether `url` points at a single YouTube video
pub fn is_valid_video_url(url: &str) -> bool {
    video_id(url).is_some()
}
