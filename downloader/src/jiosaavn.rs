/// JioSaavn song search.
///
/// The media URLs JioSaavn returns are encrypted; they are passed through
/// untouched and decrypting them is left to the client.
use serde_json::Value;

use ninjax_shared::errors::NinjaResult;
use ninjax_shared::models::SongResult;

use crate::fetch::HttpFetcher;

pub const DEFAULT_API_BASE: &str = "https://www.jiosaavn.com/api.php";

const PAGE_SIZE: &str = "20";

pub struct JioSaavnClient {
    fetcher: HttpFetcher,
    api_base: String,
}

impl JioSaavnClient {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self::with_base_url(fetcher, DEFAULT_API_BASE)
    }

    pub fn with_base_url(fetcher: HttpFetcher, api_base: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_base: api_base.into(),
        }
    }

    pub async fn search(&self, query: &str) -> NinjaResult<Vec<SongResult>> {
        let params = [
            ("_format", "json"),
            ("_marker", "0"),
            ("api_version", "4"),
            ("ctx", "web6dot0"),
            ("n", PAGE_SIZE),
            ("p", "1"),
            ("q", query),
            ("__call", "search.getResults"),
        ];
        let body: Value = self.fetcher.get_json(&self.api_base, &params).await?;
        Ok(parse_search_response(&body))
    }
}

/// Extract songs from a search response.
///
/// Accepts both the nested `results.songs.data` layout and the flat
/// `results: [...]` layout of API v4, where details live under `more_info`.
pub fn parse_search_response(body: &Value) -> Vec<SongResult> {
    let songs = body
        .pointer("/results/songs/data")
        .or_else(|| body.get("results"))
        .and_then(Value::as_array);

    let Some(songs) = songs else {
        return Vec::new();
    };

    songs
        .iter()
        .map(|song| SongResult {
            id: field(song, "id"),
            title: field(song, "title").or_else(|| field(song, "song")),
            artist: field(song, "primary_artists").or_else(|| field(song, "subtitle")),
            album: field(song, "album"),
            duration: field(song, "duration"),
            image: field(song, "image"),
            download_url: field(song, "encrypted_media_url"),
        })
        .collect()
}

/// String-ish field from the song or its `more_info` block.
fn field(song: &Value, key: &str) -> Option<String> {
    let value = song
        .get(key)
        .or_else(|| song.get("more_info").and_then(|m| m.get(key)))?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
