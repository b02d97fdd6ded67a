/// Netscape cookie export files, one per platform.
///
/// Operators drop `youtube_cookies.txt`, `instagram_cookies.txt` and
/// `facebook_cookies.txt` into the cookies directory. Files are parsed at
/// startup so malformed exports surface in the log instead of at download time.
use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, info, warn};

use crate::errors::CookieError;
use crate::models::Platform;

/// One cookie from an export file.
#[derive(Clone)]
pub struct CookieLine {
    pub domain: String,
    pub tailmatch: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp, 0 for session cookies.
    pub expires: u64,
    pub name: String,
    value: String,
}

impl CookieLine {
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("tailmatch", &self.tailmatch)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Parsed cookies plus the lines that were skipped.
#[derive(Debug)]
pub struct ParsedCookies {
    pub cookies: Vec<CookieLine>,
    pub warnings: Vec<(usize, String)>,
}

/// Parse a Netscape HTTP Cookie File.
///
/// Each data line holds 7 TAB-separated fields:
/// `domain tailmatch path secure expires name value`.
/// Comment lines (`#`) and blank lines are skipped; malformed lines become
/// warnings. A file with data lines but no valid cookie is an error.
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<ParsedCookies, CookieError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut data_lines = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line?;
        let line = line.trim_end();

        if line.is_empty() {
            continue;
        }
        // `#HttpOnly_` prefixed lines are real cookies in curl/yt-dlp exports
        let line = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.starts_with('#') => continue,
            None => line,
        };

        data_lines += 1;
        match parse_cookie_line(line, line_number) {
            Ok(cookie) => cookies.push(cookie),
            Err(e) => {
                warn!(line = line_number, reason = %e, "Skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() && data_lines > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParsedCookies { cookies, warnings })
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<CookieLine, CookieError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let invalid = |reason: String| CookieError::InvalidLine {
        line_number,
        content: redact_line(line),
        reason,
    };

    if fields.len() != 7 {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    }

    let parse_flag = |value: &str, field: &str| match value {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(invalid(format!("{} must be TRUE or FALSE, got '{}'", field, other))),
    };

    let tailmatch = parse_flag(fields[1], "tailmatch")?;
    let secure = parse_flag(fields[3], "secure")?;
    let expires = fields[4]
        .parse::<u64>()
        .map_err(|_| invalid(format!("expires must be a non-negative integer, got '{}'", fields[4])))?;

    if fields[0].is_empty() {
        return Err(invalid("domain is empty".to_string()));
    }
    if fields[5].is_empty() {
        return Err(invalid("cookie name is empty".to_string()));
    }

    Ok(CookieLine {
        domain: fields[0].to_string(),
        tailmatch,
        path: fields[2].to_string(),
        secure,
        expires,
        name: fields[5].to_string(),
        value: fields[6].to_string(),
    })
}

fn redact_line(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        format!("{}\t[REDACTED]", fields[..6].join("\t"))
    } else {
        // Without the field layout we cannot tell where the value starts
        let domain = line.split_whitespace().next().unwrap_or_default();
        format!("{} [REDACTED]", domain)
    }
}

/// Build a reqwest cookie jar from parsed cookies.
pub fn jar_from_cookies(cookies: &[CookieLine]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    for cookie in cookies {
        let scheme = if cookie.secure { "https" } else { "http" };
        let host = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
        let origin = format!("{}://{}{}", scheme, host, cookie.path);

        let mut set_cookie = format!(
            "{}={}; Domain={}; Path={}",
            cookie.name,
            cookie.value(),
            cookie.domain,
            cookie.path
        );
        if cookie.secure {
            set_cookie.push_str("; Secure");
        }
        if cookie.expires > 0 {
            if let Some(ts) = chrono::DateTime::from_timestamp(cookie.expires as i64, 0) {
                set_cookie.push_str(&ts.format("; Expires=%a, %d %b %Y %H:%M:%S GMT").to_string());
            }
        }

        match origin.parse::<url::Url>() {
            Ok(url) => jar.add_cookie_str(&set_cookie, &url),
            Err(_) => warn!(domain = %cookie.domain, name = %cookie.name, "Skipping cookie with unparseable domain"),
        }
    }
    jar
}

/// A platform's cookie export, ready for yt-dlp and reqwest.
#[derive(Debug, Clone)]
pub struct PlatformCookies {
    pub path: PathBuf,
    pub cookies: Vec<CookieLine>,
}

/// Cookie exports discovered in the cookies directory.
#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    by_platform: HashMap<Platform, PlatformCookies>,
}

impl CookieStore {
    /// Load every known cookie export from `dir`. Missing files are skipped;
    /// unreadable or empty ones are logged and skipped.
    pub fn load(dir: &Path) -> Self {
        let mut by_platform = HashMap::new();

        for platform in [Platform::Youtube, Platform::Instagram, Platform::Facebook] {
            let Some(file_name) = platform.cookie_file_name() else {
                continue;
            };
            let path = dir.join(file_name);
            if !path.is_file() {
                debug!("No cookie file for {} at {:?}", platform, path);
                continue;
            }

            let parsed = std::fs::File::open(&path)
                .map_err(CookieError::from)
                .and_then(|f| parse_netscape_cookies(std::io::BufReader::new(f)));

            match parsed {
                Ok(parsed) => {
                    info!(
                        "Loaded {} cookies for {} ({} lines skipped)",
                        parsed.cookies.len(),
                        platform,
                        parsed.warnings.len()
                    );
                    by_platform.insert(
                        platform,
                        PlatformCookies {
                            path,
                            cookies: parsed.cookies,
                        },
                    );
                }
                Err(e) => warn!("Ignoring cookie file for {}: {}", platform, e),
            }
        }

        Self { by_platform }
    }

    /// Path of the platform's cookie file, for `yt-dlp --cookies`.
    pub fn path(&self, platform: Platform) -> Option<&Path> {
        self.by_platform.get(&platform).map(|c| c.path.as_path())
    }

    /// A cookie jar for plain HTTP fetches against the platform.
    pub fn jar(&self, platform: Platform) -> Option<Arc<Jar>> {
        self.by_platform
            .get(&platform)
            .map(|c| jar_from_cookies(&c.cookies))
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.by_platform.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore as _;
    use std::io::Cursor;

    const EXPORT: &str = "\
# Netscape HTTP Cookie File
# This is a generated file! Do not edit.

.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tsecret-sid
#HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t1999999999\tHSID\tsecret-hsid
.youtube.com\tTRUE\t/\tMAYBE\t0\tbad\tvalue
";

    #[test]
    fn test_parse_export() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        assert_eq!(parsed.cookies.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].0, 6);
        assert_eq!(parsed.cookies[0].name, "SID");
        assert_eq!(parsed.cookies[1].name, "HSID");
        assert_eq!(parsed.cookies[1].expires, 1_999_999_999);
    }

    #[test]
    fn test_crlf_lines() {
        let input = ".example.com\tTRUE\t/\tFALSE\t0\tname\tvalue\r\n";
        let parsed = parse_netscape_cookies(Cursor::new(input)).unwrap();
        assert_eq!(parsed.cookies[0].value(), "value");
    }

    #[test]
    fn test_all_malformed_is_error() {
        let input = "garbage line\nanother\n";
        let err = parse_netscape_cookies(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, CookieError::NoCookiesFound { malformed_count: 2 }));
    }

    #[test]
    fn test_empty_file_is_ok() {
        let parsed = parse_netscape_cookies(Cursor::new("# Netscape HTTP Cookie File\n")).unwrap();
        assert!(parsed.cookies.is_empty());
    }

    #[test]
    fn test_values_never_in_debug_or_errors() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        let debug = format!("{:?}", parsed);
        assert!(!debug.contains("secret-sid"));
        assert!(debug.contains("[REDACTED]"));

        let err = parse_cookie_line(".x.com\tTRUE\t/\tFALSE\tsoon\tn\tsecret-v", 1).unwrap_err();
        assert!(!err.to_string().contains("secret-v"));
    }

    #[test]
    fn test_space_separated_line_is_redacted() {
        let err = parse_cookie_line(".youtube.com TRUE / TRUE 0 SID supersecretvalue", 3).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("found 1"));
        assert!(message.contains(".youtube.com [REDACTED]"));
        assert!(!message.contains("supersecretvalue"));
        assert!(!message.contains("SID"));
    }

    #[test]
    fn test_jar_sends_cookie() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        let jar = jar_from_cookies(&parsed.cookies);
        let url: url::Url = "https://www.youtube.com/watch".parse().unwrap();
        let header = jar.cookies(&url).expect("cookies for youtube");
        assert!(header.to_str().unwrap().contains("SID=secret-sid"));
    }

    #[test]
    fn test_store_loads_existing_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("youtube_cookies.txt"), EXPORT).unwrap();
        std::fs::write(dir.path().join("facebook_cookies.txt"), "junk\n").unwrap();

        let store = CookieStore::load(dir.path());
        assert!(store.path(Platform::Youtube).is_some());
        assert!(store.path(Platform::Facebook).is_none());
        assert!(store.path(Platform::Instagram).is_none());
        assert!(store.jar(Platform::Youtube).is_some());
    }
}
