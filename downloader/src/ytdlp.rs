/// yt-dlp subprocess driver.
///
/// Every call spawns `yt-dlp` with a fixed argument list, reads stdout to the
/// end and forwards stderr to tracing. Calls are bounded by a timeout and the
/// child is killed when the timeout fires or the caller goes away.
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use ninjax_shared::errors::{ExtractorError, MediaError, NinjaResult};
use ninjax_shared::models::{AUDIO_FORMAT_ID, MP3_BITRATE};

/// Stderr lines kept for error classification.
const STDERR_TAIL_LINES: usize = 40;

/// Discover extra PATH entries where ffmpeg may live (needed for MP3 extraction
/// and stream merging). `FFMPEG_PATH` wins over the common install locations.
fn discover_extra_paths() -> Vec<String> {
    let mut extra = Vec::new();

    if let Ok(ffmpeg_path) = std::env::var("FFMPEG_PATH") {
        extra.push(ffmpeg_path);
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[r"C:\ffmpeg\bin", r"C:\Program Files\ffmpeg\bin"]
    } else {
        &["/usr/local/bin", "/snap/bin", "/opt/homebrew/bin", "/home/linuxbrew/.linuxbrew/bin"]
    };
    let exe = if cfg!(target_os = "windows") { "ffmpeg.exe" } else { "ffmpeg" };

    for dir in candidates {
        if PathBuf::from(dir).join(exe).exists() {
            extra.push(dir.to_string());
        }
    }

    extra
}

/// Metadata printed by `yt-dlp --dump-single-json`. Only the fields we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub formats: Vec<YtDlpFormat>,
}

/// One entry of `formats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YtDlpFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl YtDlpFormat {
    pub fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(v) if v != "none")
    }
}

impl YtDlpInfo {
    /// Whether the selected media carries video.
    pub fn is_video(&self) -> bool {
        match self.vcodec.as_deref() {
            Some("none") => false,
            Some(_) => true,
            None => matches!(self.ext.as_deref(), Some("mp4" | "webm" | "mkv" | "mov"))
                || self.formats.iter().any(YtDlpFormat::has_video),
        }
    }
}

/// Which stream(s) to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatChoice {
    /// Best audio, converted to MP3.
    Mp3,
    /// A yt-dlp format id from the info listing.
    Format(String),
}

/// Where and how to download.
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    pub output_dir: PathBuf,
    /// File name without extension; yt-dlp appends the real one.
    pub stem: String,
    pub format: FormatChoice,
}

/// Line printed after the file has been moved into place.
#[derive(Debug, Deserialize)]
struct FinishedFile {
    #[serde(default)]
    title: Option<String>,
    filepath: String,
}

/// Result of a yt-dlp download.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub title: Option<String>,
}

/// Handle to the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
    timeout: Duration,
    path_env: Option<String>,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>, timeout_secs: u64) -> Self {
        let extra_paths = discover_extra_paths();
        let path_env = if extra_paths.is_empty() {
            None
        } else {
            let current_path = std::env::var("PATH").unwrap_or_default();
            let sep = if cfg!(target_os = "windows") { ";" } else { ":" };
            let extras = extra_paths.join(sep);
            info!("Adding to yt-dlp PATH: {}", extras);
            Some(format!("{}{}{}", current_path, sep, extras))
        };

        Self {
            bin: bin.into(),
            timeout: Duration::from_secs(timeout_secs),
            path_env,
        }
    }

    /// Fetch metadata without downloading.
    pub async fn probe(&self, url: &str, cookies: Option<&Path>) -> NinjaResult<YtDlpInfo> {
        let stdout = self.run(probe_args(url, cookies)).await?;
        serde_json::from_str(&stdout)
            .map_err(|e| ExtractorError::InvalidJson(e.to_string()).into())
    }

    /// Download into `spec.output_dir` and return the final file.
    pub async fn download(
        &self,
        url: &str,
        spec: &DownloadSpec,
        cookies: Option<&Path>,
    ) -> NinjaResult<DownloadedFile> {
        let stdout = self.run(download_args(url, spec, cookies)).await?;

        let finished = stdout
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .find_map(|l| serde_json::from_str::<FinishedFile>(l.trim()).ok());

        if let Some(finished) = finished {
            let path = PathBuf::from(&finished.filepath);
            if path.is_file() {
                return Ok(DownloadedFile {
                    path,
                    title: finished.title,
                });
            }
            warn!("yt-dlp reported a file that does not exist: {:?}", path);
        }

        // Fall back to whatever landed under our stem.
        find_by_stem(&spec.output_dir, &spec.stem)
            .await
            .map(|path| DownloadedFile { path, title: None })
            .ok_or_else(|| ExtractorError::NoOutputFile.into())
    }

    async fn run(&self, args: Vec<String>) -> NinjaResult<String> {
        debug!("Running {} {}", self.bin, args.join(" "));

        let mut command = Command::new(&self.bin);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = &self.path_env {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractorError::NotInstalled(self.bin.clone())
            } else {
                ExtractorError::SpawnFailed(e.to_string())
            }
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractorError::SpawnFailed("No stdout handle".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::SpawnFailed("No stderr handle".into()))?;
        let stderr_task = tokio::spawn(collect_stderr(stderr));

        let waited = tokio::time::timeout(self.timeout, async {
            let mut out = String::new();
            stdout.read_to_string(&mut out).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((out, status))
        })
        .await;

        let (out, status) = match waited {
            Ok(result) => result?,
            Err(_) => {
                warn!("yt-dlp timed out after {:?}, killing", self.timeout);
                let _ = child.kill().await;
                return Err(ExtractorError::Timeout(self.timeout.as_secs()).into());
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(out);
        }

        let code = status.code().unwrap_or(-1);
        warn!("yt-dlp exited with code {}", code);
        if stderr_tail.contains("ERROR:") {
            Err(MediaError::from_stderr(&stderr_tail).into())
        } else {
            Err(ExtractorError::Exited {
                code,
                stderr: stderr_tail,
            }
            .into())
        }
    }
}

/// Forward stderr lines to tracing and keep the tail for classification.
async fn collect_stderr(stderr: impl AsyncRead + Unpin) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: Vec<String> = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "yt_dlp", "{}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.remove(0);
        }
        tail.push(line);
    }
    tail.join("\n")
}

async fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let prefix = format!("{}.", stem);
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            return Some(entry.path());
        }
    }
    None
}

fn cookie_args(args: &mut Vec<String>, cookies: Option<&Path>) {
    if let Some(path) = cookies {
        args.push("--cookies".to_string());
        args.push(path.display().to_string());
    }
}

pub(crate) fn probe_args(url: &str, cookies: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "--dump-single-json".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
    ];
    cookie_args(&mut args, cookies);
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

pub(crate) fn download_args(url: &str, spec: &DownloadSpec, cookies: Option<&Path>) -> Vec<String> {
    let template = spec.output_dir.join(format!("{}.%(ext)s", spec.stem));
    let mut args = vec![
        "--no-playlist".to_string(),
        "--restrict-filenames".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--no-simulate".to_string(),
        "--print".to_string(),
        "after_move:%(.{title,filepath})j".to_string(),
        "-o".to_string(),
        template.display().to_string(),
    ];

    match &spec.format {
        FormatChoice::Mp3 => {
            args.extend([
                "-f".to_string(),
                AUDIO_FORMAT_ID.to_string(),
                "-x".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                format!("{}K", MP3_BITRATE),
            ]);
        }
        FormatChoice::Format(format_id) => {
            // Video-only formats get the best audio merged in when available.
            args.extend([
                "-f".to_string(),
                format!("{id}+bestaudio/{id}", id = format_id),
                "--merge-output-format".to_string(),
                "mp4".to_string(),
            ]);
        }
    }

    cookie_args(&mut args, cookies);
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_args_with_cookies() {
        let args = probe_args("https://youtu.be/dQw4w9WgXcQ", Some(Path::new("/etc/ninjax/youtube_cookies.txt")));
        assert_eq!(args[0], "--dump-single-json");
        let idx = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[idx + 1], "/etc/ninjax/youtube_cookies.txt");
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args.last().unwrap(), "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn test_download_args_mp3() {
        let spec = DownloadSpec {
            output_dir: PathBuf::from("downloads"),
            stem: "Downloader_NinjaX_1".into(),
            format: FormatChoice::Mp3,
        };
        let args = download_args("https://youtu.be/x", &spec, None);
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"192K".to_string()));
        assert!(args.contains(&"bestaudio/best".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
        let out_idx = args.iter().position(|a| a == "-o").unwrap();
        assert!(args[out_idx + 1].ends_with("Downloader_NinjaX_1.%(ext)s"));
    }

    #[test]
    fn test_download_args_video_format() {
        let spec = DownloadSpec {
            output_dir: PathBuf::from("downloads"),
            stem: "s".into(),
            format: FormatChoice::Format("137".into()),
        };
        let args = download_args("https://youtu.be/x", &spec, None);
        let f_idx = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f_idx + 1], "137+bestaudio/137");
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn test_info_deserialize_partial() {
        let json = r#"{"id":"abc","title":"Clip","duration":212.5,"vcodec":"avc1","formats":[
            {"format_id":"140","ext":"m4a","vcodec":"none","filesize":3400000},
            {"format_id":"137","ext":"mp4","vcodec":"avc1","height":1080,"filesize":null}
        ]}"#;
        let info: YtDlpInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.formats.len(), 2);
        assert!(!info.formats[0].has_video());
        assert!(info.formats[1].has_video());
        assert!(info.is_video());
    }

    #[test]
    fn test_is_video_falls_back_to_ext() {
        let image = YtDlpInfo { ext: Some("jpg".into()), ..Default::default() };
        assert!(!image.is_video());
        let clip = YtDlpInfo { ext: Some("mp4".into()), ..Default::default() };
        assert!(clip.is_video());
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_installed() {
        let ytdlp = YtDlp::new("ninjax-definitely-missing-binary", 5);
        let err = ytdlp.probe("https://youtu.be/x", None).await.unwrap_err();
        assert!(matches!(
            err,
            ninjax_shared::errors::NinjaError::Extractor(ExtractorError::NotInstalled(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_stem_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stem.mp4.part"), b"x").unwrap();
        assert!(find_by_stem(dir.path(), "stem").await.is_none());
        std::fs::write(dir.path().join("stem.mp3"), b"x").unwrap();
        assert_eq!(find_by_stem(dir.path(), "stem").await.unwrap(), dir.path().join("stem.mp3"));
    }

    #[cfg(unix)]
    mod child_process {
        use super::*;
        use ninjax_shared::errors::NinjaError;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable stand-in for yt-dlp.
        fn fake_ytdlp(dir: &Path, body: &str) -> String {
            let path = dir.join("fake-yt-dlp");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        fn spec(dir: &Path) -> DownloadSpec {
            DownloadSpec {
                output_dir: dir.to_path_buf(),
                stem: "Downloader_NinjaX_7".into(),
                format: FormatChoice::Mp3,
            }
        }

        #[tokio::test]
        async fn test_download_reads_finished_line() {
            let dir = tempfile::tempdir().unwrap();
            let out = dir.path().join("Downloader_NinjaX_7.mp3");
            let bin = fake_ytdlp(
                dir.path(),
                &format!(
                    "printf 'mp3' > '{out}'\necho '[download] 100%'\necho '{{\"title\":\"Clip\",\"filepath\":\"{out}\"}}'",
                    out = out.display()
                ),
            );

            let file = YtDlp::new(bin, 10)
                .download("https://youtu.be/x", &spec(dir.path()), None)
                .await
                .unwrap();
            assert_eq!(file.path, out);
            assert_eq!(file.title.as_deref(), Some("Clip"));
        }

        #[tokio::test]
        async fn test_download_falls_back_to_stem() {
            let dir = tempfile::tempdir().unwrap();
            let out = dir.path().join("Downloader_NinjaX_7.m4a");
            let bin = fake_ytdlp(
                dir.path(),
                &format!(
                    "printf 'a' > '{out}'\necho '{{\"title\":\"Clip\",\"filepath\":\"/nowhere/clip.mp3\"}}'",
                    out = out.display()
                ),
            );

            let file = YtDlp::new(bin, 10)
                .download("https://youtu.be/x", &spec(dir.path()), None)
                .await
                .unwrap();
            assert_eq!(file.path, out);
            assert!(file.title.is_none());
        }

        #[tokio::test]
        async fn test_download_without_output_fails() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ytdlp(dir.path(), "exit 0");
            let err = YtDlp::new(bin, 10)
                .download("https://youtu.be/x", &spec(dir.path()), None)
                .await
                .unwrap_err();
            assert!(matches!(err, NinjaError::Extractor(ExtractorError::NoOutputFile)));
        }

        #[tokio::test]
        async fn test_error_line_is_classified() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ytdlp(
                dir.path(),
                "echo 'WARNING: retrying' >&2\necho 'ERROR: [youtube] x: Private video. Sign in if you have access' >&2\nexit 1",
            );
            let err = YtDlp::new(bin, 10).probe("https://youtu.be/x", None).await.unwrap_err();
            assert!(matches!(
                err,
                NinjaError::Media(MediaError::Unavailable("private video"))
            ));
        }

        #[tokio::test]
        async fn test_exit_without_error_line() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ytdlp(dir.path(), "echo 'Traceback (most recent call last)' >&2\nexit 2");
            let err = YtDlp::new(bin, 10).probe("https://youtu.be/x", None).await.unwrap_err();
            match err {
                NinjaError::Extractor(ExtractorError::Exited { code, stderr }) => {
                    assert_eq!(code, 2);
                    assert!(stderr.contains("Traceback"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_probe_rejects_non_json() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ytdlp(dir.path(), "echo 'not json'");
            let err = YtDlp::new(bin, 10).probe("https://youtu.be/x", None).await.unwrap_err();
            assert!(matches!(err, NinjaError::Extractor(ExtractorError::InvalidJson(_))));
        }

        #[tokio::test]
        async fn test_slow_child_is_killed() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ytdlp(dir.path(), "exec sleep 5");
            let started = std::time::Instant::now();
            let err = YtDlp::new(bin, 1).probe("https://youtu.be/x", None).await.unwrap_err();
            assert!(matches!(err, NinjaError::Extractor(ExtractorError::Timeout(1))));
            assert!(started.elapsed() < Duration::from_secs(4));
            assert_eq!(err.public_message(), "Request timed out after 1s");
        }
    }
}
