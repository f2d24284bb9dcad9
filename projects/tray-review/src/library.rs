use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "webm", "mov", "mkv", "avi", "m4v"];

/// A video file found under the library root.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    /// Path relative to the library root, with `/` separators.
    pub name: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

pub fn is_video_file_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Accepts any `video/*` type, matching a file picker restricted to videos.
pub fn is_video_mime(mime: &str) -> bool {
    mime.trim().to_lowercase().starts_with("video/")
}

pub fn list_videos(video_root: &Path) -> Vec<VideoEntry> {
    let mut videos: Vec<VideoEntry> = WalkDir::new(video_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().map(is_video_file_name).unwrap_or(false))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(video_root).ok()?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let metadata = e.metadata().ok();
            Some(VideoEntry {
                name,
                size_bytes: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
                modified: metadata
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from),
            })
        })
        .collect();
    videos.sort_by(|a, b| a.name.cmp(&b.name));
    videos
}

/// Resolve a library-relative name to a file inside `video_root`.
pub fn resolve_video(video_root: &Path, name: &str) -> Result<PathBuf> {
    if !is_video_file_name(name) {
        return Err(anyhow!("Not a video file: {}", name));
    }

    let root = video_root.canonicalize()?;
    let path = root
        .join(name)
        .canonicalize()
        .map_err(|_| anyhow!("Video not found: {}", name))?;
    if !path.starts_with(&root) {
        return Err(anyhow!("Video is outside the library: {}", name));
    }
    if !path.is_file() {
        return Err(anyhow!("Video not found: {}", name));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lunch")).unwrap();
        fs::write(dir.path().join("b.mp4"), b"xx").unwrap();
        fs::write(dir.path().join("lunch/a.MOV"), b"xxxx").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        dir
    }

    #[test]
    fn test_video_file_names() {
        assert!(is_video_file_name("clip.mp4"));
        assert!(is_video_file_name("CLIP.WebM"));
        assert!(is_video_file_name("dir/clip.m4v"));
        assert!(!is_video_file_name("clip.mp3"));
        assert!(!is_video_file_name("mp4"));
    }

    #[test]
    fn test_video_mime() {
        assert!(is_video_mime("video/mp4"));
        assert!(is_video_mime("Video/QuickTime"));
        assert!(!is_video_mime("image/jpeg"));
        assert!(!is_video_mime(""));
    }

    #[test]
    fn test_list_videos() {
        let dir = library();
        let videos = list_videos(dir.path());
        let names: Vec<&str> = videos.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b.mp4", "lunch/a.MOV"]);
        assert_eq!(videos[1].size_bytes, 4);
        assert!(videos[0].modified.is_some());
    }

    #[test]
    fn test_resolve_video() {
        let dir = library();
        let path = resolve_video(dir.path(), "lunch/a.MOV").unwrap();
        assert!(path.ends_with("lunch/a.MOV"));

        assert!(resolve_video(dir.path(), "missing.mp4").is_err());
        assert!(resolve_video(dir.path(), "notes.txt").is_err());
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("library");
        fs::create_dir_all(&root).unwrap();
        fs::write(outer.path().join("secret.mp4"), b"x").unwrap();

        assert!(resolve_video(&root, "../secret.mp4").is_err());
    }
}
