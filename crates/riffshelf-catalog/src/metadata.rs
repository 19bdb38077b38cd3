//! Best-effort metadata extraction for audio files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blake3::Hasher;
use derive_builder::Builder;
use id3::{Tag, TagLike};
use rayon::prelude::*;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::model::{ContentHash, TrackMetadata};

/// Turns a file path into catalog metadata.
///
/// Extraction never fails: unreadable or untagged files get a fallback
/// derived from the file name.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> TrackMetadata;
}

/// Extract metadata for every path in parallel, preserving order.
pub fn extract_batch<E>(extractor: &E, paths: &[PathBuf]) -> Vec<TrackMetadata>
where
    E: MetadataExtractor + ?Sized,
{
    paths.par_iter().map(|p| extractor.extract(p)).collect()
}

/// Configuration for [`TagExtractor`].
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ExtractConfig {
    /// Read ID3 tags from mp3 files.
    #[builder(default = "true")]
    pub read_tags: bool,

    /// Probe the container for stream properties and tags.
    #[builder(default = "true")]
    pub probe_stream: bool,

    /// Compute a partial content hash.
    #[builder(default = "true")]
    pub compute_hash: bool,

    /// Bytes hashed from the start of the file.
    #[builder(default = "4096")]
    pub partial_hash_head: usize,

    /// Bytes hashed from the end of the file.
    #[builder(default = "4096")]
    pub partial_hash_tail: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            read_tags: true,
            probe_stream: true,
            compute_hash: true,
            partial_hash_head: 4096,
            partial_hash_tail: 4096,
        }
    }
}

impl ExtractConfig {
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder::default()
    }
}

/// Extractor backed by `id3` and `symphonia`.
#[derive(Debug, Clone, Default)]
pub struct TagExtractor {
    config: ExtractConfig,
}

impl TagExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    fn read_id3(&self, path: &Path, meta: &mut TrackMetadata) {
        match Tag::read_from_path(path) {
            Ok(tag) => {
                meta.title = meta.title.take().or_else(|| non_empty(tag.title()));
                meta.artist = meta.artist.take().or_else(|| non_empty(tag.artist()));
                meta.album = meta.album.take().or_else(|| non_empty(tag.album()));
            }
            Err(err) => debug!(path = %path.display(), error = %err, "No ID3 tag"),
        }
    }

    fn probe(&self, path: &Path, meta: &mut TrackMetadata) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Cannot open for probing");
                return;
            }
        };

        let mut hint = Hint::new();
        if !meta.format.is_empty() {
            hint.with_extension(&meta.format);
        }
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut probed = match symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        ) {
            Ok(p) => p,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Unrecognized audio container");
                return;
            }
        };

        if let Some(revision) = probed.format.metadata().current() {
            apply_revision(revision, meta);
        }
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            apply_revision(revision, meta);
        }

        let Some(track) = probed.format.default_track() else {
            return;
        };
        let params = &track.codec_params;
        meta.sample_rate = params.sample_rate;
        meta.channels = params.channels.map(|c| c.count() as u16);
        meta.duration_ms = match (params.time_base, params.n_frames) {
            (Some(tb), Some(frames)) => {
                let t = tb.calc_time(frames);
                Some(t.seconds * 1000 + (t.frac * 1000.0) as u64)
            }
            (None, Some(frames)) => params
                .sample_rate
                .filter(|&rate| rate > 0)
                .map(|rate| frames.saturating_mul(1000) / u64::from(rate)),
            _ => None,
        };
    }

    /// Hash the head, tail and size of a file.
    fn partial_hash(&self, path: &Path) -> Option<ContentHash> {
        let mut file = File::open(path).ok()?;
        let file_size = file.metadata().ok()?.len();

        let mut hasher = Hasher::new();

        let head_size = (self.config.partial_hash_head as u64).min(file_size);
        let mut head_buf = vec![0u8; head_size as usize];
        file.read_exact(&mut head_buf).ok()?;
        hasher.update(&head_buf);

        if file_size > head_size {
            let tail_size = (self.config.partial_hash_tail as u64).min(file_size - head_size);
            if tail_size > 0 {
                file.seek(SeekFrom::End(-(tail_size as i64))).ok()?;
                let mut tail_buf = vec![0u8; tail_size as usize];
                file.read_exact(&mut tail_buf).ok()?;
                hasher.update(&tail_buf);
            }
        }

        hasher.update(&file_size.to_le_bytes());

        Some(ContentHash::new(*hasher.finalize().as_bytes()))
    }
}

impl MetadataExtractor for TagExtractor {
    fn extract(&self, path: &Path) -> TrackMetadata {
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let mut meta = TrackMetadata::new(path, file_size);

        if self.config.read_tags && meta.format == "mp3" {
            self.read_id3(path, &mut meta);
        }
        if self.config.probe_stream {
            self.probe(path, &mut meta);
        }
        meta.tagged = meta.title.is_some() || meta.artist.is_some();

        if meta.title.is_none() {
            let (artist, title) = title_from_file_name(path);
            meta.title = title;
            meta.artist = meta.artist.take().or(artist);
        }

        meta.bitrate_kbps = meta
            .duration_ms
            .filter(|&ms| ms > 0)
            .map(|ms| (file_size.saturating_mul(8) / ms) as u32);

        if self.config.compute_hash {
            meta.content_hash = self.partial_hash(path);
        }

        meta
    }
}

fn apply_revision(revision: &MetadataRevision, meta: &mut TrackMetadata) {
    for tag in revision.tags() {
        let slot = match tag.std_key {
            Some(StandardTagKey::TrackTitle) => &mut meta.title,
            Some(StandardTagKey::Artist) => &mut meta.artist,
            Some(StandardTagKey::Album) => &mut meta.album,
            _ => continue,
        };
        if slot.is_none() {
            *slot = non_empty(Some(&tag.value.to_string()));
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Split a file stem of the form `Artist - Title`.
///
/// Without a separator the whole stem becomes the title.
pub fn title_from_file_name(path: &Path) -> (Option<String>, Option<String>) {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return (None, None);
    };
    match stem.split_once(" - ") {
        Some((artist, title)) => (non_empty(Some(artist)), non_empty(Some(title))),
        None => (None, non_empty(Some(&stem))),
    }
}
