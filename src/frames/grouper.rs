use std::collections::HashMap;

use tracing::{debug, warn};

use crate::frames::types::FrameName;

/// An ordered run of frames sharing a clip key
///
/// Frames are sorted by ascending numeric index and indices are unique.
#[derive(Debug, Clone)]
pub struct Clip {
    key: String,
    frames: Vec<FrameName>,
}

impl Clip {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn frames(&self) -> &[FrameName] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of full windows of the given width this clip can produce
    pub fn window_count(&self, width: usize) -> usize {
        let half = width / 2;
        self.frames.len().saturating_sub(2 * half)
    }
}

/// Result of grouping a flat list of filenames
#[derive(Debug, Clone, Default)]
pub struct ClipSet {
    clips: Vec<Clip>,
    rejected: Vec<String>,
}

impl ClipSet {
    /// Clips in first-seen order
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Filenames that did not follow the naming grammar or duplicated an index
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    pub fn total_frames(&self) -> usize {
        self.clips.iter().map(Clip::len).sum()
    }

    pub fn get(&self, key: &str) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.key == key)
    }
}

/// Partition frame filenames into clips keyed by everything but the index token
///
/// Malformed names are logged and reported in [`ClipSet::rejected`] instead of
/// aborting the grouping.
pub fn group_clips<I, S>(file_names: I) -> ClipSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = ClipSet::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for file_name in file_names {
        let file_name = file_name.as_ref();
        let name = match FrameName::parse(file_name) {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping frame file: {}", e);
                set.rejected.push(file_name.to_string());
                continue;
            }
        };

        let position = *positions.entry(name.clip_key().to_string()).or_insert_with(|| {
            set.clips.push(Clip {
                key: name.clip_key().to_string(),
                frames: Vec::new(),
            });
            set.clips.len() - 1
        });
        set.clips[position].frames.push(name);
    }

    for clip in &mut set.clips {
        // Stable sort keeps the first-seen file ahead of any duplicate index
        clip.frames.sort_by_key(FrameName::index);

        let rejected = &mut set.rejected;
        clip.frames.dedup_by(|later, kept| {
            let duplicate = later.index() == kept.index();
            if duplicate {
                warn!(
                    "Frame {} duplicates index {} of {} in clip '{}'",
                    later, kept.index(), kept, kept.clip_key()
                );
                rejected.push(later.file_name().to_string());
            }
            duplicate
        });

        debug!("Clip '{}': {} frames", clip.key, clip.frames.len());
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(clip: &Clip) -> Vec<&str> {
        clip.frames().iter().map(FrameName::file_name).collect()
    }

    #[test]
    fn test_groups_preserve_first_seen_order() {
        let set = group_clips(["b_001.jpg", "a_001.jpg", "b_002.jpg", "a_002.jpg"]);
        let keys: Vec<&str> = set.iter().map(Clip::key).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(set.total_frames(), 4);
    }

    #[test]
    fn test_orders_numerically_not_lexicographically() {
        let set = group_clips(["c_10.jpg", "c_2.jpg", "c_1.jpg"]);
        assert_eq!(names(&set.clips()[0]), vec!["c_1.jpg", "c_2.jpg", "c_10.jpg"]);
    }

    #[test]
    fn test_multi_token_keys() {
        let set = group_clips(["site_a_run_1_001.jpg", "site_a_run_1_002.jpg", "site_a_run_2_001.jpg"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("site_a_run_1").unwrap().len(), 2);
        assert_eq!(set.get("site_a_run_2").unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_names_are_rejected_not_fatal() {
        let set = group_clips(["c_001.jpg", "thumbnail.jpg", "c_002.jpg"]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.rejected(), &["thumbnail.jpg".to_string()]);
    }

    #[test]
    fn test_duplicate_index_keeps_first() {
        let set = group_clips(["c_002.jpg", "c_1.jpg", "c_2.jpg"]);
        assert_eq!(names(&set.clips()[0]), vec!["c_1.jpg", "c_002.jpg"]);
        assert_eq!(set.rejected(), &["c_2.jpg".to_string()]);
    }

    #[test]
    fn test_window_count() {
        let set = group_clips(["c_001", "c_002", "c_003", "c_004", "c_005"]);
        let clip = &set.clips()[0];
        assert_eq!(clip.window_count(1), 5);
        assert_eq!(clip.window_count(3), 3);
        assert_eq!(clip.window_count(5), 1);
        assert_eq!(clip.window_count(7), 0);
    }
}
