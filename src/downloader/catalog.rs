// FormatCatalog - orders resolved renditions for selection
//
// Video+audio renditions come first, then audio-only ones. Within each group
// the extractor's order is kept. Video-only and stream-less entries are not
// offered.

use std::collections::HashSet;

use super::models::{RenditionDescriptor, RenditionKind};

pub struct FormatCatalog;

impl FormatCatalog {
    pub fn build(raw: Vec<RenditionDescriptor>) -> Vec<RenditionDescriptor> {
        let mut seen = HashSet::new();
        let mut muxed = Vec::new();
        let mut audio = Vec::new();

        for rendition in raw {
            if !seen.insert(rendition.format_id.clone()) {
                tracing::debug!(format_id = %rendition.format_id, "dropping duplicate format id");
                continue;
            }
            match rendition.kind() {
                RenditionKind::VideoAudio => muxed.push(rendition),
                RenditionKind::AudioOnly => audio.push(rendition),
                RenditionKind::VideoOnly | RenditionKind::Unplayable => {}
            }
        }

        muxed.extend(audio);
        muxed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: &str, video: bool, audio: bool) -> RenditionDescriptor {
        RenditionDescriptor {
            format_id: id.to_string(),
            container_ext: if video { "mp4" } else { "m4a" }.to_string(),
            has_video: video,
            has_audio: audio,
            note: "N/A".to_string(),
            size_bytes: None,
        }
    }

    fn ids(list: &[RenditionDescriptor]) -> Vec<&str> {
        list.iter().map(|r| r.format_id.as_str()).collect()
    }

    #[test]
    fn muxed_before_audio_only() {
        let built = FormatCatalog::build(vec![
            r("140", false, true),
            r("18", true, true),
            r("251", false, true),
            r("22", true, true),
        ]);
        assert_eq!(ids(&built), vec!["18", "22", "140", "251"]);
    }

    #[test]
    fn drops_entries_without_audio() {
        let built = FormatCatalog::build(vec![
            r("sb0", false, false),
            r("137", true, false),
            r("18", true, true),
        ]);
        assert_eq!(ids(&built), vec!["18"]);
    }

    #[test]
    fn first_duplicate_wins() {
        let mut dup = r("18", false, true);
        dup.note = "duplicate".into();
        let built = FormatCatalog::build(vec![r("18", true, true), dup]);
        assert_eq!(built.len(), 1);
        assert!(built[0].has_video);
    }

    #[test]
    fn ordering_invariant_holds_for_mixed_input() {
        let input: Vec<_> = (0..40)
            .map(|i| r(&i.to_string(), i % 3 == 0, i % 2 == 0 || i % 5 == 0))
            .collect();
        let built = FormatCatalog::build(input);
        let first_audio_only = built
            .iter()
            .position(|r| !r.has_video)
            .unwrap_or(built.len());
        assert!(built[..first_audio_only].iter().all(|r| r.has_video && r.has_audio));
        assert!(built[first_audio_only..].iter().all(|r| !r.has_video && r.has_audio));
    }

    #[test]
    fn empty_input() {
        assert!(FormatCatalog::build(Vec::new()).is_empty());
    }
}
