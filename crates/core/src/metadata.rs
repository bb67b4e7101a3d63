// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `MetadataUpdate`: the per-track "song" string sent to output streams.

/// Artist/title/override bundle resolved into a single display string.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub artist: Option<String>,
    pub title: Option<String>,
    /// Playlist-supplied override string, highest precedence.
    pub playlist_override: Option<String>,
    /// Filename stem, lowest-precedence fallback.
    pub filename_fallback: String,
}

impl MetadataUpdate {
    /// Resolves the "song" field: playlist override > "artist - title"
    /// (if both present) > "title" > filename stem.
    #[must_use]
    pub fn resolve_song(&self) -> String {
        if let Some(ref over) = self.playlist_override {
            return over.clone();
        }
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{artist} - {title}"),
            (None, Some(title)) => title.clone(),
            _ => self.filename_fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_everything() {
        let m = MetadataUpdate {
            artist: Some("A".into()),
            title: Some("T".into()),
            playlist_override: Some("Override".into()),
            filename_fallback: "file".into(),
        };
        assert_eq!(m.resolve_song(), "Override");
    }

    #[test]
    fn artist_and_title_join_with_dash() {
        let m = MetadataUpdate {
            artist: Some("Artist".into()),
            title: Some("Title".into()),
            playlist_override: None,
            filename_fallback: "file".into(),
        };
        assert_eq!(m.resolve_song(), "Artist - Title");
    }

    #[test]
    fn title_only_falls_through_to_title() {
        let m = MetadataUpdate {
            artist: None,
            title: Some("Title".into()),
            playlist_override: None,
            filename_fallback: "file".into(),
        };
        assert_eq!(m.resolve_song(), "Title");
    }

    #[test]
    fn no_tags_falls_back_to_filename() {
        let m = MetadataUpdate::default();
        assert_eq!(m.resolve_song(), "");
        let m = MetadataUpdate { filename_fallback: "my_track".into(), ..Default::default() };
        assert_eq!(m.resolve_song(), "my_track");
    }
}
