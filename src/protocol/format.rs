//! Rendering of Spotify entities into wire frames.
//!
//! Frames start with a bracketed tag. Fields are separated by a tab and
//! records by a newline; listings repeat `\t<name>\t<subtitle>\t<uri>\t<icon>\n`
//! after the tag.

use std::fmt::Write as _;

use crate::spotify::{
    model::{Image, SimplifiedArtist},
    Album, Artist, Playlist, RepeatState, Track,
};

/// Shown when an entity has no image.
pub const DEFAULT_ICON: &str = "https://developer.spotify.com/images/guidelines/design/icon3@2x.png";

/// Name of the pseudo-playlist holding the user's saved tracks.
pub const LIKED_SONGS: &str = "Liked Songs";

fn boolean(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn icon(images: &[Image]) -> &str {
    images.first().map_or(DEFAULT_ICON, |image| image.url.as_str())
}

fn artists(artists: &[SimplifiedArtist]) -> String {
    artists
        .iter()
        .map(|artist| artist.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn track_icon(track: &Track) -> &str {
    track
        .album
        .as_ref()
        .map_or(DEFAULT_ICON, |album| icon(&album.images))
}

fn row(out: &mut String, name: &str, subtitle: &str, uri: &str, icon: &str) {
    let _ = writeln!(out, "\t{name}\t{subtitle}\t{uri}\t{icon}");
}

/// `[INIT]\t<shuffle>\t<Repeat>\t<playing>`
#[must_use]
pub fn states(shuffle: bool, repeat: RepeatState, playing: bool) -> String {
    format!(
        "[INIT]\t{}\t{repeat}\t{}",
        boolean(shuffle),
        boolean(playing)
    )
}

/// `[CURRENT]\t<artists>\t<track>\t<album>\t<cover>\t<link>`
#[must_use]
pub fn current(track: &Track) -> String {
    let album = track.album.as_ref().map_or("", |album| album.name.as_str());
    let link = track
        .external_urls
        .spotify
        .as_deref()
        .unwrap_or(&track.uri);

    format!(
        "[CURRENT]\t{}\t{}\t{album}\t{}\t{link}",
        artists(&track.artists),
        track.name,
        track_icon(track),
    )
}

/// Track rows: subtitle is the artists, icon is the album cover.
#[must_use]
pub fn tracks<'a, I>(tag: &str, tracks: I) -> String
where
    I: IntoIterator<Item = &'a Track>,
{
    let mut out = format!("[{tag}]");
    for track in tracks {
        row(
            &mut out,
            &track.name,
            &artists(&track.artists),
            &track.uri,
            track_icon(track),
        );
    }
    out
}

/// Album rows: the name is underlined so that the client can tell albums
/// from tracks.
#[must_use]
pub fn albums<'a, I>(tag: &str, albums: I) -> String
where
    I: IntoIterator<Item = &'a Album>,
{
    let mut out = format!("[{tag}]");
    for album in albums {
        row(
            &mut out,
            &format!("<u>{}</u>", album.name),
            &artists(&album.artists),
            &album.uri,
            icon(&album.images),
        );
    }
    out
}

/// Playlist rows: subtitle is the owner.
#[must_use]
pub fn playlists<'a, I>(tag: &str, playlists: I) -> String
where
    I: IntoIterator<Item = &'a Playlist>,
{
    let mut out = format!("[{tag}]");
    for playlist in playlists {
        row(
            &mut out,
            &playlist.name,
            playlist.owner.display_name.as_deref().unwrap_or_default(),
            &playlist.uri,
            icon(&playlist.images),
        );
    }
    out
}

/// `[SEARCH]` then `\t<name>\t<n> Followers\t<link>\t<icon>\n` per artist.
#[must_use]
pub fn artists_listing<'a, I>(artists: I) -> String
where
    I: IntoIterator<Item = &'a Artist>,
{
    let mut out = String::from("[SEARCH]");
    for artist in artists {
        let link = artist
            .external_urls
            .spotify
            .as_deref()
            .unwrap_or(&artist.uri);
        row(
            &mut out,
            &artist.name,
            &format!("{} Followers", artist.followers.total),
            link,
            icon(&artist.images),
        );
    }
    out
}

/// The user's library: Liked Songs first, then every playlist.
#[must_use]
pub fn library(user_uri: &str, liked_total: u32, playlists: &[Playlist]) -> String {
    let mut out = String::from("[PLAYLISTS]");
    row(
        &mut out,
        LIKED_SONGS,
        &format!("{liked_total} Songs"),
        &format!("{user_uri}:collection"),
        DEFAULT_ICON,
    );
    for playlist in playlists {
        row(
            &mut out,
            &playlist.name,
            &format!("{} Songs", playlist.tracks.total),
            &playlist.uri,
            icon(&playlist.images),
        );
    }
    out
}

/// Rows without a tag and without the tab that leads the first row.
fn body<'a, I>(tracks: I, cover: &str) -> String
where
    I: IntoIterator<Item = &'a Track>,
{
    let mut out = String::new();
    for track in tracks {
        let icon = track
            .album
            .as_ref()
            .map_or(cover, |album| icon(&album.images));
        row(&mut out, &track.name, &artists(&track.artists), &track.uri, icon);
    }
    if out.starts_with('\t') {
        out.remove(0);
    }
    out
}

/// `[ALBUM]` header, the rows of the first disc and, for double albums,
/// `\t[DISC2]\t` followed by the rows of the second disc.
#[must_use]
pub fn album_detail(album: &Album, tracks: &[Track]) -> String {
    let cover = icon(&album.images);
    let mut out = format!(
        "[ALBUM]\t{}\t{}\t{}\t{}\t{cover}\n",
        album.name,
        artists(&album.artists),
        album.total_tracks,
        album.uri,
    );

    out.push_str(&body(
        tracks.iter().filter(|track| track.disc_number == 1),
        cover,
    ));

    let mut second = tracks.iter().filter(|track| track.disc_number == 2).peekable();
    if second.peek().is_some() {
        out.push_str("\t[DISC2]\t");
        out.push_str(&body(second, cover));
    }

    out
}

/// Header fields of a playlist detail page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistHeader<'a> {
    pub name: &'a str,
    pub owner: &'a str,
    pub count: u32,
    pub uri: &'a str,
    pub icon: &'a str,
}

/// `[PLAYLIST]` header, then one page of rows, then a closing tab.
#[must_use]
pub fn playlist_detail<'a, I>(header: &PlaylistHeader<'_>, tracks: I) -> String
where
    I: IntoIterator<Item = &'a Track>,
{
    let PlaylistHeader {
        name,
        owner,
        count,
        uri,
        icon,
    } = header;
    format!(
        "[PLAYLIST]\t{name}\t{owner}\t{count}\t{uri}\t{icon}\n{}\t",
        body(tracks, DEFAULT_ICON)
    )
}

/// `[ARTIST]` header followed by the `[TOP]` tracks and the `[ALBUMS]`
/// listing, each block separated by three tabs.
#[must_use]
pub fn artist_detail(artist: &Artist, top_tracks: &[Track], albums_page: &[Album]) -> String {
    format!(
        "[ARTIST]\t{}\t{}\t{}\t{}\t\t\t{}\t\t\t{}",
        artist.name,
        artist.uri,
        icon(&artist.images),
        artist.followers.total,
        tracks("TOP", top_tracks),
        albums("ALBUMS", albums_page),
    )
}

/// `[ERROR] <message>`
#[must_use]
pub fn error<M>(message: M) -> String
where
    M: std::fmt::Display,
{
    format!("[ERROR] {message}")
}
